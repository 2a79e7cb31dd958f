use crate::session::{ExportState, SessionSnapshot};
use kiln_runtime::OutputLine;

/// Rendering sink for an interactive export.
///
/// Called from the orchestrator thread only. `render` receives a fresh
/// snapshot on every observable change and on each poll tick; `log` receives
/// every output line that did not become an alert, verbatim.
pub trait ExportView {
    fn render(&mut self, snapshot: &SessionSnapshot);
    fn log(&mut self, line: &OutputLine);
}

/// View that keeps everything it was shown, for asserting on what a user would see.
#[derive(Debug, Default)]
pub struct RecordingView {
    pub snapshots: Vec<SessionSnapshot>,
    pub lines: Vec<OutputLine>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct states in the order they were rendered.
    pub fn states(&self) -> Vec<ExportState> {
        let mut states: Vec<ExportState> = Vec::new();
        for snapshot in &self.snapshots {
            if states.last() != Some(&snapshot.state) {
                states.push(snapshot.state);
            }
        }
        states
    }

    pub fn last(&self) -> Option<&SessionSnapshot> {
        self.snapshots.last()
    }
}

impl ExportView for RecordingView {
    fn render(&mut self, snapshot: &SessionSnapshot) {
        self.snapshots.push(snapshot.clone());
    }

    fn log(&mut self, line: &OutputLine) {
        self.lines.push(line.clone());
    }
}
