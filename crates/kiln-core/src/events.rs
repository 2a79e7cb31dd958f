use kiln_runtime::OutputLine;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Keyboard input, already mapped from terminal key codes by the view layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Abort the export (`q` or Ctrl-C).
    Cancel,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    /// Expand or collapse the selected alert.
    Toggle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    Output(OutputLine),
    /// The build process closed its output; no more `Output` events follow.
    OutputClosed,
    Key(Key),
}

/// Single-consumer merge point for everything the export loop reacts to.
///
/// Output pumps and the key reader hold cloned senders; only the
/// orchestrator receives. The channel keeps its own sender, so it never
/// reports disconnection while the orchestrator is waiting on it.
pub struct EventChannel {
    tx: Sender<ExportEvent>,
    rx: Receiver<ExportEvent>,
}

impl Default for EventChannel {
    fn default() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self) -> Sender<ExportEvent> {
        self.tx.clone()
    }

    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Option<ExportEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub(crate) fn try_recv(&self) -> Option<ExportEvent> {
        self.rx.try_recv().ok()
    }
}
