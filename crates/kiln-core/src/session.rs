use crate::bundle::{AlertBundle, BundleView};
use crate::lifecycle::validate_transition;
use crate::CoreError;
use kiln_runtime::RuntimeError;
use kiln_schema::SiteLayout;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

pub const USER_CANCEL_REASON: &str = "user requested cancellation";
pub const BUILD_FAILED_REASON: &str =
    "build failed, check the Gradle output above for details";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportState {
    Exporting,
    Finishing,
    Finished,
    Cancelling,
    Cancelled,
    Interrupted,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExportState::Finished | ExportState::Cancelled | ExportState::Interrupted
        )
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportState::Exporting => write!(f, "exporting"),
            ExportState::Finishing => write!(f, "finishing"),
            ExportState::Finished => write!(f, "finished"),
            ExportState::Cancelling => write!(f, "cancelling"),
            ExportState::Cancelled => write!(f, "cancelled"),
            ExportState::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// One export invocation. Owned and mutated only by the orchestrator;
/// renderers see [`SessionSnapshot`]s.
#[derive(Debug)]
pub struct ExportSession {
    layout: SiteLayout,
    interactive: bool,
    state: ExportState,
    cancel_reason: Option<String>,
    captured_fault: Option<RuntimeError>,
    cleanup_fault: Option<RuntimeError>,
    history: Vec<ExportState>,
}

impl ExportSession {
    pub fn new(layout: SiteLayout, interactive: bool) -> Self {
        Self {
            layout,
            interactive,
            state: ExportState::Exporting,
            cancel_reason: None,
            captured_fault: None,
            cleanup_fault: None,
            history: vec![ExportState::Exporting],
        }
    }

    pub fn layout(&self) -> SiteLayout {
        self.layout
    }

    /// Whether live rendering and cancellation are active for this session.
    pub fn interactive(&self) -> bool {
        self.interactive
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    /// The launch fault that interrupted the export, if any.
    pub fn fault(&self) -> Option<&RuntimeError> {
        self.captured_fault.as_ref()
    }

    /// Set when the stop-server step itself could not be launched.
    pub fn cleanup_fault(&self) -> Option<&RuntimeError> {
        self.cleanup_fault.as_ref()
    }

    /// Every state the session has been in, starting with `Exporting`.
    pub fn history(&self) -> &[ExportState] {
        &self.history
    }

    /// Finished, and the server was stopped cleanly.
    pub fn succeeded(&self) -> bool {
        self.state == ExportState::Finished && self.cleanup_fault.is_none()
    }

    pub(crate) fn transition(&mut self, to: ExportState) -> Result<(), CoreError> {
        validate_transition(self.state, to)?;
        info!("export {} -> {to}", self.state);
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Enter `Cancelling` with `reason`. The first reason sticks.
    pub(crate) fn begin_cancel(&mut self, reason: &str) -> Result<(), CoreError> {
        self.transition(ExportState::Cancelling)?;
        if self.cancel_reason.is_none() {
            self.cancel_reason = Some(reason.to_owned());
        }
        Ok(())
    }

    pub(crate) fn interrupt(&mut self, fault: RuntimeError) -> Result<(), CoreError> {
        self.transition(ExportState::Interrupted)?;
        debug!("export interrupted: {fault}");
        self.captured_fault = Some(fault);
        Ok(())
    }

    pub(crate) fn record_cleanup_fault(&mut self, fault: RuntimeError) {
        self.cleanup_fault = Some(fault);
    }

    pub fn snapshot(&self, bundle: &AlertBundle, elapsed: Duration) -> SessionSnapshot {
        SessionSnapshot {
            layout: self.layout,
            state: self.state,
            cancel_reason: self.cancel_reason.clone(),
            fault: self.captured_fault.as_ref().map(|e| error_chain(e)),
            cleanup_fault: self.cleanup_fault.as_ref().map(|e| error_chain(e)),
            alerts: bundle.render(),
            elapsed,
        }
    }
}

/// Immutable view of a session handed to renderers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub layout: SiteLayout,
    pub state: ExportState,
    pub cancel_reason: Option<String>,
    pub fault: Option<String>,
    pub cleanup_fault: Option<String>,
    pub alerts: BundleView,
    pub elapsed: Duration,
}

/// Render an error and every cause beneath it, one per line.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    use std::fmt::Write as _;
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let _ = write!(out, "\n  caused by: {cause}");
        source = cause.source();
    }
    out
}
