//! Export orchestration for kiln.
//!
//! This crate ties the schema and runtime layers together into the export
//! pipeline: the `ExportSession` state machine and its transition rules, the
//! `Exporter` that supervises the toolchain process (interactive and batch),
//! classification of build output into `Alert`s, the deduplicating
//! `AlertBundle`, project pre-flight checks, and the export lock.

pub mod alert;
pub mod bundle;
pub mod concurrency;
pub mod events;
pub mod lifecycle;
pub mod orchestrator;
pub mod preflight;
pub mod session;
pub mod view;

pub use alert::{classify, Alert, AlertKey, Severity};
pub use bundle::{AlertBundle, AlertRow, AlertTotals, BundleView};
pub use concurrency::{install_signal_handler, shutdown_requested, ExportLock};
pub use events::{EventChannel, ExportEvent, Key};
pub use lifecycle::validate_transition;
pub use orchestrator::{BatchReport, ExportOptions, Exporter};
pub use preflight::{ensure_server_not_running, find_project, preflight, Project};
pub use session::{
    error_chain, ExportSession, ExportState, SessionSnapshot, BUILD_FAILED_REASON,
    USER_CANCEL_REASON,
};
pub use view::{ExportView, RecordingView};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("project error: {0}")]
    Schema(#[from] kiln_schema::SchemaError),
    #[error("runtime error: {0}")]
    Runtime(#[from] kiln_runtime::RuntimeError),
    #[error("invalid export state transition: {from} -> {to}")]
    InvalidTransition {
        from: ExportState,
        to: ExportState,
    },
    #[error("export reached the stop step in unexpected state '{0}'")]
    UnexpectedState(ExportState),
    #[error("project error: no kiln project found at or above {0} (missing .kiln/conf.toml)")]
    NotAProject(String),
    #[error(
        "server error: a {env} server is already running for this project (pid {pid}, port {port}); stop it with `kiln stop` first"
    )]
    ServerAlreadyRunning { pid: u32, port: u16, env: String },
    #[error("server error: another export is already running for this project")]
    ExportInProgress,
    #[error("build failed: export exited with code {0}")]
    BuildFailed(i32),
    #[error("export interrupted by signal")]
    Interrupted,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
