//! Process supervision layer for kiln.
//!
//! This crate owns everything that touches an external program: the
//! `ProcessHandle` abstraction over one spawned process and its line-oriented
//! output, the `Toolchain` trait with its Gradle implementation, a scripted
//! mock toolchain for tests, and prerequisite checking.

pub mod mock;
pub mod prereq;
pub mod process;
pub mod toolchain;

pub use mock::{MockCall, MockProbe, MockProcess, MockToolchain};
pub use prereq::{check_toolchain_prereqs, format_missing, MissingPrereq};
pub use process::{
    stream_to_exit, ChildProcess, CommandSpec, OutputLine, OutputLines, OutputStream,
    ProcessHandle,
};
pub use toolchain::{GradleToolchain, Toolchain};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to launch `{command}`")]
    Launch {
        command: String,
        source: std::io::Error,
    },
    #[error("process {pid} is still running, exit code not available yet")]
    StillRunning { pid: u32 },
    #[error("toolchain failure: {0}")]
    Toolchain(String),
}
