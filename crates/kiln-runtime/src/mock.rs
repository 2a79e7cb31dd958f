use crate::process::{OutputLine, OutputLines, ProcessHandle};
use crate::toolchain::Toolchain;
use crate::RuntimeError;
use kiln_schema::SiteLayout;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Exit code reported by a mock process after `destroy()`, as if killed by SIGTERM.
pub const MOCK_TERMINATED_EXIT_CODE: i32 = 128 + 15;

#[derive(Debug, Default)]
struct ProbeState {
    destroyed: AtomicBool,
    polls: AtomicUsize,
}

/// Observation handle onto a [`MockProcess`] that stays valid after the
/// process itself has been boxed and handed to the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct MockProbe(Arc<ProbeState>);

impl MockProbe {
    pub fn destroyed(&self) -> bool {
        self.0.destroyed.load(Ordering::SeqCst)
    }

    /// Number of `is_alive` calls that reported the process as running.
    pub fn live_polls(&self) -> usize {
        self.0.polls.load(Ordering::SeqCst)
    }
}

/// Scripted process: emits a fixed list of lines, stays alive for a set
/// number of polls (or until destroyed), then exits with a fixed code.
#[derive(Debug)]
pub struct MockProcess {
    pid: u32,
    lines: Option<Vec<OutputLine>>,
    exit_code: i32,
    alive_polls: Option<usize>,
    waited: bool,
    probe: MockProbe,
}

impl MockProcess {
    /// Exits with `code` the first time liveness is checked.
    pub fn exiting(code: i32) -> Self {
        Self {
            pid: 99999,
            lines: Some(Vec::new()),
            exit_code: code,
            alive_polls: Some(0),
            waited: false,
            probe: MockProbe::default(),
        }
    }

    /// Runs until destroyed.
    pub fn hanging() -> Self {
        Self {
            alive_polls: None,
            ..Self::exiting(0)
        }
    }

    #[must_use]
    pub fn with_lines(mut self, lines: Vec<OutputLine>) -> Self {
        self.lines = Some(lines);
        self
    }

    /// Report alive for `polls` liveness checks before exiting.
    #[must_use]
    pub fn alive_for(mut self, polls: usize) -> Self {
        self.alive_polls = Some(polls);
        self
    }

    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }

    fn finished(&self) -> bool {
        self.waited
            || self.probe.destroyed()
            || self
                .alive_polls
                .is_some_and(|limit| self.probe.live_polls() >= limit)
    }

    fn final_code(&self) -> i32 {
        if self.probe.destroyed() {
            MOCK_TERMINATED_EXIT_CODE
        } else {
            self.exit_code
        }
    }
}

impl ProcessHandle for MockProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.pid)
    }

    fn is_alive(&mut self) -> bool {
        if self.finished() {
            return false;
        }
        self.probe.0.polls.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn destroy(&mut self) {
        self.probe.0.destroyed.store(true, Ordering::SeqCst);
    }

    fn exit_code(&mut self) -> Result<i32, RuntimeError> {
        if self.finished() {
            Ok(self.final_code())
        } else {
            Err(RuntimeError::StillRunning { pid: self.pid })
        }
    }

    fn wait(&mut self) -> Result<i32, RuntimeError> {
        self.waited = true;
        Ok(self.final_code())
    }

    fn take_lines(&mut self) -> Option<OutputLines> {
        self.lines.take().map(|lines| OutputLines::new(lines.into_iter()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    Export(SiteLayout),
    StopServer,
}

/// Toolchain that hands out pre-scripted [`MockProcess`]es and records every call.
#[derive(Debug, Default)]
pub struct MockToolchain {
    export_process: Mutex<Option<MockProcess>>,
    stop_process: Mutex<Option<MockProcess>>,
    fail_export_launch: bool,
    fail_stop_launch: bool,
    calls: Mutex<Vec<MockCall>>,
}

impl MockToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_export(self, process: MockProcess) -> Self {
        Self {
            export_process: Mutex::new(Some(process)),
            ..self
        }
    }

    #[must_use]
    pub fn with_stop(self, process: MockProcess) -> Self {
        Self {
            stop_process: Mutex::new(Some(process)),
            ..self
        }
    }

    #[must_use]
    pub fn failing_export_launch(mut self) -> Self {
        self.fail_export_launch = true;
        self
    }

    #[must_use]
    pub fn failing_stop_launch(mut self) -> Self {
        self.fail_stop_launch = true;
        self
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn stop_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| **c == MockCall::StopServer)
            .count()
    }

    fn record(&self, call: MockCall) -> Result<(), RuntimeError> {
        self.calls
            .lock()
            .map_err(|e| RuntimeError::Toolchain(format!("mutex poisoned: {e}")))?
            .push(call);
        Ok(())
    }

    fn take_script(
        slot: &Mutex<Option<MockProcess>>,
        default: impl FnOnce() -> MockProcess,
    ) -> Result<MockProcess, RuntimeError> {
        let mut slot = slot
            .lock()
            .map_err(|e| RuntimeError::Toolchain(format!("mutex poisoned: {e}")))?;
        Ok(slot.take().unwrap_or_else(default))
    }
}

fn launch_failure(command: &str) -> RuntimeError {
    RuntimeError::Launch {
        command: command.to_owned(),
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "mock toolchain is not installed",
        ),
    }
}

impl Toolchain for MockToolchain {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn export(&self, layout: SiteLayout) -> Result<Box<dyn ProcessHandle>, RuntimeError> {
        self.record(MockCall::Export(layout))?;
        if self.fail_export_launch {
            return Err(launch_failure("mock export"));
        }
        let process = Self::take_script(&self.export_process, || MockProcess::exiting(0))?;
        Ok(Box::new(process))
    }

    fn stop_server(&self) -> Result<Box<dyn ProcessHandle>, RuntimeError> {
        self.record(MockCall::StopServer)?;
        if self.fail_stop_launch {
            return Err(launch_failure("mock stop"));
        }
        let process = Self::take_script(&self.stop_process, || {
            MockProcess::exiting(0).with_lines(vec![OutputLine::stdout("Server stopped")])
        })?;
        Ok(Box::new(process))
    }
}
