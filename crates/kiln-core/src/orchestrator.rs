//! Supervision of one export: start the build, watch it, stop the server.
//!
//! The interactive path runs the [`ExportSession`] state machine on the
//! calling thread. Output pumps and the key reader only produce
//! [`ExportEvent`]s; every mutation of the session and the alert bundle
//! happens here, between `recv_timeout` wake-ups bounded by the next
//! liveness poll. Queued events are handled in batches that never run past
//! that poll.

use crate::alert::classify;
use crate::bundle::AlertBundle;
use crate::concurrency::shutdown_requested;
use crate::events::{EventChannel, ExportEvent, Key};
use crate::session::{ExportSession, ExportState, BUILD_FAILED_REASON, USER_CANCEL_REASON};
use crate::view::ExportView;
use crate::CoreError;
use kiln_runtime::{stream_to_exit, OutputLine, OutputLines, ProcessHandle, Toolchain};
use kiln_schema::{ExportSection, SiteLayout};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);
const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Liveness poll cadence while the build runs.
    pub poll_interval: Duration,
    /// Cancel the export once it has run this long.
    pub max_wait: Option<Duration>,
    /// How long to keep reading output after the build exited.
    pub drain_grace: Duration,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }
}

impl ExportOptions {
    pub fn from_config(export: &ExportSection) -> Self {
        Self {
            poll_interval: Duration::from_millis(export.poll_interval_ms.max(1)),
            max_wait: (export.max_wait_secs > 0)
                .then_some(Duration::from_secs(export.max_wait_secs)),
            ..Self::default()
        }
    }
}

/// Exit codes of a non-interactive export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub export_code: i32,
    pub stop_code: i32,
}

pub struct Exporter<'a> {
    toolchain: &'a dyn Toolchain,
    options: ExportOptions,
}

impl<'a> Exporter<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, options: ExportOptions) -> Self {
        Self { toolchain, options }
    }

    /// Run an export with live progress, alerts and cancellation.
    ///
    /// Always returns a terminal session unless a state invariant breaks.
    /// A build that cannot be launched ends `Interrupted` and skips the
    /// stop step; every other outcome runs it exactly once.
    pub fn run_interactive(
        &self,
        layout: SiteLayout,
        events: &EventChannel,
        view: &mut dyn ExportView,
    ) -> Result<ExportSession, CoreError> {
        let mut run = Run {
            session: ExportSession::new(layout, true),
            bundle: AlertBundle::new(),
            started: Instant::now(),
            view,
            output_open: false,
        };
        run.render();

        info!("exporting with {} ({layout} layout)", self.toolchain.name());
        let mut process = match self.toolchain.export(layout) {
            Ok(process) => process,
            Err(e) => {
                warn!("export could not be launched: {e}");
                run.session.interrupt(e)?;
                run.render();
                return Ok(run.session);
            }
        };
        debug!("export process started (pid {:?})", process.pid());

        if let Some(lines) = process.take_lines() {
            run.output_open = spawn_pump(lines, events.sender());
        }

        self.supervise(&mut run, events, process.as_mut())?;

        let code = process.exit_code()?;
        debug!("export process exited with code {code}");
        if run.session.state() == ExportState::Exporting {
            if code == 0 {
                run.session.transition(ExportState::Finishing)?;
            } else {
                run.session.begin_cancel(BUILD_FAILED_REASON)?;
            }
        }
        let state = run.session.state();
        if !matches!(state, ExportState::Finishing | ExportState::Cancelling) {
            return Err(CoreError::UnexpectedState(state));
        }

        self.drain_output(&mut run, events, process.as_mut())?;
        drop(process);
        run.render();

        self.stop_server(&mut run);

        let terminal = if run.session.state() == ExportState::Finishing {
            ExportState::Finished
        } else {
            ExportState::Cancelled
        };
        run.session.transition(terminal)?;
        run.render();
        Ok(run.session)
    }

    /// Handle events until the build process is no longer alive.
    fn supervise(
        &self,
        run: &mut Run<'_>,
        events: &EventChannel,
        process: &mut dyn ProcessHandle,
    ) -> Result<(), CoreError> {
        let mut next_poll = Instant::now() + self.options.poll_interval;
        loop {
            let timeout = next_poll.saturating_duration_since(Instant::now());
            if let Some(event) = events.recv_timeout(timeout) {
                run.handle(event, process)?;
                while Instant::now() < next_poll {
                    let Some(event) = events.try_recv() else {
                        break;
                    };
                    run.handle(event, process)?;
                }
                run.render();
                if Instant::now() < next_poll {
                    continue;
                }
            }

            next_poll = Instant::now() + self.options.poll_interval;
            if let Some(limit) = self.options.max_wait {
                if run.session.state() == ExportState::Exporting && run.started.elapsed() >= limit
                {
                    warn!("export exceeded {}s, cancelling", limit.as_secs());
                    run.session
                        .begin_cancel(&format!("export timed out after {}s", limit.as_secs()))?;
                    process.destroy();
                }
            }
            if !process.is_alive() {
                // Events queued before the exit was seen still apply, so a
                // pending cancel wins over a clean exit.
                let deadline = Instant::now() + self.options.drain_grace;
                while Instant::now() < deadline {
                    let Some(event) = events.try_recv() else {
                        break;
                    };
                    run.handle(event, process)?;
                }
                return Ok(());
            }
            run.render();
        }
    }

    /// Read what the build wrote before exiting. A grandchild that inherited
    /// the pipe can keep it open forever, so this gives up after the grace
    /// period.
    fn drain_output(
        &self,
        run: &mut Run<'_>,
        events: &EventChannel,
        process: &mut dyn ProcessHandle,
    ) -> Result<(), CoreError> {
        let deadline = Instant::now() + self.options.drain_grace;
        while run.output_open {
            let event = deadline
                .checked_duration_since(Instant::now())
                .and_then(|timeout| events.recv_timeout(timeout));
            let Some(event) = event else {
                warn!("build output still open after exit, continuing without it");
                break;
            };
            run.handle(event, process)?;
        }
        Ok(())
    }

    fn stop_server(&self, run: &mut Run<'_>) {
        info!("stopping server");
        match self.toolchain.stop_server() {
            Ok(mut stop) => {
                let view = &mut *run.view;
                let streamed =
                    stream_to_exit(stop.as_mut(), self.options.drain_grace, &mut |line| {
                        view.log(line);
                    });
                match streamed {
                    Ok(0) => {}
                    Ok(code) => warn!("stop task exited with code {code}"),
                    Err(e) => warn!("stop task did not finish cleanly: {e}"),
                }
            }
            Err(e) => {
                warn!("stop task could not be launched: {e}");
                run.session.record_cleanup_fault(e);
            }
        }
    }

    /// Run export then stop synchronously, streaming all output to `sink`.
    ///
    /// The stop step runs even when the export fails; the failure is
    /// reported afterwards.
    pub fn run_batch(
        &self,
        layout: SiteLayout,
        sink: &mut dyn FnMut(&OutputLine),
    ) -> Result<BatchReport, CoreError> {
        info!("exporting with {} ({layout} layout)", self.toolchain.name());
        let mut export = self.toolchain.export(layout)?;
        let export_code = stream_to_exit(export.as_mut(), self.options.drain_grace, sink)?;
        drop(export);
        debug!("export exited with code {export_code}");

        info!("stopping server");
        let mut stop = self.toolchain.stop_server()?;
        let stop_code = stream_to_exit(stop.as_mut(), self.options.drain_grace, sink)?;
        if stop_code != 0 {
            warn!("stop task exited with code {stop_code}");
        }

        if shutdown_requested() {
            return Err(CoreError::Interrupted);
        }
        if export_code != 0 {
            return Err(CoreError::BuildFailed(export_code));
        }
        Ok(BatchReport {
            export_code,
            stop_code,
        })
    }
}

/// Mutable state of one interactive run, owned by the orchestrator thread.
struct Run<'v> {
    session: ExportSession,
    bundle: AlertBundle,
    started: Instant,
    view: &'v mut dyn ExportView,
    output_open: bool,
}

impl Run<'_> {
    fn render(&mut self) {
        let snapshot = self.session.snapshot(&self.bundle, self.started.elapsed());
        self.view.render(&snapshot);
    }

    fn handle(
        &mut self,
        event: ExportEvent,
        process: &mut dyn ProcessHandle,
    ) -> Result<(), CoreError> {
        match event {
            ExportEvent::Output(line) => match classify(&line) {
                Some(alert) => self.bundle.append(alert),
                None => self.view.log(&line),
            },
            ExportEvent::OutputClosed => self.output_open = false,
            ExportEvent::Key(Key::Cancel) => {
                if self.session.state() == ExportState::Exporting {
                    info!("cancel requested");
                    self.session.begin_cancel(USER_CANCEL_REASON)?;
                    process.destroy();
                }
            }
            ExportEvent::Key(key) => {
                self.bundle.handle_key(key);
            }
        }
        Ok(())
    }
}

/// Forward output lines into the event channel from a dedicated thread.
/// Returns false if the thread could not be started.
fn spawn_pump(lines: OutputLines, tx: Sender<ExportEvent>) -> bool {
    let spawned = thread::Builder::new()
        .name("kiln-output".to_owned())
        .spawn(move || {
            for line in lines {
                if tx.send(ExportEvent::Output(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(ExportEvent::OutputClosed);
        });
    match spawned {
        Ok(_) => true,
        Err(e) => {
            warn!("failed to start output reader: {e}");
            false
        }
    }
}
