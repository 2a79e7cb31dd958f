use crate::RuntimeError;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Which pipe a line of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub text: String,
    pub stream: OutputStream,
}

impl OutputLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            stream: OutputStream::Stdout,
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            stream: OutputStream::Stderr,
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.stream == OutputStream::Stderr
    }
}

/// Finite, single-use sequence of output lines. Ends when the process has
/// closed both of its output pipes.
pub struct OutputLines {
    inner: Box<dyn Iterator<Item = OutputLine> + Send>,
}

impl OutputLines {
    pub fn new(lines: impl Iterator<Item = OutputLine> + Send + 'static) -> Self {
        Self {
            inner: Box::new(lines),
        }
    }
}

impl Iterator for OutputLines {
    type Item = OutputLine;

    fn next(&mut self) -> Option<OutputLine> {
        self.inner.next()
    }
}

impl fmt::Debug for OutputLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputLines").finish_non_exhaustive()
    }
}

/// One spawned external process.
///
/// Liveness is polled rather than pushed. `exit_code` is only defined once
/// `is_alive` has returned false; asking earlier is a [`RuntimeError::StillRunning`].
/// The output stream can be taken exactly once.
pub trait ProcessHandle: Send {
    fn pid(&self) -> Option<u32>;

    fn is_alive(&mut self) -> bool;

    /// Request termination. Best effort and asynchronous: the process may
    /// still be alive when this returns.
    fn destroy(&mut self);

    fn exit_code(&mut self) -> Result<i32, RuntimeError>;

    /// Block until the process exits and return its exit code.
    fn wait(&mut self) -> Result<i32, RuntimeError>;

    /// Take the combined stdout/stderr stream. Returns `None` on every call
    /// after the first.
    fn take_lines(&mut self) -> Option<OutputLines>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_owned(), value.to_owned()));
        self
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// [`ProcessHandle`] backed by a real OS child process.
///
/// Each output pipe gets a reader thread; both feed one channel, so the
/// stream ends only after stdout and stderr are closed.
pub struct ChildProcess {
    child: Child,
    exit_code: Option<i32>,
    lines: Option<OutputLines>,
}

impl ChildProcess {
    pub fn spawn(spec: &CommandSpec) -> Result<Self, RuntimeError> {
        let command = spec.to_string();
        let mut cmd = spec.to_command();
        // stdin stays closed so the child never competes with the key reader.
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| RuntimeError::Launch {
            command: command.clone(),
            source,
        })?;
        debug!("spawned pid {}: {command}", child.id());

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, OutputStream::Stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, OutputStream::Stderr, tx);
        }

        Ok(Self {
            child,
            exit_code: None,
            lines: Some(OutputLines::new(rx.into_iter())),
        })
    }
}

impl ProcessHandle for ChildProcess {
    fn pid(&self) -> Option<u32> {
        Some(self.child.id())
    }

    fn is_alive(&mut self) -> bool {
        if self.exit_code.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                let code = exit_code_of(status);
                debug!("pid {} exited with code {code}", self.child.id());
                self.exit_code = Some(code);
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!(
                    "cannot query pid {}, treating it as failed: {e}",
                    self.child.id()
                );
                self.exit_code = Some(1);
                false
            }
        }
    }

    fn destroy(&mut self) {
        if self.exit_code.is_some() {
            return;
        }
        let pid = self.child.id();
        let Ok(pid_i32) = i32::try_from(pid) else {
            warn!("invalid pid {pid}: exceeds i32 range");
            return;
        };
        debug!("sending SIGTERM to pid {pid}");
        // SAFETY: kill() with a valid pid and signal is safe; pid validated via i32::try_from above.
        #[allow(unsafe_code)]
        let ret = unsafe { libc::kill(pid_i32, libc::SIGTERM) };
        if ret != 0 {
            let errno = std::io::Error::last_os_error();
            if errno.raw_os_error() == Some(libc::ESRCH) {
                debug!("pid {pid} already exited before SIGTERM");
            } else {
                warn!("failed to send SIGTERM to pid {pid}: {errno}");
            }
        }
    }

    fn exit_code(&mut self) -> Result<i32, RuntimeError> {
        if self.is_alive() {
            return Err(RuntimeError::StillRunning {
                pid: self.child.id(),
            });
        }
        // is_alive() always records a code before returning false.
        self.exit_code.ok_or(RuntimeError::StillRunning {
            pid: self.child.id(),
        })
    }

    fn wait(&mut self) -> Result<i32, RuntimeError> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        let status = self.child.wait()?;
        let code = exit_code_of(status);
        self.exit_code = Some(code);
        Ok(code)
    }

    fn take_lines(&mut self) -> Option<OutputLines> {
        self.lines.take()
    }
}

/// Forward `process` output to `sink` until it exits, then return its exit code.
///
/// Lines still arriving after the exit are read for at most `grace`: a
/// background child that inherited the pipes may keep them open long after
/// the process itself is gone.
pub fn stream_to_exit(
    process: &mut dyn ProcessHandle,
    grace: Duration,
    sink: &mut dyn FnMut(&OutputLine),
) -> Result<i32, RuntimeError> {
    let Some(lines) = process.take_lines() else {
        return process.wait();
    };
    let (tx, rx) = mpsc::channel();
    let forwarder = thread::Builder::new()
        .name("kiln-output".to_owned())
        .spawn(move || {
            for line in lines {
                if tx.send(line).is_err() {
                    return;
                }
            }
        });
    if let Err(e) = forwarder {
        warn!("failed to start output reader: {e}");
        return process.wait();
    }

    let mut next_poll = Instant::now() + EXIT_POLL_INTERVAL;
    loop {
        match rx.recv_timeout(next_poll.saturating_duration_since(Instant::now())) {
            Ok(line) => sink(&line),
            Err(RecvTimeoutError::Disconnected) => return process.wait(),
            Err(RecvTimeoutError::Timeout) => {}
        }
        if Instant::now() >= next_poll {
            if !process.is_alive() {
                break;
            }
            next_poll = Instant::now() + EXIT_POLL_INTERVAL;
        }
    }

    let code = process.wait()?;
    let deadline = Instant::now() + grace;
    while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(remaining) {
            Ok(line) => sink(&line),
            Err(RecvTimeoutError::Disconnected) => return Ok(code),
            Err(RecvTimeoutError::Timeout) => break,
        }
    }
    warn!("output still open after exit, continuing without it");
    Ok(code)
}

fn spawn_reader<R: Read + Send + 'static>(pipe: R, stream: OutputStream, tx: Sender<OutputLine>) {
    thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for chunk in reader.split(b'\n') {
            let Ok(bytes) = chunk else {
                break;
            };
            let text = String::from_utf8_lossy(&bytes);
            let line = OutputLine {
                text: text.trim_end_matches('\r').to_owned(),
                stream,
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

/// Exit code of a finished process; a signal death maps to `128 + signal`.
fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_spec_display() {
        let spec = CommandSpec::new("./gradlew").args(["--console=plain", "kilnExport"]);
        assert_eq!(spec.to_string(), "./gradlew --console=plain kilnExport");
    }

    #[test]
    fn command_spec_builder() {
        let spec = CommandSpec::new("gradle")
            .current_dir("/srv/site")
            .env("KILN_ENV", "PROD");
        assert_eq!(spec.cwd, Some(PathBuf::from("/srv/site")));
        assert_eq!(spec.env, vec![("KILN_ENV".to_owned(), "PROD".to_owned())]);
    }

    #[test]
    fn output_line_origin() {
        assert!(OutputLine::stderr("boom").is_error());
        assert!(!OutputLine::stdout("ok").is_error());
    }

    #[test]
    fn output_lines_is_finite() {
        let lines = OutputLines::new(vec![OutputLine::stdout("a"), OutputLine::stdout("b")].into_iter());
        assert_eq!(lines.count(), 2);
    }
}
