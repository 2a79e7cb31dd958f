//! Real subprocess tests for `ChildProcess`, using `sh` as a stand-in toolchain.

use kiln_runtime::{
    stream_to_exit, ChildProcess, CommandSpec, OutputLine, ProcessHandle, RuntimeError,
};
use std::time::{Duration, Instant};

fn sh(script: &str) -> CommandSpec {
    CommandSpec::new("sh").args(["-c", script])
}

fn wait_until_dead(process: &mut ChildProcess, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if !process.is_alive() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn streams_tagged_output_and_exit_code() {
    let mut process = ChildProcess::spawn(&sh("echo out; echo err >&2; exit 3")).unwrap();
    let lines: Vec<OutputLine> = process.take_lines().unwrap().collect();

    assert!(lines.contains(&OutputLine::stdout("out")));
    assert!(lines.contains(&OutputLine::stderr("err")));
    assert_eq!(process.wait().unwrap(), 3);
    assert!(!process.is_alive());
    assert_eq!(process.exit_code().unwrap(), 3);
}

#[test]
fn output_is_taken_once() {
    let mut process = ChildProcess::spawn(&sh("true")).unwrap();
    assert!(process.take_lines().is_some());
    assert!(process.take_lines().is_none());
    process.wait().unwrap();
}

#[test]
fn exit_code_while_running_is_state_error() {
    let mut process = ChildProcess::spawn(&sh("sleep 5")).unwrap();
    assert!(process.is_alive());
    assert!(matches!(
        process.exit_code(),
        Err(RuntimeError::StillRunning { .. })
    ));

    process.destroy();
    assert!(wait_until_dead(&mut process, Duration::from_secs(5)));
    assert_eq!(process.exit_code().unwrap(), 128 + 15);
}

#[test]
fn destroy_after_exit_is_harmless() {
    let mut process = ChildProcess::spawn(&sh("exit 0")).unwrap();
    assert_eq!(process.wait().unwrap(), 0);
    process.destroy();
    assert_eq!(process.exit_code().unwrap(), 0);
}

#[test]
fn runs_in_requested_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "").unwrap();
    let mut process = ChildProcess::spawn(&sh("ls").current_dir(dir.path())).unwrap();
    let lines: Vec<String> = process.take_lines().unwrap().map(|l| l.text).collect();
    process.wait().unwrap();
    assert!(lines.contains(&"marker.txt".to_owned()));
}

#[test]
fn unknown_program_is_launch_error() {
    let err = ChildProcess::spawn(&CommandSpec::new("/nonexistent/kiln-toolchain"))
        .err()
        .expect("spawn must fail");
    match err {
        RuntimeError::Launch { command, .. } => {
            assert!(command.contains("kiln-toolchain"));
        }
        other => panic!("expected launch error, got {other}"),
    }
}

#[test]
fn stream_to_exit_forwards_output_and_code() {
    let mut process = ChildProcess::spawn(&sh("echo one; echo two >&2; exit 4")).unwrap();
    let mut lines = Vec::new();
    let code = stream_to_exit(&mut process, Duration::from_secs(2), &mut |line| {
        lines.push(line.clone());
    })
    .unwrap();

    assert_eq!(code, 4);
    assert!(lines.contains(&OutputLine::stdout("one")));
    assert!(lines.contains(&OutputLine::stderr("two")));
}

#[test]
fn background_child_holding_the_pipe_does_not_block() {
    let mut process = ChildProcess::spawn(&sh("sleep 6 & echo stopped")).unwrap();
    let started = Instant::now();
    let mut lines = Vec::new();
    let code = stream_to_exit(&mut process, Duration::from_millis(300), &mut |line| {
        lines.push(line.text.clone());
    })
    .unwrap();

    assert_eq!(code, 0);
    assert_eq!(lines, vec!["stopped"]);
    assert!(
        started.elapsed() < Duration::from_secs(3),
        "took {:?}",
        started.elapsed()
    );
}
