use super::{json_pretty, require_prereqs, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use kiln_core::{error_chain, find_project};
use kiln_runtime::{stream_to_exit, GradleToolchain, OutputLine, RuntimeError, Toolchain};
use kiln_schema::ServerState;
use std::path::Path;
use std::time::Duration;

const STOP_OUTPUT_GRACE: Duration = Duration::from_secs(5);

pub fn run(root: &Path, check_prereqs: bool, json: bool) -> Result<u8, String> {
    let project = find_project(root).map_err(|e| e.to_string())?;

    let running =
        ServerState::running(&project.layout).map_err(|e| format!("project error: {e}"))?;
    let Some(server) = running else {
        let port = project.config.server.port;
        if json {
            let payload = serde_json::json!({ "status": "not_running", "port": port });
            println!("{}", json_pretty(&payload)?);
        } else {
            println!("no running server detected for this project (configured port {port})");
        }
        return Ok(EXIT_SUCCESS);
    };

    if check_prereqs {
        require_prereqs(&project)?;
    }

    let toolchain = GradleToolchain::new(project.layout.root(), project.config.build.clone());
    let pb = if json {
        None
    } else {
        Some(spinner(&format!(
            "stopping {} server (pid {}, port {})...",
            server.env, server.pid, server.port
        )))
    };

    match run_stop(&toolchain) {
        Ok((0, _)) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "server stopped");
            }
            if json {
                let payload = serde_json::json!({
                    "status": "stopped",
                    "pid": server.pid,
                    "port": server.port,
                });
                println!("{}", json_pretty(&payload)?);
            }
            Ok(EXIT_SUCCESS)
        }
        Ok((code, lines)) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "stop task failed");
            }
            for line in &lines {
                eprintln!("{}", line.text);
            }
            Err(format!("stop task exited with code {code}"))
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "stop task failed");
            }
            Err(error_chain(&e))
        }
    }
}

fn run_stop(toolchain: &dyn Toolchain) -> Result<(i32, Vec<OutputLine>), RuntimeError> {
    let mut process = toolchain.stop_server()?;
    let mut lines: Vec<OutputLine> = Vec::new();
    let code = stream_to_exit(process.as_mut(), STOP_OUTPUT_GRACE, &mut |line| {
        lines.push(line.clone());
    })?;
    Ok((code, lines))
}
