use super::{EXIT_FAILURE, EXIT_SUCCESS};
use kiln_core::{find_project, ExportLock, Project};
use kiln_runtime::{check_toolchain_prereqs, format_missing};
use kiln_schema::{BuildSection, ServerState};
use std::path::Path;

pub fn run(root: &Path, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    let project = match find_project(root) {
        Ok(project) => {
            checks.push(Check::pass(
                "project",
                &format!(
                    "Project '{}' at {}",
                    project.config.site.title,
                    project.layout.root().display()
                ),
            ));
            Some(project)
        }
        Err(e) => {
            all_pass = false;
            checks.push(Check::fail("project", &e.to_string()));
            None
        }
    };

    match &project {
        Some(project) => {
            check_prereqs(project.layout.root(), &project.config.build, &mut checks, &mut all_pass);
            check_server(project, &mut checks, &mut all_pass);
            check_export_lock(project, &mut checks, &mut all_pass);
            check_disk_space(project.layout.root(), &mut checks);
        }
        None => check_prereqs(root, &BuildSection::default(), &mut checks, &mut all_pass),
    }

    print_results(&checks, all_pass, json_output)
}

fn check_prereqs(root: &Path, build: &BuildSection, checks: &mut Vec<Check>, all_pass: &mut bool) {
    let missing = check_toolchain_prereqs(root, build);
    if missing.is_empty() {
        checks.push(Check::pass(
            "toolchain_prereqs",
            "Toolchain prerequisites satisfied",
        ));
    } else {
        *all_pass = false;
        checks.push(Check::fail("toolchain_prereqs", &format_missing(&missing)));
    }
}

fn check_server(project: &Project, checks: &mut Vec<Check>, all_pass: &mut bool) {
    match ServerState::load(&project.layout.server_state_file()) {
        Ok(None) => checks.push(Check::pass(
            "server",
            &format!(
                "No server running (configured port {})",
                project.config.server.port
            ),
        )),
        Ok(Some(state)) if state.is_alive() => checks.push(Check::warn(
            "server",
            &format!(
                "A {} server is running (pid {}, port {}); exports will refuse to start",
                state.env, state.pid, state.port
            ),
        )),
        Ok(Some(state)) => checks.push(Check::info(
            "server",
            &format!("Stale server state for pid {} (process is gone)", state.pid),
        )),
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail("server", &format!("Cannot read server state: {e}")));
        }
    }
}

fn check_export_lock(project: &Project, checks: &mut Vec<Check>, all_pass: &mut bool) {
    match ExportLock::try_acquire(&project.layout.export_lock_file()) {
        Ok(Some(_)) => checks.push(Check::pass("export_lock", "Export lock is free")),
        Ok(None) => checks.push(Check::warn(
            "export_lock",
            "Export lock is held by another process",
        )),
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail(
                "export_lock",
                &format!("Cannot check export lock: {e}"),
            ));
        }
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("kiln doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}

/// Gradle exports write the whole site plus build caches under the project root.
fn check_disk_space(root: &Path, checks: &mut Vec<Check>) {
    let Ok(c_path) = std::ffi::CString::new(root.to_string_lossy().as_bytes()) else {
        return;
    };

    // SAFETY: zeroed statvfs is a valid initial state for the struct.
    #[allow(unsafe_code, clippy::undocumented_unsafe_blocks)]
    let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
    // SAFETY: statvfs with a valid, NUL-terminated path and a zeroed output
    // struct is well-defined; the struct is only read when ret == 0.
    #[allow(unsafe_code, clippy::undocumented_unsafe_blocks)]
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), &raw mut stat) };
    if ret != 0 {
        return;
    }

    let avail_mb = (stat.f_bavail * stat.f_frsize) / (1024 * 1024);
    if avail_mb < 500 {
        checks.push(Check::warn(
            "disk_space",
            &format!("Low disk space: {avail_mb} MB available for build output"),
        ));
    } else {
        checks.push(Check::pass(
            "disk_space",
            &format!("Disk space: {} GB available", avail_mb / 1024),
        ));
    }
}
