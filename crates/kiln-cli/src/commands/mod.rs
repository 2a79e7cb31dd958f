pub mod completions;
pub mod doctor;
pub mod export;
pub mod stop;

use indicatif::{ProgressBar, ProgressStyle};
use kiln_core::{ExportState, Project};
use kiln_runtime::{check_toolchain_prereqs, format_missing};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PROJECT_ERROR: u8 = 2;
pub const EXIT_SERVER_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_state(state: ExportState) -> String {
    use console::Style;
    let text = state.to_string();
    match state {
        ExportState::Finished => Style::new().green().apply_to(text).to_string(),
        ExportState::Cancelled | ExportState::Interrupted => {
            Style::new().red().bold().apply_to(text).to_string()
        }
        ExportState::Cancelling => Style::new().yellow().apply_to(text).to_string(),
        ExportState::Exporting | ExportState::Finishing => {
            Style::new().cyan().apply_to(text).to_string()
        }
    }
}

/// Fail with install hints when the project's toolchain cannot run.
pub fn require_prereqs(project: &Project) -> Result<(), String> {
    let missing = check_toolchain_prereqs(project.layout.root(), &project.config.build);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format_missing(&missing))
    }
}
