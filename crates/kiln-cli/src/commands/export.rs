use super::{colorize_state, json_pretty, require_prereqs, EXIT_FAILURE, EXIT_SUCCESS};
use kiln_core::{
    error_chain, preflight, CoreError, EventChannel, ExportLock, ExportOptions, Exporter,
};
use kiln_runtime::{GradleToolchain, OutputLine};
use kiln_schema::SiteLayout;
use kiln_tui::{InlineView, KeyReader};
use std::path::Path;
use std::time::Instant;
use tracing::debug;

pub fn run(
    root: &Path,
    layout: Option<SiteLayout>,
    notty: bool,
    check_prereqs: bool,
    json: bool,
) -> Result<u8, String> {
    let project = preflight(root).map_err(|e| e.to_string())?;
    if check_prereqs {
        require_prereqs(&project)?;
    }
    let _lock =
        ExportLock::acquire(&project.layout.export_lock_file()).map_err(|e| e.to_string())?;

    let layout = layout.unwrap_or(project.config.export.layout);
    if layout == SiteLayout::Static && !json {
        print_static_layout_warning();
    }

    let toolchain = GradleToolchain::new(project.layout.root(), project.config.build.clone());
    let exporter = Exporter::new(&toolchain, ExportOptions::from_config(&project.config.export));
    let interactive = !notty && !json && console::Term::stdout().is_term();
    debug!(
        "exporting {} with {} ({})",
        project.layout.root().display(),
        toolchain.program().display(),
        if interactive { "interactive" } else { "batch" }
    );

    if interactive {
        run_interactive(&exporter, layout)
    } else {
        run_batch(&exporter, layout, json)
    }
}

fn print_static_layout_warning() {
    let style = console::Style::new().yellow();
    eprintln!(
        "{}",
        style.apply_to(
            "warning: exporting with the static layout. Server-side features (API routes, \
             API streams) are not available in a static site."
        )
    );
}

fn run_interactive(exporter: &Exporter<'_>, layout: SiteLayout) -> Result<u8, String> {
    let events = EventChannel::new();
    let mut view = InlineView::stdout()?;
    let keys = KeyReader::spawn(events.sender())?;

    let result = exporter.run_interactive(layout, &events, &mut view);

    keys.stop();
    view.finish()?;
    drop(view);

    let session = result.map_err(|e| e.to_string())?;
    debug!("export session ended: {:?}", session.history());
    Ok(if session.succeeded() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    })
}

fn run_batch(exporter: &Exporter<'_>, layout: SiteLayout, json: bool) -> Result<u8, String> {
    let started = Instant::now();
    let mut sink = |line: &OutputLine| {
        if json || line.is_error() {
            eprintln!("{}", line.text);
        } else {
            println!("{}", line.text);
        }
    };

    let result = exporter.run_batch(layout, &mut sink);
    let elapsed_ms = started.elapsed().as_millis();

    if json {
        let payload = match &result {
            Ok(report) => serde_json::json!({
                "layout": layout.to_string(),
                "status": "finished",
                "export_code": report.export_code,
                "stop_code": report.stop_code,
                "elapsed_ms": elapsed_ms,
            }),
            Err(e) => serde_json::json!({
                "layout": layout.to_string(),
                "status": failure_status(e),
                "export_code": failed_export_code(e),
                "error": error_chain(e),
                "elapsed_ms": elapsed_ms,
            }),
        };
        println!("{}", json_pretty(&payload)?);
    }

    match result {
        Ok(_) => {
            if !json {
                println!(
                    "export {} ({layout} layout, {:.1}s)",
                    colorize_state(kiln_core::ExportState::Finished),
                    started.elapsed().as_secs_f64()
                );
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => Err(error_chain(&e)),
    }
}

fn failed_export_code(err: &CoreError) -> Option<i32> {
    match err {
        CoreError::BuildFailed(code) => Some(*code),
        _ => None,
    }
}

fn failure_status(err: &CoreError) -> &'static str {
    match err {
        CoreError::BuildFailed(_) => "failed",
        CoreError::Interrupted => "interrupted",
        _ => "error",
    }
}
