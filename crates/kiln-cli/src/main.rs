mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_PROJECT_ERROR, EXIT_SERVER_ERROR};
use kiln_core::install_signal_handler;
use kiln_schema::SiteLayout;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "kiln",
    version,
    about = "Export orchestrator for Gradle-built web sites"
)]
struct Cli {
    /// Project directory (or any directory inside it).
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a production export of the site and stop the server afterwards.
    Export {
        /// Site layout to export (defaults to export.layout in .kiln/conf.toml).
        #[arg(long)]
        layout: Option<SiteLayout>,
        /// Plain line output even when stdout is a terminal.
        #[arg(long, default_value_t = false)]
        notty: bool,
    },
    /// Stop the server started for this project.
    Stop,
    /// Run diagnostic checks on the toolchain and project.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("KILN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let json_output = cli.json;
    let needs_toolchain = matches!(cli.command, Commands::Export { .. } | Commands::Stop);
    let check_prereqs =
        needs_toolchain && std::env::var("KILN_SKIP_PREREQS").as_deref() != Ok("1");

    let result = match cli.command {
        Commands::Export { layout, notty } => commands::export::run(
            &cli.root,
            layout,
            notty,
            check_prereqs,
            json_output,
        ),
        Commands::Stop => commands::stop::run(&cli.root, check_prereqs, json_output),
        Commands::Doctor => commands::doctor::run(&cli.root, json_output),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("project error:") {
                EXIT_PROJECT_ERROR
            } else if msg.starts_with("server error:") {
                EXIT_SERVER_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
