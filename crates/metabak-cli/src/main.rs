//! Metabak CLI - Command-line utility for decoding and inspecting filesystem
//! metadata backups.

mod cli;
mod commands;
mod error;
mod output;
mod progress;

use anyhow::Result;
use clap::Parser;
use output::OutputFormatter;
use progress::SegmentProgress;
use std::process::ExitCode;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

/// Overrides the log filter derived from `--verbose`/`--quiet`.
const LOG_ENV: &str = "METABAK_LOG";

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let formatter = output::create_formatter(cli.json, cli.verbose, cli.quiet);
    let subscriber = build_subscriber(cli.verbose, cli.quiet);

    // Scoped to this invocation rather than installed globally.
    let result = tracing::subscriber::with_default(subscriber, || run(&cli, &*formatter));

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            formatter.format_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &cli::Cli, formatter: &dyn OutputFormatter) -> Result<()> {
    match &cli.command {
        cli::Commands::Load(args) => {
            let show_progress = !cli.quiet && !cli.json && SegmentProgress::should_show();
            commands::load::execute(args, formatter, show_progress)
        }
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(())
        }
    }
}

fn build_subscriber(verbose: bool, quiet: bool) -> impl Subscriber + Send + Sync {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("metabak={level},metabak_core={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish()
}
