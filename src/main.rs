//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to [`runner::run`].

use clap::Parser;
use kumiki::{cli::Cli, runner};
use runner::ExecutionResult;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;

/// Exit status telling the caller to run the actions another way.
const EXIT_UNAVAILABLE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let max_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    fmt()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();
    match runner::run(&cli) {
        Ok(ExecutionResult::Succeeded) => ExitCode::SUCCESS,
        Ok(ExecutionResult::Unavailable) => ExitCode::from(EXIT_UNAVAILABLE),
        Ok(ExecutionResult::Failed) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("runner failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}
