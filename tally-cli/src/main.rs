//! Tally CLI entry point.

use clap::Parser;
use std::io;
use tally_cli::args::Cli;
use tally_cli::commands::{execute, load_config};
use tally_cli::error::CliError;
use tally_cli::telemetry::init_logging;

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(cli.log_json)?;

    let config = load_config(&cli)?;
    tracing::debug!(
        catalog = %config.catalog_path.display(),
        ledger = %config.ledger_path.display(),
        "Configuration loaded"
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(&cli.command, &config, cli.json, &mut out)
}
