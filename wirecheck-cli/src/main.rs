//! ## wirecheck
//! Command-line front end: load a scenario, run a candidate against it and
//! print the verdict. Exits non-zero when a run does not fully pass.

use clap::Parser;
use wirecheck_telemetry::logging::EventLogger;

mod candidates;
mod commands;
mod error;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let config = commands::load_config(&cli)?;
    EventLogger::init(&config.telemetry.log_level)?;
    commands::run_command(cli, config).await?;
    Ok(())
}
