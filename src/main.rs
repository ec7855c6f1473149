//! Quote ingestion CLI application.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use quotewatch_config::load_config;
use quotewatch_monitor::{setup_logging, LogFormat};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    // Command line flags win over the file
    if let Some(level) = cli.log_level {
        config.logging.level = level.as_str().to_string();
    }
    if cli.json_logs {
        config.logging.format = LogFormat::Json;
    }
    let _log_guard = setup_logging(&config.logging);

    match cli.command {
        Commands::CheckSources => cli::commands::check_sources::run(&config).await,
        Commands::Watch => cli::commands::watch::run(&config).await,
        Commands::Ingest(args) => cli::commands::ingest::run(args, &config).await,
        Commands::Indicators(args) => cli::commands::indicators::run(args, &config).await,
        Commands::ValidateConfig => cli::commands::validate::run(&config).await,
    }
}
