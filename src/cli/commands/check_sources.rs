//! Check sources command implementation.

use anyhow::{Context, Result};
use quotewatch_config::AppConfig;
use tracing::info;

use super::monitor_from_config;

pub async fn run(config: &AppConfig) -> Result<()> {
    let monitor = monitor_from_config(config)?;

    info!(sources = monitor.len(), "Checking sources");
    monitor.check_all().await.context("Check cycle failed")?;

    let report = monitor.health_report();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
