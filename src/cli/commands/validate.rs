//! Validate configuration command.

use anyhow::{Context, Result};
use quotewatch_config::AppConfig;

pub async fn run(config: &AppConfig) -> Result<()> {
    config.validate().context("Configuration is invalid")?;

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("# Configuration is valid");
    println!("{}", rendered);
    Ok(())
}
