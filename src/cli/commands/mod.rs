//! CLI command implementations.

pub mod check_sources;
pub mod indicators;
pub mod ingest;
pub mod validate;
pub mod watch;

use anyhow::{Context, Result};
use quotewatch_config::AppConfig;
use quotewatch_core::traits::{Clock, SystemClock};
use quotewatch_sources::{build_monitor, SourceHealthMonitor};
use std::sync::Arc;

/// Validate the configuration and build a monitor over its sources.
pub(crate) fn monitor_from_config(config: &AppConfig) -> Result<Arc<SourceHealthMonitor>> {
    config.validate().context("Invalid configuration")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let monitor = build_monitor(&config.sources, config.health.monitor_settings(), clock)
        .context("Failed to set up sources")?;
    Ok(Arc::new(monitor))
}
