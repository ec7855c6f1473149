//! Watch command implementation.

use anyhow::Result;
use quotewatch_config::AppConfig;
use tokio::sync::watch;
use tracing::{info, warn};

use super::monitor_from_config;

pub async fn run(config: &AppConfig) -> Result<()> {
    let monitor = monitor_from_config(config)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
        let _ = shutdown_tx.send(true);
    });

    info!(
        sources = monitor.len(),
        interval_secs = config.health.check_interval_secs,
        "Watching sources, press Ctrl-C to stop"
    );
    monitor.run_periodic(shutdown_rx).await;

    let report = monitor.health_report();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
