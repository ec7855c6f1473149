//! Ingest command implementation.

use anyhow::{bail, Context, Result};
use quotewatch_config::AppConfig;
use quotewatch_core::traits::{BarRepository, Clock, SignalSink, SystemClock};
use quotewatch_core::types::DateRange;
use quotewatch_data::BarStore;
use quotewatch_monitor::LogSignalSink;
use quotewatch_pipeline::{IngestionPipeline, RunStatus};
use quotewatch_sources::{ProviderKind, SourceSettings};
use std::sync::Arc;
use tracing::{info, warn};

use super::monitor_from_config;
use crate::cli::{IngestArgs, OutputFormat};

pub async fn run(args: IngestArgs, config: &AppConfig) -> Result<()> {
    if args.symbols.is_empty() {
        bail!("At least one symbol is required");
    }
    let range = DateRange::new(args.start, args.end).context("Invalid date range")?;

    let mut config = config.clone();
    if let Some(dir) = &args.data {
        info!(dir = %dir.display(), "Using local CSV directory as the only source");
        config.sources = vec![SourceSettings::new(
            "local",
            "Local CSV",
            0,
            ProviderKind::Csv { dir: dir.clone() },
        )];
    }

    let monitor = monitor_from_config(&config)?;
    monitor.check_all().await.context("Initial source check failed")?;
    let primary = monitor.primary_source();
    info!(
        source = %primary.id,
        score = primary.health_score,
        degraded = primary.degraded,
        "Primary source selected"
    );

    let repository: Arc<dyn BarRepository> = Arc::new(BarStore::new());
    let sink: Arc<dyn SignalSink> = Arc::new(LogSignalSink);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let pipeline = IngestionPipeline::new(
        monitor,
        repository,
        sink,
        clock,
        config.pipeline_settings(),
    )
    .context("Failed to build pipeline")?;

    info!(
        symbols = ?args.symbols,
        start = %range.start(),
        end = %range.end(),
        "Starting ingestion"
    );

    let results = pipeline.run(&args.symbols, range).await;

    let mut failures = 0;
    let mut reports = Vec::new();
    for (symbol, result) in results {
        match result {
            Ok(report) => {
                if report.status() == RunStatus::Failed {
                    failures += 1;
                }
                reports.push(report);
            }
            Err(e) => {
                warn!(%symbol, error = %e, "Ingestion failed");
                failures += 1;
            }
        }
    }

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Text => {
            for report in &reports {
                println!("{}", report.summary());
            }
        }
    }

    pipeline.purge_expired().await.context("Retention purge failed")?;

    if failures == args.symbols.len() {
        bail!("Ingestion failed for every symbol");
    }
    Ok(())
}
