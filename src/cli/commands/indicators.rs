//! Indicators command: compute indicators and signals for one CSV file.

use anyhow::{Context, Result};
use quotewatch_config::AppConfig;
use quotewatch_indicators::IndicatorEngine;
use quotewatch_signals::{SignalDetector, SignalSummary};
use serde::Serialize;
use tracing::info;

use crate::cli::IndicatorsArgs;

#[derive(Serialize)]
struct IndicatorOutput<'a> {
    rows: &'a [quotewatch_core::types::IndicatorRow],
    summary: SignalSummary,
}

pub async fn run(args: IndicatorsArgs, config: &AppConfig) -> Result<()> {
    config.signals.validate().context("Invalid signal settings")?;
    let engine = IndicatorEngine::new(config.indicators.clone())
        .context("Invalid indicator settings")?;
    let detector = SignalDetector::new(config.signals.clone());

    let path = args.data.to_string_lossy();
    let bars = quotewatch_data::load_csv(&path, &args.symbol)
        .await
        .with_context(|| format!("Failed to load {}", path))?;
    info!(symbol = %args.symbol, bars = bars.len(), "Loaded bars");

    let mut rows = engine.compute(&bars);
    detector.apply(&mut rows);

    let summary = SignalSummary::from_rows(&args.symbol, &rows);
    let start = args.last.map_or(0, |n| rows.len().saturating_sub(n));
    let output = IndicatorOutput {
        rows: &rows[start..],
        summary,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
