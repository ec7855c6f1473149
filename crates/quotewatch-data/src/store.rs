//! In-memory bar store.

use async_trait::async_trait;
use chrono::NaiveDate;
use quotewatch_core::error::StorageError;
use quotewatch_core::traits::{BarRepository, PurgeSummary};
use quotewatch_core::types::{Bar, BarSeries, DateRange, IndicatorRow, UpsertOutcome};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::debug;

/// Bars and indicator rows of one instrument.
#[derive(Debug, Clone)]
struct Instrument {
    bars: BarSeries,
    indicators: BTreeMap<NaiveDate, IndicatorRow>,
}

impl Instrument {
    fn new(symbol: &str) -> Self {
        Self {
            bars: BarSeries::new(symbol),
            indicators: BTreeMap::new(),
        }
    }
}

/// In-memory [`BarRepository`], keyed by symbol then trading date.
#[derive(Debug, Default)]
pub struct BarStore {
    instruments: RwLock<HashMap<String, Instrument>>,
}

impl BarStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbols with at least one stored bar, sorted.
    pub async fn symbols(&self) -> Vec<String> {
        let instruments = self.instruments.read().await;
        let mut symbols: Vec<String> = instruments
            .iter()
            .filter(|(_, data)| !data.bars.is_empty())
            .map(|(symbol, _)| symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }

    /// Snapshot of a symbol's full bar series.
    pub async fn series(&self, symbol: &str) -> Option<BarSeries> {
        let instruments = self.instruments.read().await;
        instruments.get(symbol).map(|data| data.bars.clone())
    }

    /// Date of the newest stored bar.
    pub async fn latest_date(&self, symbol: &str) -> Option<NaiveDate> {
        let instruments = self.instruments.read().await;
        instruments
            .get(symbol)
            .and_then(|data| data.bars.last())
            .map(Bar::date)
    }

    pub async fn bar_count(&self, symbol: &str) -> usize {
        let instruments = self.instruments.read().await;
        instruments.get(symbol).map_or(0, |data| data.bars.len())
    }
}

#[async_trait]
impl BarRepository for BarStore {
    async fn upsert_bar(&self, bar: Bar) -> Result<UpsertOutcome, StorageError> {
        let mut instruments = self.instruments.write().await;
        let data = instruments
            .entry(bar.symbol().to_string())
            .or_insert_with(|| Instrument::new(bar.symbol()));

        data.bars
            .upsert(bar)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn upsert_indicator(&self, row: IndicatorRow) -> Result<(), StorageError> {
        let mut instruments = self.instruments.write().await;
        let data = instruments
            .get_mut(&row.symbol)
            .filter(|data| data.bars.get(row.date).is_some())
            .ok_or_else(|| StorageError::BarNotFound {
                symbol: row.symbol.clone(),
                date: row.date,
            })?;

        data.indicators.insert(row.date, row);
        Ok(())
    }

    async fn read_series(&self, symbol: &str, range: DateRange) -> Result<Vec<Bar>, StorageError> {
        let instruments = self.instruments.read().await;
        Ok(instruments
            .get(symbol)
            .map(|data| data.bars.range(range).cloned().collect())
            .unwrap_or_default())
    }

    async fn read_indicators(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<Vec<IndicatorRow>, StorageError> {
        let instruments = self.instruments.read().await;
        Ok(instruments
            .get(symbol)
            .map(|data| {
                data.indicators
                    .range(range.start()..=range.end())
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn purge_before(&self, cutoff: NaiveDate) -> Result<PurgeSummary, StorageError> {
        let mut instruments = self.instruments.write().await;
        let mut summary = PurgeSummary::default();

        for (symbol, data) in instruments.iter_mut() {
            let bars_removed = data.bars.remove_before(cutoff);
            let kept = data.indicators.split_off(&cutoff);
            let rows_removed = data.indicators.len();
            data.indicators = kept;

            if bars_removed > 0 || rows_removed > 0 {
                debug!(%symbol, bars_removed, rows_removed, %cutoff, "Purged old data");
            }
            summary.bars_removed += bars_removed;
            summary.indicator_rows_removed += rows_removed;
        }

        instruments.retain(|_, data| !data.bars.is_empty());
        Ok(summary)
    }
}
