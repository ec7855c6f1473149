//! Persistence collaborator trait.

use crate::error::StorageError;
use crate::types::{Bar, DateRange, IndicatorRow, UpsertOutcome};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Counts removed by a retention purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeSummary {
    pub bars_removed: usize,
    pub indicator_rows_removed: usize,
}

/// Storage for bars and their indicator rows.
///
/// Keyed by (symbol, trading date). Bars are only ever upserted; removal
/// happens solely through retention purges.
#[async_trait]
pub trait BarRepository: Send + Sync {
    /// Insert or replace a bar.
    async fn upsert_bar(&self, bar: Bar) -> Result<UpsertOutcome, StorageError>;

    /// Insert or replace an indicator row.
    async fn upsert_indicator(&self, row: IndicatorRow) -> Result<(), StorageError>;

    /// Bars for a symbol inside `range`, ascending by date.
    async fn read_series(&self, symbol: &str, range: DateRange) -> Result<Vec<Bar>, StorageError>;

    /// Indicator rows for a symbol inside `range`, ascending by date.
    async fn read_indicators(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<Vec<IndicatorRow>, StorageError>;

    /// Remove everything dated before `cutoff`.
    async fn purge_before(&self, cutoff: NaiveDate) -> Result<PurgeSummary, StorageError>;
}
