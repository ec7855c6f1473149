//! Daily OHLCV bar types.

use chrono::NaiveDate;
use num_traits::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::DateRange;
use crate::error::DataError;

/// Whether a stored bar may feed signal generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    /// Passed every quality check.
    #[default]
    Verified,
    /// Stored, but excluded from signal generation until corrected.
    Flagged,
}

/// A broken OHLCV invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsistencyViolation {
    HighBelowLow,
    HighBelowOpen,
    HighBelowClose,
    LowAboveOpen,
    LowAboveClose,
    NegativePrice,
    NegativeVolume,
}

impl ConsistencyViolation {
    /// Stable short name, e.g. `"high<open"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyViolation::HighBelowLow => "high<low",
            ConsistencyViolation::HighBelowOpen => "high<open",
            ConsistencyViolation::HighBelowClose => "high<close",
            ConsistencyViolation::LowAboveOpen => "low>open",
            ConsistencyViolation::LowAboveClose => "low>close",
            ConsistencyViolation::NegativePrice => "negative_price",
            ConsistencyViolation::NegativeVolume => "negative_volume",
        }
    }
}

impl fmt::Display for ConsistencyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated bar as produced by normalizing a provider record.
///
/// Volume is signed so that a negative upstream value survives until the
/// consistency check can name it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarDraft {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    #[serde(default)]
    pub amount: Decimal,
    #[serde(default)]
    pub pre_close: Option<Decimal>,
    #[serde(default)]
    pub change: Option<Decimal>,
    #[serde(default)]
    pub change_percent: Option<Decimal>,
    #[serde(default)]
    pub turnover_rate: Option<Decimal>,
    #[serde(default)]
    pub amplitude: Option<Decimal>,
    #[serde(default)]
    pub quality: DataQuality,
}

impl BarDraft {
    /// Create a draft with the mandatory OHLCV fields.
    pub fn new(
        symbol: impl Into<String>,
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            open,
            high,
            low,
            close,
            volume,
            amount: Decimal::ZERO,
            pre_close: None,
            change: None,
            change_percent: None,
            turnover_rate: None,
            amplitude: None,
            quality: DataQuality::Verified,
        }
    }

    /// Every OHLCV invariant this draft breaks, in a fixed order.
    pub fn violations(&self) -> Vec<ConsistencyViolation> {
        let mut violations = Vec::new();

        if self.high < self.low {
            violations.push(ConsistencyViolation::HighBelowLow);
        }
        if self.high < self.open {
            violations.push(ConsistencyViolation::HighBelowOpen);
        }
        if self.high < self.close {
            violations.push(ConsistencyViolation::HighBelowClose);
        }
        if self.low > self.open {
            violations.push(ConsistencyViolation::LowAboveOpen);
        }
        if self.low > self.close {
            violations.push(ConsistencyViolation::LowAboveClose);
        }
        if [self.open, self.high, self.low, self.close]
            .iter()
            .any(|p| *p < Decimal::ZERO)
        {
            violations.push(ConsistencyViolation::NegativePrice);
        }
        if self.volume < 0 {
            violations.push(ConsistencyViolation::NegativeVolume);
        }

        violations
    }
}

/// One trading day for one instrument.
///
/// Only constructed through [`Bar::try_from`] on a [`BarDraft`], so every
/// value of this type satisfies `low <= open, close <= high` with
/// non-negative prices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BarDraft")]
pub struct Bar {
    symbol: String,
    date: NaiveDate,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: u64,
    amount: Decimal,
    pre_close: Option<Decimal>,
    change: Option<Decimal>,
    change_percent: Option<Decimal>,
    turnover_rate: Option<Decimal>,
    amplitude: Option<Decimal>,
    quality: DataQuality,
}

impl TryFrom<BarDraft> for Bar {
    type Error = DataError;

    fn try_from(draft: BarDraft) -> Result<Self, Self::Error> {
        if draft.symbol.trim().is_empty() {
            return Err(DataError::MissingField("symbol".into()));
        }

        let violations = draft.violations();
        if !violations.is_empty() {
            let names: Vec<&str> = violations.iter().map(|v| v.as_str()).collect();
            return Err(DataError::InvalidBar(format!(
                "{} {}: {}",
                draft.symbol,
                draft.date,
                names.join(", ")
            )));
        }

        Ok(Self {
            symbol: draft.symbol,
            date: draft.date,
            open: draft.open,
            high: draft.high,
            low: draft.low,
            close: draft.close,
            volume: draft.volume as u64,
            amount: draft.amount,
            pre_close: draft.pre_close,
            change: draft.change,
            change_percent: draft.change_percent,
            turnover_rate: draft.turnover_rate,
            amplitude: draft.amplitude,
            quality: draft.quality,
        })
    }
}

impl From<Bar> for BarDraft {
    fn from(bar: Bar) -> Self {
        Self {
            symbol: bar.symbol,
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume as i64,
            amount: bar.amount,
            pre_close: bar.pre_close,
            change: bar.change,
            change_percent: bar.change_percent,
            turnover_rate: bar.turnover_rate,
            amplitude: bar.amplitude,
            quality: bar.quality,
        }
    }
}

impl Bar {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn open(&self) -> Decimal {
        self.open
    }

    pub fn high(&self) -> Decimal {
        self.high
    }

    pub fn low(&self) -> Decimal {
        self.low
    }

    pub fn close(&self) -> Decimal {
        self.close
    }

    pub fn volume(&self) -> u64 {
        self.volume
    }

    /// Turnover value.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn pre_close(&self) -> Option<Decimal> {
        self.pre_close
    }

    pub fn change(&self) -> Option<Decimal> {
        self.change
    }

    pub fn change_percent(&self) -> Option<Decimal> {
        self.change_percent
    }

    pub fn turnover_rate(&self) -> Option<Decimal> {
        self.turnover_rate
    }

    pub fn amplitude(&self) -> Option<Decimal> {
        self.amplitude
    }

    pub fn quality(&self) -> DataQuality {
        self.quality
    }

    /// Mark the bar with a different quality level.
    pub fn with_quality(mut self, quality: DataQuality) -> Self {
        self.quality = quality;
        self
    }

    /// Whether this bar may contribute to signal generation.
    #[inline]
    pub fn is_verified(&self) -> bool {
        self.quality == DataQuality::Verified
    }

    /// Close price as f64 for indicator math.
    #[inline]
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or_default()
    }

    #[inline]
    pub fn high_f64(&self) -> f64 {
        self.high.to_f64().unwrap_or_default()
    }

    #[inline]
    pub fn low_f64(&self) -> f64 {
        self.low.to_f64().unwrap_or_default()
    }

    #[inline]
    pub fn volume_f64(&self) -> f64 {
        self.volume as f64
    }
}

/// Result of writing a bar into a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    Unchanged,
}

impl UpsertOutcome {
    /// Whether the stored bar changed.
    pub fn is_change(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

/// Date-ordered bars for one instrument, at most one per trading date.
#[derive(Debug, Clone, Default)]
pub struct BarSeries {
    symbol: String,
    bars: BTreeMap<NaiveDate, Bar>,
}

impl BarSeries {
    /// Create a new empty bar series.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bars: BTreeMap::new(),
        }
    }

    /// Build a series from bars of one instrument. Later duplicates win.
    pub fn from_bars(
        symbol: impl Into<String>,
        bars: impl IntoIterator<Item = Bar>,
    ) -> Result<Self, DataError> {
        let mut series = Self::new(symbol);
        for bar in bars {
            series.upsert(bar)?;
        }
        Ok(series)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Insert or replace the bar for its date.
    pub fn upsert(&mut self, bar: Bar) -> Result<UpsertOutcome, DataError> {
        if bar.symbol() != self.symbol {
            return Err(DataError::InvalidBar(format!(
                "bar for {} written into series {}",
                bar.symbol(),
                self.symbol
            )));
        }

        match self.bars.get(&bar.date()) {
            Some(existing) if *existing == bar => Ok(UpsertOutcome::Unchanged),
            Some(_) => {
                self.bars.insert(bar.date(), bar);
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.bars.insert(bar.date(), bar);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    /// Remove every bar dated before `cutoff`, returning how many were removed.
    pub fn remove_before(&mut self, cutoff: NaiveDate) -> usize {
        let kept = self.bars.split_off(&cutoff);
        let removed = self.bars.len();
        self.bars = kept;
        removed
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Bar> {
        self.bars.get(&date)
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.values().next()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.values().next_back()
    }

    /// Iterate bars in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.values()
    }

    /// Bars whose date falls inside `range`, ascending.
    pub fn range(&self, range: DateRange) -> impl Iterator<Item = &Bar> {
        self.bars.range(range.start()..=range.end()).map(|(_, bar)| bar)
    }

    pub fn to_vec(&self) -> Vec<Bar> {
        self.bars.values().cloned().collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.keys().copied().collect()
    }

    /// Extract close prices as a vector.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.values().map(|b| b.close_f64()).collect()
    }

    /// Extract high prices as a vector.
    pub fn highs(&self) -> Vec<f64> {
        self.bars.values().map(|b| b.high_f64()).collect()
    }

    /// Extract low prices as a vector.
    pub fn lows(&self) -> Vec<f64> {
        self.bars.values().map(|b| b.low_f64()).collect()
    }

    /// Extract volumes as a vector.
    pub fn volumes(&self) -> Vec<f64> {
        self.bars.values().map(|b| b.volume_f64()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn draft(d: u32, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> BarDraft {
        BarDraft::new("600000", day(d), open, high, low, close, 1_000)
    }

    #[test]
    fn test_valid_draft_becomes_bar() {
        let bar = Bar::try_from(draft(2, dec!(10), dec!(11), dec!(9.5), dec!(10.5))).unwrap();

        assert_eq!(bar.symbol(), "600000");
        assert_eq!(bar.high(), dec!(11));
        assert_eq!(bar.volume(), 1_000);
        assert!(bar.is_verified());
        assert!((bar.close_f64() - 10.5).abs() < 1e-12);
    }

    #[test]
    fn test_high_below_open_is_named() {
        let violations = draft(2, dec!(10), dec!(8), dec!(5), dec!(9)).violations();

        assert!(violations.contains(&ConsistencyViolation::HighBelowOpen));
        assert!(violations.contains(&ConsistencyViolation::HighBelowClose));
        assert!(!violations.contains(&ConsistencyViolation::HighBelowLow));
    }

    #[test]
    fn test_invalid_draft_is_rejected() {
        let mut bad = draft(2, dec!(10), dec!(11), dec!(9), dec!(10));
        bad.volume = -5;

        let err = Bar::try_from(bad).unwrap_err();
        assert!(matches!(err, DataError::InvalidBar(msg) if msg.contains("negative_volume")));
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"symbol":"600000","date":"2024-01-02","open":"10","high":"8",
            "low":"5","close":"9","volume":100}"#;

        assert!(serde_json::from_str::<Bar>(json).is_err());

        let json = r#"{"symbol":"600000","date":"2024-01-02","open":"10","high":"11",
            "low":"9","close":"10","volume":100}"#;
        let bar: Bar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.quality(), DataQuality::Verified);
    }

    #[test]
    fn test_series_upsert_outcomes() {
        let mut series = BarSeries::new("600000");
        let bar = Bar::try_from(draft(2, dec!(10), dec!(11), dec!(9), dec!(10))).unwrap();

        assert_eq!(series.upsert(bar.clone()).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(series.upsert(bar.clone()).unwrap(), UpsertOutcome::Unchanged);

        let corrected = Bar::try_from(draft(2, dec!(10), dec!(12), dec!(9), dec!(11))).unwrap();
        assert_eq!(series.upsert(corrected).unwrap(), UpsertOutcome::Updated);
        assert_eq!(series.len(), 1);
        assert_eq!(series.last().unwrap().close(), dec!(11));
    }

    #[test]
    fn test_series_rejects_foreign_symbol() {
        let mut series = BarSeries::new("000001");
        let bar = Bar::try_from(draft(2, dec!(10), dec!(11), dec!(9), dec!(10))).unwrap();

        assert!(series.upsert(bar).is_err());
    }

    #[test]
    fn test_series_orders_and_extracts() {
        let bars = vec![
            Bar::try_from(draft(3, dec!(10), dec!(12), dec!(9), dec!(11))).unwrap(),
            Bar::try_from(draft(2, dec!(10), dec!(11), dec!(9), dec!(10))).unwrap(),
        ];
        let mut series = BarSeries::from_bars("600000", bars).unwrap();

        assert_eq!(series.dates(), vec![day(2), day(3)]);
        assert_eq!(series.closes(), vec![10.0, 11.0]);
        assert_eq!(series.highs(), vec![11.0, 12.0]);

        assert_eq!(series.remove_before(day(3)), 1);
        assert_eq!(series.first().unwrap().date(), day(3));
    }
}
