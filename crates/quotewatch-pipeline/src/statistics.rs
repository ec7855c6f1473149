//! Descriptive statistics over a trailing window of bars.

use chrono::{DateTime, NaiveDate, Utc};
use quotewatch_core::types::Bar;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Number of trailing bars the statistics cover.
pub const STATISTICS_WINDOW: usize = 100;

/// Number of close-to-close changes kept.
pub const RECENT_CHANGES: usize = 10;

/// Newest bar in the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestBar {
    pub date: NaiveDate,
    pub close: Decimal,
    pub volume: u64,
    pub change: Option<Decimal>,
    pub change_percent: Option<Decimal>,
}

/// Close-to-close move between consecutive bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub date: NaiveDate,
    pub change: Decimal,
    /// `None` when the previous close is zero
    pub change_percent: Option<Decimal>,
}

/// Summary statistics of one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesStatistics {
    pub symbol: String,
    pub data_points: usize,
    pub latest: Option<LatestBar>,
    pub average_close: Decimal,
    pub max_close: Decimal,
    pub min_close: Decimal,
    pub average_volume: f64,
    pub max_volume: u64,
    pub min_volume: u64,
    /// Most recent changes, newest first
    pub recent_changes: Vec<PriceChange>,
    pub calculated_at: DateTime<Utc>,
}

impl SeriesStatistics {
    /// Compute statistics over the last [`STATISTICS_WINDOW`] of `bars`.
    ///
    /// `bars` must be one instrument's history, ascending by date.
    pub fn from_bars(symbol: impl Into<String>, bars: &[Bar], now: DateTime<Utc>) -> Self {
        let window = &bars[bars.len().saturating_sub(STATISTICS_WINDOW)..];

        let mut stats = Self {
            symbol: symbol.into(),
            data_points: window.len(),
            latest: None,
            average_close: Decimal::ZERO,
            max_close: Decimal::ZERO,
            min_close: Decimal::ZERO,
            average_volume: 0.0,
            max_volume: 0,
            min_volume: 0,
            recent_changes: Vec::new(),
            calculated_at: now,
        };

        if window.is_empty() {
            return stats;
        }

        let closes = window.iter().map(Bar::close);
        let total_close: Decimal = closes.clone().sum();
        stats.average_close = (total_close / Decimal::from(window.len())).round_dp(4);
        stats.max_close = closes.clone().max().unwrap_or_default();
        stats.min_close = closes.min().unwrap_or_default();

        let volumes = window.iter().map(Bar::volume);
        stats.average_volume = volumes.clone().map(|v| v as f64).sum::<f64>() / window.len() as f64;
        stats.max_volume = volumes.clone().max().unwrap_or_default();
        stats.min_volume = volumes.min().unwrap_or_default();

        stats.latest = window.last().map(|bar| LatestBar {
            date: bar.date(),
            close: bar.close(),
            volume: bar.volume(),
            change: bar.change(),
            change_percent: bar.change_percent(),
        });

        stats.recent_changes = window
            .windows(2)
            .rev()
            .take(RECENT_CHANGES)
            .map(|pair| {
                let (previous, current) = (&pair[0], &pair[1]);
                let change = current.close() - previous.close();
                let change_percent = (!previous.close().is_zero())
                    .then(|| (change / previous.close() * dec!(100)).round_dp(4));
                PriceChange {
                    date: current.date(),
                    change,
                    change_percent,
                }
            })
            .collect();

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotewatch_core::types::BarDraft;

    fn bar(day: u32, close: Decimal, volume: i64) -> Bar {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day as i64);
        Bar::try_from(BarDraft::new("000001", date, close, close, close, close, volume)).unwrap()
    }

    #[test]
    fn test_basic_statistics() {
        let bars = vec![
            bar(0, dec!(10), 100),
            bar(1, dec!(12), 300),
            bar(2, dec!(11), 200),
        ];

        let stats = SeriesStatistics::from_bars("000001", &bars, Utc::now());

        assert_eq!(stats.data_points, 3);
        assert_eq!(stats.average_close, dec!(11));
        assert_eq!(stats.max_close, dec!(12));
        assert_eq!(stats.min_close, dec!(10));
        assert!((stats.average_volume - 200.0).abs() < 1e-9);
        assert_eq!(stats.max_volume, 300);
        assert_eq!(stats.latest.as_ref().unwrap().close, dec!(11));

        assert_eq!(stats.recent_changes.len(), 2);
        assert_eq!(stats.recent_changes[0].change, dec!(-1));
        assert_eq!(stats.recent_changes[1].change_percent, Some(dec!(20)));
    }

    #[test]
    fn test_window_is_trailing() {
        let bars: Vec<Bar> = (0..150).map(|i| bar(i, Decimal::from(i + 1), 10)).collect();

        let stats = SeriesStatistics::from_bars("000001", &bars, Utc::now());

        assert_eq!(stats.data_points, STATISTICS_WINDOW);
        assert_eq!(stats.min_close, dec!(51));
        assert_eq!(stats.max_close, dec!(150));
        assert_eq!(stats.recent_changes.len(), RECENT_CHANGES);
    }

    #[test]
    fn test_zero_previous_close() {
        let bars = vec![bar(0, dec!(0), 10), bar(1, dec!(5), 10)];
        let stats = SeriesStatistics::from_bars("000001", &bars, Utc::now());
        assert_eq!(stats.recent_changes[0].change_percent, None);
    }

    #[test]
    fn test_empty() {
        let stats = SeriesStatistics::from_bars("000001", &[], Utc::now());
        assert_eq!(stats.data_points, 0);
        assert!(stats.latest.is_none());
    }
}
