//! Signal summaries over a window of indicator rows.

use chrono::NaiveDate;
use quotewatch_core::types::{IndicatorRow, SignalDirection};
use serde::{Deserialize, Serialize};

/// One signalled day with the indicator values behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEntry {
    pub date: NaiveDate,
    pub direction: SignalDirection,
    pub strength: u8,
    pub macd: Option<f64>,
    pub k: Option<f64>,
    pub d: Option<f64>,
    pub rsi6: Option<f64>,
}

/// Buy/sell counts for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub symbol: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub total_signals: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    /// Signalled rows, newest first
    pub entries: Vec<SignalEntry>,
}

impl SignalSummary {
    /// Summarize the signal columns of `rows`.
    pub fn from_rows(symbol: impl Into<String>, rows: &[IndicatorRow]) -> Self {
        let mut entries: Vec<SignalEntry> = rows
            .iter()
            .filter(|row| row.direction() != SignalDirection::Neutral)
            .map(|row| SignalEntry {
                date: row.date,
                direction: row.direction(),
                strength: row.signal_strength,
                macd: row.macd,
                k: row.k,
                d: row.d,
                rsi6: row.rsi6,
            })
            .collect();
        entries.sort_by(|a, b| b.date.cmp(&a.date));

        let buy_signals = entries
            .iter()
            .filter(|e| e.direction == SignalDirection::Buy)
            .count();

        Self {
            symbol: symbol.into(),
            start: rows.iter().map(|row| row.date).min(),
            end: rows.iter().map(|row| row.date).max(),
            total_signals: entries.len(),
            buy_signals,
            sell_signals: entries.len() - buy_signals,
            entries,
        }
    }

    /// Most recent signalled entry.
    pub fn latest(&self) -> Option<&SignalEntry> {
        self.entries.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(day: u32, direction: SignalDirection, strength: u8) -> IndicatorRow {
        let mut row = IndicatorRow::new("000858", NaiveDate::from_ymd_opt(2024, 7, day).unwrap());
        row.rsi6 = Some(day as f64);
        row.set_signal(direction, strength);
        row
    }

    #[test]
    fn test_counts_and_order() {
        let rows = vec![
            row(1, SignalDirection::Buy, 2),
            row(2, SignalDirection::Neutral, 0),
            row(3, SignalDirection::Sell, 1),
            row(4, SignalDirection::Buy, 1),
        ];

        let summary = SignalSummary::from_rows("000858", &rows);

        assert_eq!(summary.total_signals, 3);
        assert_eq!(summary.buy_signals, 2);
        assert_eq!(summary.sell_signals, 1);
        assert_eq!(summary.start, NaiveDate::from_ymd_opt(2024, 7, 1));
        assert_eq!(summary.end, NaiveDate::from_ymd_opt(2024, 7, 4));

        let latest = summary.latest().unwrap();
        assert_eq!(latest.date, NaiveDate::from_ymd_opt(2024, 7, 4).unwrap());
        assert_eq!(latest.rsi6, Some(4.0));
    }

    #[test]
    fn test_empty() {
        let summary = SignalSummary::from_rows("000858", &[]);
        assert_eq!(summary.total_signals, 0);
        assert!(summary.start.is_none());
        assert!(summary.latest().is_none());
    }
}
