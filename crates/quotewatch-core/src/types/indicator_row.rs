//! Derived indicator row, one per stored bar.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::SignalDirection;

/// Indicator values for one (instrument, date).
///
/// Window-based values are `None` until enough history exists. Signal fields
/// are filled in by the signal detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub symbol: String,
    pub date: NaiveDate,

    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma30: Option<f64>,
    pub ma60: Option<f64>,

    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,

    pub k: Option<f64>,
    pub d: Option<f64>,
    pub j: Option<f64>,

    pub rsi6: Option<f64>,
    pub rsi12: Option<f64>,
    pub rsi24: Option<f64>,

    pub boll_upper: Option<f64>,
    pub boll_middle: Option<f64>,
    pub boll_lower: Option<f64>,

    pub volume_ma5: Option<f64>,
    pub volume_ma10: Option<f64>,

    pub buy_signal: bool,
    pub sell_signal: bool,
    pub signal_strength: u8,
}

impl IndicatorRow {
    /// Create an empty row with every value undefined.
    pub fn new(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            date,
            ma5: None,
            ma10: None,
            ma20: None,
            ma30: None,
            ma60: None,
            macd: None,
            macd_signal: None,
            macd_histogram: None,
            k: None,
            d: None,
            j: None,
            rsi6: None,
            rsi12: None,
            rsi24: None,
            boll_upper: None,
            boll_middle: None,
            boll_lower: None,
            volume_ma5: None,
            volume_ma10: None,
            buy_signal: false,
            sell_signal: false,
            signal_strength: 0,
        }
    }

    /// Direction encoded by the signal flags.
    pub fn direction(&self) -> SignalDirection {
        match (self.buy_signal, self.sell_signal) {
            (true, false) => SignalDirection::Buy,
            (false, true) => SignalDirection::Sell,
            _ => SignalDirection::Neutral,
        }
    }

    /// Record a detector verdict on this row.
    pub fn set_signal(&mut self, direction: SignalDirection, strength: u8) {
        self.buy_signal = direction == SignalDirection::Buy;
        self.sell_signal = direction == SignalDirection::Sell;
        self.signal_strength = if direction == SignalDirection::Neutral {
            0
        } else {
            strength
        };
    }

    /// Clear any signal on this row.
    pub fn clear_signal(&mut self) {
        self.set_signal(SignalDirection::Neutral, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_flags() {
        let mut row = IndicatorRow::new("600000", NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(row.direction(), SignalDirection::Neutral);

        row.set_signal(SignalDirection::Buy, 2);
        assert!(row.buy_signal && !row.sell_signal);
        assert_eq!(row.signal_strength, 2);

        row.set_signal(SignalDirection::Neutral, 3);
        assert_eq!(row.direction(), SignalDirection::Neutral);
        assert_eq!(row.signal_strength, 0);
    }
}
