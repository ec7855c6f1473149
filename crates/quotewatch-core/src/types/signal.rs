//! Trading signal types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a detected signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Buy,
    Sell,
    #[default]
    Neutral,
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalDirection::Buy => "buy",
            SignalDirection::Sell => "sell",
            SignalDirection::Neutral => "neutral",
        };
        write!(f, "{}", s)
    }
}

/// An independent threshold rule that can contribute to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalRule {
    /// MACD histogram crossed from negative to non-negative.
    MacdGoldenCross,
    /// MACD histogram crossed from non-negative to negative.
    MacdDeathCross,
    /// K crossed above D.
    KdjGoldenCross,
    /// K crossed below D.
    KdjDeathCross,
    RsiOversold,
    RsiOverbought,
}

impl SignalRule {
    /// Direction this rule argues for.
    pub fn bias(&self) -> SignalDirection {
        match self {
            SignalRule::MacdGoldenCross | SignalRule::KdjGoldenCross | SignalRule::RsiOversold => {
                SignalDirection::Buy
            }
            SignalRule::MacdDeathCross | SignalRule::KdjDeathCross | SignalRule::RsiOverbought => {
                SignalDirection::Sell
            }
        }
    }

    /// Name of the indicator family behind the rule.
    pub fn indicator(&self) -> &'static str {
        match self {
            SignalRule::MacdGoldenCross | SignalRule::MacdDeathCross => "macd",
            SignalRule::KdjGoldenCross | SignalRule::KdjDeathCross => "kdj",
            SignalRule::RsiOversold | SignalRule::RsiOverbought => "rsi",
        }
    }
}

/// Event handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub symbol: String,
    pub date: NaiveDate,
    pub direction: SignalDirection,
    pub strength: u8,
    /// Rules that agreed with `direction`.
    pub contributing: Vec<SignalRule>,
}

impl SignalEvent {
    /// Names of the indicators that contributed.
    pub fn contributing_indicators(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.contributing.iter().map(|r| r.indicator()).collect();
        names.dedup();
        names
    }
}
