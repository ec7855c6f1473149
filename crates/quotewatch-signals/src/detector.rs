//! Signal detection over consecutive indicator rows.
//!
//! Three independent rule families vote:
//! - MACD histogram crossing zero
//! - K crossing D
//! - RSI against overbought/oversold thresholds
//!
//! The side with more votes wins and its vote count is the strength. Equal
//! votes resolve to neutral.

use quotewatch_core::types::{IndicatorRow, SignalDirection, SignalEvent, SignalRule};
use quotewatch_core::PipelineError;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// RSI column used for the overbought/oversold rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RsiWindow {
    #[default]
    Rsi6,
    Rsi12,
    Rsi24,
}

impl RsiWindow {
    fn value(&self, row: &IndicatorRow) -> Option<f64> {
        match self {
            RsiWindow::Rsi6 => row.rsi6,
            RsiWindow::Rsi12 => row.rsi12,
            RsiWindow::Rsi24 => row.rsi24,
        }
    }
}

/// Configuration for the signal detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// RSI at or above this contributes a sell bias
    pub rsi_overbought: f64,
    /// RSI at or below this contributes a buy bias
    pub rsi_oversold: f64,
    pub rsi_window: RsiWindow,
    /// Upper bound of the strength score
    pub max_strength: u8,
    /// Skip signal emission while running on a fallback source
    pub suppress_when_degraded: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            rsi_window: RsiWindow::Rsi6,
            max_strength: 5,
            suppress_when_degraded: true,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(self.rsi_overbought) || !in_range(self.rsi_oversold) {
            return Err(PipelineError::Config(
                "RSI thresholds must be within 0-100".into(),
            ));
        }
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(PipelineError::Config(format!(
                "rsi_oversold ({}) must be below rsi_overbought ({})",
                self.rsi_oversold, self.rsi_overbought
            )));
        }
        if self.max_strength == 0 {
            return Err(PipelineError::Config(
                "max_strength must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of evaluating one row against its predecessor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalEvaluation {
    pub direction: SignalDirection,
    pub strength: u8,
    /// Rules agreeing with `direction`; empty when neutral
    pub contributing: Vec<SignalRule>,
    pub buy_votes: usize,
    pub sell_votes: usize,
}

impl SignalEvaluation {
    pub fn is_neutral(&self) -> bool {
        self.direction == SignalDirection::Neutral
    }

    /// Event for the notification sink, `None` when neutral.
    pub fn to_event(&self, row: &IndicatorRow) -> Option<SignalEvent> {
        if self.is_neutral() {
            return None;
        }
        Some(SignalEvent {
            symbol: row.symbol.clone(),
            date: row.date,
            direction: self.direction,
            strength: self.strength,
            contributing: self.contributing.clone(),
        })
    }
}

/// Classifies indicator rows as buy, sell or neutral.
#[derive(Debug, Clone, Default)]
pub struct SignalDetector {
    config: SignalConfig,
}

impl SignalDetector {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Rules that fire on `current`, in a fixed order.
    ///
    /// Cross rules need `previous`; without it only the RSI rule can fire.
    pub fn rules(&self, previous: Option<&IndicatorRow>, current: &IndicatorRow) -> Vec<SignalRule> {
        let mut rules = Vec::new();

        if let Some(prev) = previous {
            if let (Some(before), Some(now)) = (prev.macd_histogram, current.macd_histogram) {
                if before < 0.0 && now >= 0.0 {
                    rules.push(SignalRule::MacdGoldenCross);
                } else if before >= 0.0 && now < 0.0 {
                    rules.push(SignalRule::MacdDeathCross);
                }
            }

            if let (Some(pk), Some(pd), Some(k), Some(d)) = (prev.k, prev.d, current.k, current.d) {
                if pk <= pd && k > d {
                    rules.push(SignalRule::KdjGoldenCross);
                } else if pk >= pd && k < d {
                    rules.push(SignalRule::KdjDeathCross);
                }
            }
        }

        if let Some(rsi) = self.config.rsi_window.value(current) {
            if rsi <= self.config.rsi_oversold {
                rules.push(SignalRule::RsiOversold);
            } else if rsi >= self.config.rsi_overbought {
                rules.push(SignalRule::RsiOverbought);
            }
        }

        rules
    }

    /// Vote the fired rules into a direction and strength.
    pub fn evaluate(&self, previous: Option<&IndicatorRow>, current: &IndicatorRow) -> SignalEvaluation {
        let rules = self.rules(previous, current);

        let buy_votes = rules
            .iter()
            .filter(|r| r.bias() == SignalDirection::Buy)
            .count();
        let sell_votes = rules.len() - buy_votes;

        let direction = match buy_votes.cmp(&sell_votes) {
            std::cmp::Ordering::Greater => SignalDirection::Buy,
            std::cmp::Ordering::Less => SignalDirection::Sell,
            std::cmp::Ordering::Equal => SignalDirection::Neutral,
        };

        let contributing: Vec<SignalRule> = if direction == SignalDirection::Neutral {
            Vec::new()
        } else {
            rules.into_iter().filter(|r| r.bias() == direction).collect()
        };

        let strength = contributing
            .len()
            .min(self.config.max_strength as usize) as u8;

        SignalEvaluation {
            direction,
            strength,
            contributing,
            buy_votes,
            sell_votes,
        }
    }

    /// Evaluate every row against its predecessor and record the verdict.
    pub fn apply(&self, rows: &mut [IndicatorRow]) {
        let mut previous: Option<IndicatorRow> = None;

        for row in rows.iter_mut() {
            let evaluation = self.evaluate(previous.as_ref(), row);
            row.set_signal(evaluation.direction, evaluation.strength);
            previous = Some(row.clone());
        }

        debug!(
            rows = rows.len(),
            signals = rows.iter().filter(|r| r.direction() != SignalDirection::Neutral).count(),
            "Applied signal detection"
        );
    }

    /// Evaluate the newest row of a history.
    pub fn evaluate_latest(&self, rows: &[IndicatorRow]) -> Option<SignalEvaluation> {
        let (current, rest) = rows.split_last()?;
        Some(self.evaluate(rest.last(), current))
    }
}
