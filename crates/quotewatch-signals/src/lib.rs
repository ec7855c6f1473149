//! Signal detection.
//!
//! Turns indicator rows into buy/sell/neutral verdicts with a strength score,
//! and summarizes the signals found over a window.

mod detector;
mod summary;

pub use detector::{RsiWindow, SignalConfig, SignalDetector, SignalEvaluation};
pub use summary::{SignalEntry, SignalSummary};
