//! Technical indicators for daily bar series.
//!
//! This crate provides causal implementations of:
//! - Moving averages (SMA, EMA)
//! - Momentum indicators (RSI, MACD, KDJ)
//! - Volatility bands (Bollinger)
//!
//! Every indicator returns output aligned with its input, with `None` while
//! the window is still warming up. Window kernels use SIMD via `wide`.

pub mod engine;
pub mod momentum;
pub mod moving_average;
pub mod simd;
pub mod volatility;

pub use engine::{IndicatorEngine, IndicatorParams};
pub use momentum::{Kdj, KdjOutput, Macd, MacdOutput, Rsi};
pub use moving_average::{Ema, Sma};
pub use volatility::{BollingerBands, BollingerOutput};
