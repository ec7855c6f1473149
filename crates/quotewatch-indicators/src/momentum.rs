//! Momentum indicators.

use crate::moving_average::Ema;
use crate::simd;
use quotewatch_core::traits::{Indicator, OhlcIndicator};
use serde::{Deserialize, Serialize};

/// Relative Strength Index (RSI).
///
/// Uses plain rolling means of gains and losses over the last `period`
/// close-to-close changes, so it needs `period + 1` closes.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    /// Create a new RSI indicator.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }

    fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss <= 0.0 {
            // No losses in the window: fully overbought, including flat windows.
            100.0
        } else {
            (100.0 - 100.0 / (1.0 + avg_gain / avg_loss)).clamp(0.0, 100.0)
        }
    }
}

impl Indicator for Rsi {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<Option<f64>> {
        let mut result = vec![None; data.len()];
        if data.len() <= self.period {
            return result;
        }

        let mut gains = Vec::with_capacity(data.len() - 1);
        let mut losses = Vec::with_capacity(data.len() - 1);

        for pair in data.windows(2) {
            let change = pair[1] - pair[0];
            if change > 0.0 {
                gains.push(change);
                losses.push(0.0);
            } else {
                gains.push(0.0);
                losses.push(-change);
            }
        }

        // changes[j] is the move into close j + 1
        for i in self.period..data.len() {
            let window = i - self.period..i;
            let avg_gain = simd::sum_simd(&gains[window.clone()]) / self.period as f64;
            let avg_loss = simd::sum_simd(&losses[window]) / self.period as f64;
            result[i] = Some(Self::from_averages(avg_gain, avg_loss));
        }

        result
    }

    fn period(&self) -> usize {
        self.period + 1 // Need period+1 data points
    }

    fn name(&self) -> &str {
        "RSI"
    }
}

/// MACD (Moving Average Convergence Divergence) output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdOutput {
    /// MACD line (fast EMA - slow EMA)
    pub macd: f64,
    /// Signal line (EMA of MACD)
    pub signal: f64,
    /// Histogram (MACD - Signal)
    pub histogram: f64,
}

/// MACD indicator.
///
/// All three EMAs are seeded with their first input, so every bar has a
/// value.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    /// Create a new MACD with default parameters (12, 26, 9).
    pub fn new() -> Self {
        Self::with_periods(12, 26, 9)
    }

    /// Create a MACD with custom periods.
    pub fn with_periods(fast: usize, slow: usize, signal: usize) -> Self {
        assert!(fast > 0 && slow > 0 && signal > 0);
        assert!(fast < slow, "Fast period must be less than slow period");
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Macd {
    type Output = MacdOutput;

    fn calculate(&self, data: &[f64]) -> Vec<Option<MacdOutput>> {
        let fast = self.fast.series(data);
        let slow = self.slow.series(data);

        let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal_line = self.signal.series(&macd_line);

        macd_line
            .into_iter()
            .zip(signal_line)
            .map(|(macd, signal)| {
                Some(MacdOutput {
                    macd,
                    signal,
                    histogram: macd - signal,
                })
            })
            .collect()
    }

    fn period(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "MACD"
    }
}

/// KDJ stochastic output for one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct KdjOutput {
    /// Raw stochastic, 0-100
    pub k: Option<f64>,
    /// Moving average of K
    pub d: Option<f64>,
    /// 3K - 2D, not clamped
    pub j: Option<f64>,
}

impl KdjOutput {
    pub fn is_defined(&self) -> bool {
        self.k.is_some() && self.d.is_some()
    }
}

/// KDJ stochastic oscillator.
///
/// K is the close's position inside the trailing high/low range. It is
/// undefined when that range is zero. D averages the last `d_period` K
/// values and is undefined if any of them is.
#[derive(Debug, Clone)]
pub struct Kdj {
    k_period: usize,
    d_period: usize,
}

impl Kdj {
    /// Create a KDJ with default parameters (9, 3).
    pub fn new() -> Self {
        Self::with_periods(9, 3)
    }

    pub fn with_periods(k_period: usize, d_period: usize) -> Self {
        assert!(k_period > 0 && d_period > 0, "Periods must be greater than 0");
        Self { k_period, d_period }
    }

    fn raw_k(&self, high: &[f64], low: &[f64], close: &[f64], i: usize) -> Option<f64> {
        if i + 1 < self.k_period {
            return None;
        }
        let start = i + 1 - self.k_period;
        let (_, highest) = simd::minmax_simd(&high[start..=i])?;
        let (lowest, _) = simd::minmax_simd(&low[start..=i])?;

        let range = highest - lowest;
        if range <= 0.0 {
            return None;
        }
        Some((100.0 * (close[i] - lowest) / range).clamp(0.0, 100.0))
    }
}

impl Default for Kdj {
    fn default() -> Self {
        Self::new()
    }
}

impl OhlcIndicator for Kdj {
    type Output = KdjOutput;

    fn calculate_ohlc(&self, high: &[f64], low: &[f64], close: &[f64]) -> Vec<KdjOutput> {
        let len = high.len().min(low.len()).min(close.len());

        let k_values: Vec<Option<f64>> = (0..len)
            .map(|i| self.raw_k(high, low, close, i))
            .collect();

        (0..len)
            .map(|i| {
                let k = k_values[i];
                let d = if i + 1 < self.d_period {
                    None
                } else {
                    k_values[i + 1 - self.d_period..=i]
                        .iter()
                        .copied()
                        .collect::<Option<Vec<f64>>>()
                        .and_then(|window| simd::mean_simd(&window))
                };
                let j = match (k, d) {
                    (Some(k), Some(d)) => Some(3.0 * k - 2.0 * d),
                    _ => None,
                };
                KdjOutput { k, d, j }
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.k_period + self.d_period - 1
    }

    fn name(&self) -> &str {
        "KDJ"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsi_all_gains() {
        let rsi = Rsi::new(6);
        let data: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let result = rsi.calculate(&data);

        assert_eq!(result.len(), 10);
        assert!(result[..6].iter().all(Option::is_none));
        assert!((result[6].unwrap() - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_rsi_flat_window_is_100() {
        let rsi = Rsi::new(6);
        let result = rsi.calculate(&[10.0; 8]);
        assert_eq!(result[6], Some(100.0));
        assert_eq!(result[7], Some(100.0));
    }

    #[test]
    fn test_rsi_all_losses_is_zero() {
        let rsi = Rsi::new(6);
        let data: Vec<f64> = (0..8).map(|i| 50.0 - i as f64).collect();
        let result = rsi.calculate(&data);
        assert!(result[7].unwrap().abs() < 1e-10);
    }

    #[test]
    fn test_rsi_bounds() {
        let rsi = Rsi::new(12);
        let data: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.5).sin() * 5.0)
            .collect();

        for value in rsi.calculate(&data).into_iter().flatten() {
            assert!((0.0..=100.0).contains(&value));
        }
    }

    #[test]
    fn test_rsi_mixed_window() {
        // gains 2 + 2, losses 1 + 1 over 4 changes
        let rsi = Rsi::new(4);
        let data = vec![10.0, 12.0, 11.0, 13.0, 12.0];
        let result = rsi.calculate(&data);

        let expected = 100.0 - 100.0 / (1.0 + 1.0 / 0.5);
        assert!((result[4].unwrap() - expected).abs() < 1e-10);
    }

    #[test]
    fn test_macd_defined_from_first_bar() {
        let macd = Macd::new();
        let data: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let result = macd.calculate(&data);

        assert_eq!(result.len(), 30);
        let first = result[0].unwrap();
        assert_eq!(first.macd, 0.0);
        assert_eq!(first.histogram, 0.0);

        // Rising series: fast EMA leads the slow one
        assert!(result[29].unwrap().macd > 0.0);
    }

    #[test]
    fn test_macd_histogram_identity() {
        let macd = Macd::new();
        let data: Vec<f64> = (0..50).map(|i| 20.0 + (i as f64 * 0.4).cos()).collect();

        for out in macd.calculate(&data).into_iter().flatten() {
            assert!((out.histogram - (out.macd - out.signal)).abs() < 1e-12);
        }
    }

    #[test]
    fn test_kdj_warm_up() {
        let kdj = Kdj::new();
        let high: Vec<f64> = (0..15).map(|i| 11.0 + i as f64).collect();
        let low: Vec<f64> = (0..15).map(|i| 9.0 + i as f64).collect();
        let close: Vec<f64> = (0..15).map(|i| 10.5 + i as f64).collect();

        let result = kdj.calculate_ohlc(&high, &low, &close);

        assert_eq!(result.len(), 15);
        assert!(result[7].k.is_none());
        assert!(result[8].k.is_some());
        assert!(result[9].d.is_none());
        assert!(result[10].is_defined());
        assert!(result[10].j.is_some());
    }

    #[test]
    fn test_kdj_values() {
        let kdj = Kdj::with_periods(3, 1);
        let high = vec![10.0, 12.0, 14.0];
        let low = vec![8.0, 9.0, 10.0];
        let close = vec![9.0, 11.0, 12.0];

        let out = kdj.calculate_ohlc(&high, &low, &close)[2];

        // (12 - 8) / (14 - 8)
        let k = 100.0 * 4.0 / 6.0;
        assert!((out.k.unwrap() - k).abs() < 1e-10);
        assert!((out.d.unwrap() - k).abs() < 1e-10);
        assert!((out.j.unwrap() - k).abs() < 1e-10);
    }

    #[test]
    fn test_kdj_zero_range_is_undefined() {
        let kdj = Kdj::new();
        let flat = vec![10.0; 12];
        let result = kdj.calculate_ohlc(&flat, &flat, &flat);

        assert!(result.iter().all(|out| out.k.is_none() && out.d.is_none()));
    }

    #[test]
    fn test_kdj_j_not_clamped() {
        // K jumps from 0 to 100: J overshoots above 100
        let kdj = Kdj::with_periods(2, 2);
        let high = vec![10.0, 10.0, 12.0];
        let low = vec![8.0, 8.0, 8.0];
        let close = vec![9.0, 8.0, 12.0];

        let out = kdj.calculate_ohlc(&high, &low, &close)[2];
        assert_eq!(out.k, Some(100.0));
        assert!(out.j.unwrap() > 100.0);
    }
}
