//! Moving average indicators.

use crate::simd;
use quotewatch_core::traits::Indicator;

/// Simple Moving Average (SMA).
///
/// Arithmetic mean of the last N values. Undefined until N values exist.
#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// Create a new SMA with the specified period.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        Self { period }
    }
}

impl Indicator for Sma {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<Option<f64>> {
        simd::rolling_mean(data, self.period)
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "SMA"
    }
}

/// Exponential Moving Average (EMA).
///
/// Seeded with the first observation and then updated recursively with
/// `alpha = 2 / (span + 1)`. Defined from the first bar onward.
#[derive(Debug, Clone)]
pub struct Ema {
    multiplier: f64,
}

impl Ema {
    /// Create a new EMA with the specified span.
    pub fn new(span: usize) -> Self {
        assert!(span > 0, "Span must be greater than 0");
        let multiplier = 2.0 / (span as f64 + 1.0);
        Self { multiplier }
    }

    /// Dense EMA series, same length as `data`.
    pub fn series(&self, data: &[f64]) -> Vec<f64> {
        let mut result = Vec::with_capacity(data.len());
        let mut iter = data.iter();

        let Some(&first) = iter.next() else {
            return result;
        };

        let mut ema = first;
        result.push(ema);

        for &value in iter {
            ema += self.multiplier * (value - ema);
            result.push(ema);
        }

        result
    }
}

impl Indicator for Ema {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<Option<f64>> {
        self.series(data).into_iter().map(Some).collect()
    }

    fn period(&self) -> usize {
        1
    }

    fn name(&self) -> &str {
        "EMA"
    }
}
