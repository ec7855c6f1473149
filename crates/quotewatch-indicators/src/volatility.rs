//! Volatility indicators.

use crate::simd;
use quotewatch_core::traits::Indicator;
use serde::{Deserialize, Serialize};

/// Bollinger Bands output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerOutput {
    /// Upper band (middle + k * std_dev)
    pub upper: f64,
    /// Middle band (SMA)
    pub middle: f64,
    /// Lower band (middle - k * std_dev)
    pub lower: f64,
}

/// Bollinger Bands indicator.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    /// Create Bollinger Bands with default parameters (20, 2.0).
    pub fn new() -> Self {
        Self::with_params(20, 2.0)
    }

    /// Create Bollinger Bands with custom parameters.
    pub fn with_params(period: usize, std_dev_multiplier: f64) -> Self {
        assert!(period > 0, "Period must be greater than 0");
        assert!(
            std_dev_multiplier > 0.0,
            "Std dev multiplier must be positive"
        );
        Self {
            period,
            std_dev_multiplier,
        }
    }
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for BollingerBands {
    type Output = BollingerOutput;

    fn calculate(&self, data: &[f64]) -> Vec<Option<BollingerOutput>> {
        (0..data.len())
            .map(|i| {
                if i + 1 < self.period {
                    return None;
                }
                let window = &data[i + 1 - self.period..=i];
                let middle = simd::mean_simd(window)?;
                let std_dev = simd::std_dev_simd(window, middle);
                Some(BollingerOutput {
                    upper: middle + self.std_dev_multiplier * std_dev,
                    middle,
                    lower: middle - self.std_dev_multiplier * std_dev,
                })
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "BollingerBands"
    }
}
