//! Indicator trait definitions.

/// Trait for causal technical indicators over a single input series.
///
/// Output is aligned with the input: element `i` is computed only from
/// `data[..=i]` and is `None` while the indicator is still warming up.
pub trait Indicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Calculate indicator values for the given data.
    ///
    /// # Arguments
    /// * `data` - Input data (typically closes or volumes), oldest first
    ///
    /// # Returns
    /// A vector with the same length as `data`
    fn calculate(&self, data: &[f64]) -> Vec<Option<Self::Output>>;

    /// Get the minimum data points required for the first defined value.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;
}

/// Indicator that needs the high/low range as well as the close.
pub trait OhlcIndicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Calculate indicator values from aligned high, low and close series.
    fn calculate_ohlc(&self, high: &[f64], low: &[f64], close: &[f64]) -> Vec<Self::Output>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;
}
