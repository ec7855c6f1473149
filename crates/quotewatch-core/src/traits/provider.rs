//! Upstream quote provider trait.

use crate::error::SourceError;
use crate::types::{DateRange, RawRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of a successful health probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Health score in 0-100
    pub health_score: f64,
    /// Round-trip latency of the probe
    pub latency_ms: u64,
}

impl ProbeReport {
    pub fn new(health_score: f64, latency_ms: u64) -> Self {
        Self {
            health_score,
            latency_ms,
        }
    }

    /// Whether the score is a usable number in 0-100.
    pub fn is_well_formed(&self) -> bool {
        self.health_score.is_finite() && (0.0..=100.0).contains(&self.health_score)
    }
}

/// Trait for upstream daily quote providers.
///
/// One implementation per provider. Wire formats stay opaque: providers hand
/// back key-value records that the pipeline normalizes.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Stable source identifier matching the configured source id.
    fn id(&self) -> &str;

    /// Fetch daily bars for a symbol.
    ///
    /// # Arguments
    /// * `symbol` - The instrument to fetch
    /// * `range` - Inclusive trading-date range
    ///
    /// # Returns
    /// Raw records, in whatever order the provider returns them
    async fn fetch_bars(&self, symbol: &str, range: DateRange)
        -> Result<Vec<RawRecord>, SourceError>;

    /// Probe the provider's health.
    ///
    /// Callers bound this with a timeout; implementations need not.
    async fn probe(&self) -> Result<ProbeReport, SourceError>;
}
