//! Data quality checks for incoming bars.
//!
//! Provides consistency, completeness and freshness checks, price and volume
//! anomaly detection, and the gate that turns them into a store/flag/reject
//! verdict.

mod anomaly;
mod checker;
mod gate;

pub use anomaly::{
    detect_missing_dates, detect_price_anomalies, detect_volume_anomalies, weekdays,
    PriceAnomaly, VolumeAnomaly,
};
pub use checker::{
    check_completeness, check_consistency, check_freshness, check_required_fields,
    CompletenessReport, ConsistencyReport, FreshnessReport, MAX_CONSISTENCY_CHECKS,
    REQUIRED_FIELDS,
};
pub use gate::{AnomalyScan, QualityGate, QualityThresholds, Verdict};
