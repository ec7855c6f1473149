//! Per-record quality checks: consistency, completeness and freshness.

use chrono::{DateTime, Utc};
use quotewatch_core::types::{BarDraft, ConsistencyViolation, RawRecord};
use serde::{Deserialize, Serialize};

/// Fixed denominator of the consistency score.
pub const MAX_CONSISTENCY_CHECKS: usize = 10;

/// Fields a provider record must carry by default.
pub const REQUIRED_FIELDS: [&str; 3] = ["symbol", "name", "market"];

/// Result of [`check_consistency`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub passed: bool,
    pub violations: Vec<ConsistencyViolation>,
    /// `1 - violations / 10`, floored at 0
    pub score: f64,
}

impl ConsistencyReport {
    /// Violation names, e.g. `["high<low", "negative_volume"]`.
    pub fn violation_names(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.as_str().to_string()).collect()
    }
}

/// Result of [`check_completeness`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub missing: Vec<String>,
    pub required: usize,
    /// `1 - missing / required`
    pub score: f64,
}

impl CompletenessReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Result of [`check_freshness`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreshnessReport {
    pub is_fresh: bool,
    pub hours_since_update: f64,
    pub threshold_hours: f64,
    /// Decays linearly from 1 to 0 over twice the threshold
    pub score: f64,
}

/// Check the OHLC ordering invariant, non-negative prices and volume.
pub fn check_consistency(bar: &BarDraft) -> ConsistencyReport {
    let violations = bar.violations();
    let score = (1.0 - violations.len() as f64 / MAX_CONSISTENCY_CHECKS as f64).max(0.0);

    ConsistencyReport {
        passed: violations.is_empty(),
        violations,
        score,
    }
}

/// Check the default required field set.
pub fn check_completeness(record: &RawRecord) -> CompletenessReport {
    check_required_fields(record, &REQUIRED_FIELDS)
}

/// Check that every field in `required` is present and non-empty.
pub fn check_required_fields<S: AsRef<str>>(record: &RawRecord, required: &[S]) -> CompletenessReport {
    let missing: Vec<String> = required
        .iter()
        .map(|field| field.as_ref())
        .filter(|field| !record.is_present(field))
        .map(str::to_string)
        .collect();

    let score = if required.is_empty() {
        1.0
    } else {
        1.0 - missing.len() as f64 / required.len() as f64
    };

    CompletenessReport {
        missing,
        required: required.len(),
        score,
    }
}

/// Check how long ago `last_update` happened relative to `now`.
///
/// Timestamps in the future count as zero hours old.
pub fn check_freshness(
    last_update: DateTime<Utc>,
    threshold_hours: f64,
    now: DateTime<Utc>,
) -> FreshnessReport {
    let elapsed_ms = (now - last_update).num_milliseconds().max(0);
    let hours_since_update = elapsed_ms as f64 / 3_600_000.0;

    let score = if threshold_hours > 0.0 {
        (1.0 - hours_since_update / (threshold_hours * 2.0)).clamp(0.0, 1.0)
    } else if hours_since_update == 0.0 {
        1.0
    } else {
        0.0
    };

    FreshnessReport {
        is_fresh: hours_since_update <= threshold_hours,
        hours_since_update,
        threshold_hours,
        score,
    }
}
