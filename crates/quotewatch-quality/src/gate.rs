//! Ingestion gate combining the individual checks into one verdict.

use crate::anomaly::{detect_price_anomalies, detect_volume_anomalies, PriceAnomaly, VolumeAnomaly};
use crate::checker::{
    check_consistency, check_freshness, check_required_fields, CompletenessReport, FreshnessReport,
    REQUIRED_FIELDS,
};
use chrono::{DateTime, Utc};
use quotewatch_core::types::{BarDraft, ConsistencyViolation, RawRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Result of screening one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Bar may be stored and used for signals
    Accepted,
    /// Bar may be stored but must not drive signals
    Flagged { reasons: Vec<String> },
    /// Bar must not be stored
    Rejected { violations: Vec<ConsistencyViolation> },
}

impl Verdict {
    /// Whether the bar may be stored.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted | Verdict::Flagged { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Verdict::Rejected { .. })
    }
}

/// Thresholds applied by the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    /// Age after which the newest bar counts as stale
    pub freshness_hours: f64,
    /// Relative close-to-close move flagged as a price anomaly
    pub price_anomaly_fraction: f64,
    /// Multiple of the 10-day mean flagged as a volume spike
    pub volume_anomaly_multiple: f64,
    /// Completeness score below which a record is flagged
    pub min_completeness: f64,
    pub required_fields: Vec<String>,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            freshness_hours: 24.0,
            price_anomaly_fraction: 0.1,
            volume_anomaly_multiple: 3.0,
            min_completeness: 1.0,
            required_fields: REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Anomalies found over a bar series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnomalyScan {
    pub price: Vec<PriceAnomaly>,
    pub volume: Vec<VolumeAnomaly>,
}

impl AnomalyScan {
    pub fn is_empty(&self) -> bool {
        self.price.is_empty() && self.volume.is_empty()
    }

    /// Series indices with at least one anomaly.
    pub fn flagged_indices(&self) -> BTreeSet<usize> {
        self.price
            .iter()
            .map(|a| a.index)
            .chain(self.volume.iter().map(|a| a.index))
            .collect()
    }

    /// Human-readable reasons for index `i`.
    pub fn reasons_for(&self, i: usize) -> Vec<String> {
        let price = self
            .price
            .iter()
            .filter(|a| a.index == i)
            .map(|a| format!("price jump {:.1}%", a.change * 100.0));
        let volume = self
            .volume
            .iter()
            .filter(|a| a.index == i)
            .map(|a| format!("volume spike {:.1}x", a.ratio));
        price.chain(volume).collect()
    }
}

/// Gatekeeper between normalization and the bar store.
#[derive(Debug, Clone, Default)]
pub struct QualityGate {
    thresholds: QualityThresholds,
}

impl QualityGate {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    pub fn completeness(&self, record: &RawRecord) -> CompletenessReport {
        check_required_fields(record, &self.thresholds.required_fields)
    }

    /// Screen a single record and its normalized draft.
    ///
    /// Consistency failures reject. Incomplete records are flagged.
    pub fn screen(&self, record: &RawRecord, draft: &BarDraft) -> Verdict {
        let consistency = check_consistency(draft);
        if !consistency.passed {
            debug!(
                symbol = %draft.symbol,
                date = %draft.date,
                violations = ?consistency.violation_names(),
                "Bar rejected"
            );
            return Verdict::Rejected {
                violations: consistency.violations,
            };
        }

        let completeness = self.completeness(record);
        if completeness.score < self.thresholds.min_completeness {
            return Verdict::Flagged {
                reasons: vec![format!(
                    "completeness {:.2} below {:.2}, missing {}",
                    completeness.score,
                    self.thresholds.min_completeness,
                    completeness.missing.join(", ")
                )],
            };
        }

        Verdict::Accepted
    }

    /// Scan aligned close and volume series for anomalies.
    pub fn scan(&self, closes: &[Decimal], volumes: &[u64]) -> AnomalyScan {
        AnomalyScan {
            price: detect_price_anomalies(closes, self.thresholds.price_anomaly_fraction),
            volume: detect_volume_anomalies(volumes, self.thresholds.volume_anomaly_multiple),
        }
    }

    pub fn freshness(&self, last_update: DateTime<Utc>, now: DateTime<Utc>) -> FreshnessReport {
        check_freshness(last_update, self.thresholds.freshness_hours, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn record() -> RawRecord {
        RawRecord::new()
            .with("symbol", "600519")
            .with("name", "贵州茅台")
            .with("market", "SH")
    }

    fn draft() -> BarDraft {
        BarDraft::new(
            "600519",
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            dec!(1650),
            dec!(1680),
            dec!(1640),
            dec!(1672),
            30_000,
        )
    }

    #[test]
    fn test_clean_bar_accepted() {
        let verdict = QualityGate::default().screen(&record(), &draft());
        assert_eq!(verdict, Verdict::Accepted);
    }

    #[test]
    fn test_inconsistent_bar_rejected() {
        let mut bar = draft();
        bar.close = dec!(1700);

        let verdict = QualityGate::default().screen(&record(), &bar);
        assert!(verdict.is_rejected());
        assert!(!verdict.is_accepted());
    }

    #[test]
    fn test_incomplete_record_flagged() {
        let record = RawRecord::new().with("symbol", "600519");
        let verdict = QualityGate::default().screen(&record, &draft());

        assert!(verdict.is_accepted());
        assert!(matches!(verdict, Verdict::Flagged { .. }));
    }

    #[test]
    fn test_relaxed_completeness() {
        let gate = QualityGate::new(QualityThresholds {
            min_completeness: 0.3,
            ..Default::default()
        });
        let record = RawRecord::new().with("symbol", "600519");
        assert_eq!(gate.screen(&record, &draft()), Verdict::Accepted);
    }

    #[test]
    fn test_scan_reasons() {
        let gate = QualityGate::default();
        let closes = [dec!(10), dec!(10.1), dec!(12)];
        let scan = gate.scan(&closes, &[100, 100, 100]);

        assert!(!scan.is_empty());
        assert_eq!(scan.flagged_indices().into_iter().collect::<Vec<_>>(), vec![2]);
        assert_eq!(scan.reasons_for(2).len(), 1);
        assert!(scan.reasons_for(1).is_empty());
    }
}
