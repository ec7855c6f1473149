//! Per-instrument ingestion reports.

use chrono::{DateTime, NaiveDate, Utc};
use quotewatch_core::types::{ConsistencyViolation, SignalEvent, UpsertOutcome};
use quotewatch_quality::FreshnessReport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall outcome of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every fetched record was stored
    Success,
    /// Some records were rejected, or a fallback source was used
    Partial,
    /// Nothing could be stored
    Failed,
}

/// A record that never reached the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rejection {
    /// Trading date, when the record got far enough to have one
    pub date: Option<NaiveDate>,
    pub reason: String,
    #[serde(default)]
    pub violations: Vec<ConsistencyViolation>,
}

/// What happened while ingesting one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub run_id: Uuid,
    pub symbol: String,
    /// Source that delivered the records
    pub source_id: Option<String>,
    /// Sources tried before `source_id`, with their errors
    pub failed_sources: Vec<(String, String)>,
    /// The monitor had no qualifying source when the run started
    pub degraded: bool,

    pub fetched: usize,
    pub accepted: usize,
    pub flagged: usize,
    pub rejected: usize,
    pub rejections: Vec<Rejection>,

    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Indicator rows rewritten after the earliest changed date
    pub rows_recomputed: usize,

    pub signal: Option<SignalEvent>,
    pub signal_suppressed: bool,

    pub missing_dates: Vec<NaiveDate>,
    pub freshness: Option<FreshnessReport>,
    pub warnings: Vec<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl IngestionReport {
    pub fn new(symbol: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            symbol: symbol.into(),
            source_id: None,
            failed_sources: Vec::new(),
            degraded: false,
            fetched: 0,
            accepted: 0,
            flagged: 0,
            rejected: 0,
            rejections: Vec::new(),
            inserted: 0,
            updated: 0,
            unchanged: 0,
            rows_recomputed: 0,
            signal: None,
            signal_suppressed: false,
            missing_dates: Vec::new(),
            freshness: None,
            warnings: Vec::new(),
            started_at,
            finished_at: None,
        }
    }

    pub(crate) fn record_outcome(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }

    pub(crate) fn reject(
        &mut self,
        date: Option<NaiveDate>,
        reason: impl Into<String>,
        violations: Vec<ConsistencyViolation>,
    ) {
        self.rejected += 1;
        self.rejections.push(Rejection {
            date,
            reason: reason.into(),
            violations,
        });
    }

    /// Bars whose stored value changed.
    pub fn changed(&self) -> usize {
        self.inserted + self.updated
    }

    pub fn status(&self) -> RunStatus {
        if self.fetched > 0 && self.accepted == 0 {
            RunStatus::Failed
        } else if self.rejected > 0 || self.degraded || !self.failed_sources.is_empty() {
            RunStatus::Partial
        } else {
            RunStatus::Success
        }
    }

    /// Wall time of the run in milliseconds.
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }

    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  {}  ({:?})\n", self.symbol, self.status()));
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!(
            "  Source:              {}{}\n",
            self.source_id.as_deref().unwrap_or("-"),
            if self.degraded { " (degraded)" } else { "" }
        ));
        for (source, error) in &self.failed_sources {
            s.push_str(&format!("  Failed source:       {}: {}\n", source, error));
        }
        s.push_str(&format!(
            "  Records:             {} fetched, {} accepted, {} flagged, {} rejected\n",
            self.fetched, self.accepted, self.flagged, self.rejected
        ));
        s.push_str(&format!(
            "  Store:               {} inserted, {} updated, {} unchanged\n",
            self.inserted, self.updated, self.unchanged
        ));
        s.push_str(&format!("  Rows recomputed:     {}\n", self.rows_recomputed));

        match &self.signal {
            Some(event) => s.push_str(&format!(
                "  Signal:              {} {} (strength {})\n",
                event.date, event.direction, event.strength
            )),
            None if self.signal_suppressed => s.push_str("  Signal:              suppressed\n"),
            None => s.push_str("  Signal:              none\n"),
        }

        if !self.missing_dates.is_empty() {
            s.push_str(&format!("  Missing dates:       {}\n", self.missing_dates.len()));
        }
        for warning in &self.warnings {
            s.push_str(&format!("  Warning:             {}\n", warning));
        }

        s
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
