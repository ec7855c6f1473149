//! Upstream source identity and health status.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Availability state of an upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Healthy,
    Unhealthy,
    #[default]
    Unknown,
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Availability::Healthy => "healthy",
            Availability::Unhealthy => "unhealthy",
            Availability::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Static identity of a configured source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Stable identifier, e.g. `"sina"`
    pub id: String,
    /// Display name
    pub name: String,
    /// Tie-break rank, lower is preferred
    pub priority: u32,
}

impl SourceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority,
        }
    }
}

/// Last known health of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatus {
    pub id: String,
    pub name: String,
    pub priority: u32,
    pub last_checked: Option<DateTime<Utc>>,
    /// 0-100, meaningful only as of `last_checked`
    pub health_score: f64,
    pub availability: Availability,
}

impl SourceStatus {
    /// Initial status for a freshly configured source.
    pub fn new(descriptor: &SourceDescriptor) -> Self {
        Self {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            priority: descriptor.priority,
            last_checked: None,
            health_score: 0.0,
            availability: Availability::Unknown,
        }
    }

    /// Record a successful probe. Scores are clamped into 0-100.
    pub fn record_healthy(&mut self, score: f64, at: DateTime<Utc>) {
        self.health_score = score.clamp(0.0, 100.0);
        self.availability = Availability::Healthy;
        self.last_checked = Some(at);
    }

    /// Record a failed probe.
    pub fn record_unhealthy(&mut self, at: DateTime<Utc>) {
        self.health_score = 0.0;
        self.availability = Availability::Unhealthy;
        self.last_checked = Some(at);
    }

    /// Whether the status is older than `max_age` (or was never checked).
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match self.last_checked {
            Some(checked) => now - checked > max_age,
            None => true,
        }
    }

    /// Status as it should be read at `now`: stale entries become unknown.
    pub fn as_of(&self, now: DateTime<Utc>, max_age: Duration) -> Self {
        let mut status = self.clone();
        if status.is_stale(now, max_age) {
            status.availability = Availability::Unknown;
        }
        status
    }

    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.availability == Availability::Healthy
    }

    /// Ranking order: health score descending, then priority ascending.
    pub fn ranking(a: &SourceStatus, b: &SourceStatus) -> Ordering {
        b.health_score
            .total_cmp(&a.health_score)
            .then_with(|| a.priority.cmp(&b.priority))
    }
}
