//! Source health monitor.
//!
//! Each configured source owns a `watch` cell holding its last known
//! [`SourceStatus`]. A check cycle probes every source on its own task and
//! commits the results only once all probes have finished, so dropping an
//! in-flight cycle leaves the previous statuses untouched. Reads never wait
//! on a cycle.

use chrono::{DateTime, Utc};
use quotewatch_core::error::SourceError;
use quotewatch_core::traits::{Clock, QuoteProvider};
use quotewatch_core::types::{Availability, SourceDescriptor, SourceStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Timing and threshold settings for the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    /// Interval between check cycles; statuses older than this read as unknown
    pub check_interval: Duration,
    /// Upper bound on a single probe
    pub probe_timeout: Duration,
    /// Minimum score, exclusive, for a source to be primary
    pub primary_threshold: f64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(5),
            primary_threshold: 70.0,
        }
    }
}

/// The source selected for fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimarySource {
    pub id: String,
    pub name: String,
    pub health_score: f64,
    /// No source qualified; this is the lowest-priority-number fallback
    pub degraded: bool,
}

/// Snapshot of every source's health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub total_sources: usize,
    pub healthy_sources: usize,
    /// `healthy / total * 100`
    pub health_rate: f64,
    pub primary_source: PrimarySource,
    pub sources: Vec<SourceStatus>,
    pub timestamp: DateTime<Utc>,
}

/// Per-source state.
struct SourceCell {
    provider: Arc<dyn QuoteProvider>,
    status: watch::Sender<SourceStatus>,
}

enum ProbeOutcome {
    Healthy(f64),
    Unhealthy(String),
}

/// Tracks upstream source health and picks the primary source.
pub struct SourceHealthMonitor {
    cells: Vec<SourceCell>,
    /// Index of the lowest priority number, used in degraded mode
    fallback: usize,
    settings: MonitorSettings,
    clock: Arc<dyn Clock>,
}

impl SourceHealthMonitor {
    /// Create a monitor over at least one source.
    pub fn new(
        sources: Vec<(SourceDescriptor, Arc<dyn QuoteProvider>)>,
        settings: MonitorSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SourceError> {
        if sources.is_empty() {
            return Err(SourceError::NoSourcesConfigured);
        }

        let mut seen = HashSet::new();
        for (descriptor, _) in &sources {
            if !seen.insert(descriptor.id.clone()) {
                return Err(SourceError::DuplicateSource(descriptor.id.clone()));
            }
        }

        // min_by_key keeps the first of equal priorities, i.e. config order
        let fallback = sources
            .iter()
            .enumerate()
            .min_by_key(|(_, (descriptor, _))| descriptor.priority)
            .map(|(i, _)| i)
            .unwrap_or_default();

        let cells = sources
            .into_iter()
            .map(|(descriptor, provider)| {
                let (status, _) = watch::channel(SourceStatus::new(&descriptor));
                SourceCell { provider, status }
            })
            .collect();

        Ok(Self {
            cells,
            fallback,
            settings,
            clock,
        })
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// One interval, plus the time the next cycle may spend probing.
    fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.settings.check_interval + self.settings.probe_timeout)
            .unwrap_or_else(|_| chrono::Duration::weeks(52))
    }

    /// Probe every source concurrently and record the results.
    ///
    /// Returns all statuses ranked by health score, then priority. Fails only
    /// when every probe task panicked, in which case nothing is recorded.
    pub async fn check_all(&self) -> Result<Vec<SourceStatus>, SourceError> {
        let mut probes = JoinSet::new();

        for (index, cell) in self.cells.iter().enumerate() {
            let provider = Arc::clone(&cell.provider);
            let source_id = cell.status.borrow().id.clone();
            let timeout = self.settings.probe_timeout;

            probes.spawn(async move {
                let outcome = match tokio::time::timeout(timeout, provider.probe()).await {
                    Ok(Ok(report)) if report.is_well_formed() => {
                        ProbeOutcome::Healthy(report.health_score)
                    }
                    Ok(Ok(report)) => ProbeOutcome::Unhealthy(
                        SourceError::MalformedPayload(format!(
                            "health score {}",
                            report.health_score
                        ))
                        .to_string(),
                    ),
                    Ok(Err(e)) => ProbeOutcome::Unhealthy(e.to_string()),
                    Err(_) => ProbeOutcome::Unhealthy(
                        SourceError::Timeout {
                            source_id,
                            timeout_ms: timeout.as_millis() as u64,
                        }
                        .to_string(),
                    ),
                };
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<ProbeOutcome>> =
            self.cells.iter().map(|_| None).collect();
        let mut crashed = 0usize;

        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => {
                    crashed += 1;
                    warn!(error = %e, "Probe task failed");
                }
            }
        }

        if crashed == self.cells.len() {
            warn!(sources = crashed, "Every probe failed, keeping previous statuses");
            return Err(SourceError::AllProbesFailed);
        }

        let now = self.clock.now();
        for (cell, outcome) in self.cells.iter().zip(outcomes) {
            cell.status.send_modify(|status| match outcome {
                Some(ProbeOutcome::Healthy(score)) => {
                    debug!(source = %status.id, score, "Probe succeeded");
                    status.record_healthy(score, now);
                }
                Some(ProbeOutcome::Unhealthy(reason)) => {
                    debug!(source = %status.id, %reason, "Probe failed");
                    status.record_unhealthy(now);
                }
                None => status.record_unhealthy(now),
            });
        }

        let ranked = self.ranked();
        info!(
            healthy = ranked.iter().filter(|s| s.is_healthy()).count(),
            total = ranked.len(),
            "Source check cycle complete"
        );
        Ok(ranked)
    }

    /// Current statuses in configuration order, stale entries as unknown.
    pub fn statuses(&self) -> Vec<SourceStatus> {
        let now = self.clock.now();
        let max_age = self.stale_after();
        self.cells
            .iter()
            .map(|cell| cell.status.borrow().as_of(now, max_age))
            .collect()
    }

    /// Current statuses ranked by health score, then priority.
    pub fn ranked(&self) -> Vec<SourceStatus> {
        let mut statuses = self.statuses();
        statuses.sort_by(SourceStatus::ranking);
        statuses
    }

    /// Source to fetch from right now.
    ///
    /// Picks the best healthy source scoring above the threshold, else falls
    /// back to the lowest priority number regardless of health.
    pub fn primary_source(&self) -> PrimarySource {
        let statuses = self.statuses();
        Self::select_primary(&statuses, self.fallback, self.settings.primary_threshold)
    }

    fn select_primary(statuses: &[SourceStatus], fallback: usize, threshold: f64) -> PrimarySource {
        let best = statuses
            .iter()
            .filter(|s| s.availability == Availability::Healthy && s.health_score > threshold)
            .min_by(|a, b| SourceStatus::ranking(a, b));

        match best {
            Some(status) => PrimarySource {
                id: status.id.clone(),
                name: status.name.clone(),
                health_score: status.health_score,
                degraded: false,
            },
            None => {
                let status = &statuses[fallback];
                PrimarySource {
                    id: status.id.clone(),
                    name: status.name.clone(),
                    health_score: status.health_score,
                    degraded: true,
                }
            }
        }
    }

    /// Pure read of the current state; never triggers a check.
    pub fn health_report(&self) -> HealthReport {
        let statuses = self.statuses();
        let primary_source =
            Self::select_primary(&statuses, self.fallback, self.settings.primary_threshold);

        let total_sources = statuses.len();
        let healthy_sources = statuses.iter().filter(|s| s.is_healthy()).count();
        let health_rate = if total_sources == 0 {
            0.0
        } else {
            healthy_sources as f64 / total_sources as f64 * 100.0
        };

        let mut sources = statuses;
        sources.sort_by(SourceStatus::ranking);

        HealthReport {
            total_sources,
            healthy_sources,
            health_rate,
            primary_source,
            sources,
            timestamp: self.clock.now(),
        }
    }

    /// Provider registered under `id`.
    pub fn provider(&self, id: &str) -> Option<Arc<dyn QuoteProvider>> {
        self.cells
            .iter()
            .find(|cell| cell.status.borrow().id == id)
            .map(|cell| Arc::clone(&cell.provider))
    }

    /// Providers in the order fetches should try them: the primary first,
    /// then the rest ranked.
    pub fn failover_order(&self) -> Vec<(String, Arc<dyn QuoteProvider>)> {
        let primary = self.primary_source();
        let mut order = vec![primary.id.clone()];
        order.extend(
            self.ranked()
                .into_iter()
                .map(|status| status.id)
                .filter(|id| *id != primary.id),
        );

        order
            .into_iter()
            .filter_map(|id| self.provider(&id).map(|provider| (id, provider)))
            .collect()
    }

    /// Watch one source's raw status cell.
    pub fn subscribe(&self, id: &str) -> Option<watch::Receiver<SourceStatus>> {
        self.cells
            .iter()
            .find(|cell| cell.status.borrow().id == id)
            .map(|cell| cell.status.subscribe())
    }

    /// Run check cycles every `check_interval` until `shutdown` flips to
    /// true or its sender is dropped. An in-flight cycle is abandoned on
    /// shutdown.
    pub async fn run_periodic(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.settings.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_primary: Option<String> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("Shutdown handle dropped");
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    info!("Check cycle cancelled by shutdown");
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                result = self.check_all() => {
                    if let Err(e) = result {
                        warn!(error = %e, "Check cycle failed");
                    }
                }
            }

            let primary = self.primary_source();
            if last_primary.as_deref() != Some(primary.id.as_str()) {
                info!(
                    source = %primary.id,
                    score = primary.health_score,
                    degraded = primary.degraded,
                    "Primary source changed"
                );
                last_primary = Some(primary.id);
            }
        }

        info!("Source monitor stopped");
    }
}
