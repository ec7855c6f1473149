//! Deterministic quote provider for tests and offline runs.

use async_trait::async_trait;
use quotewatch_core::error::{DataError, SourceError};
use quotewatch_core::traits::{ProbeReport, QuoteProvider};
use quotewatch_core::types::{DateRange, RawRecord};
use quotewatch_data::normalize::{parse_trade_date, DATE_FIELDS};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// What the next probes of a [`StaticProvider`] do.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeScript {
    /// Succeed with this score.
    Score(f64),
    /// Return an error.
    Fail(String),
    /// Never complete.
    Hang,
    /// Panic inside the probe task.
    Panic,
}

#[derive(Debug)]
struct FixtureState {
    probe: ProbeScript,
    latency_ms: u64,
    records: HashMap<String, Vec<RawRecord>>,
    fetch_failure: Option<SourceError>,
    probe_calls: usize,
    fetch_calls: usize,
}

/// Quote provider driven entirely by scripted state.
///
/// Clones share state, so a test can keep a handle and re-script the
/// provider after handing it to the monitor.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    id: String,
    state: Arc<Mutex<FixtureState>>,
}

impl StaticProvider {
    /// Create a provider that reports a perfect score and has no data.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Arc::new(Mutex::new(FixtureState {
                probe: ProbeScript::Score(100.0),
                latency_ms: 1,
                records: HashMap::new(),
                fetch_failure: None,
                probe_calls: 0,
                fetch_calls: 0,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FixtureState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the probe script.
    pub fn with_probe(self, script: ProbeScript) -> Self {
        self.set_probe(script);
        self
    }

    /// Set a fixed probe score.
    pub fn with_score(self, score: f64) -> Self {
        self.with_probe(ProbeScript::Score(score))
    }

    /// Serve `records` for `symbol`.
    pub fn with_records(self, symbol: &str, records: Vec<RawRecord>) -> Self {
        self.set_records(symbol, records);
        self
    }

    pub fn set_probe(&self, script: ProbeScript) {
        self.state().probe = script;
    }

    pub fn set_records(&self, symbol: &str, records: Vec<RawRecord>) {
        self.state().records.insert(symbol.to_string(), records);
    }

    /// Make every fetch fail with `error`; `None` restores normal fetches.
    pub fn set_fetch_failure(&self, error: Option<SourceError>) {
        self.state().fetch_failure = error;
    }

    pub fn probe_calls(&self) -> usize {
        self.state().probe_calls
    }

    pub fn fetch_calls(&self) -> usize {
        self.state().fetch_calls
    }
}

#[async_trait]
impl QuoteProvider for StaticProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let mut state = self.state();
        state.fetch_calls += 1;

        if let Some(error) = &state.fetch_failure {
            return Err(error.clone());
        }

        let records = state
            .records
            .get(symbol)
            .ok_or_else(|| DataError::SymbolNotFound(symbol.to_string()))?;

        Ok(records
            .iter()
            .filter(|record| {
                record
                    .get_any(DATE_FIELDS)
                    .and_then(|value| parse_trade_date(value).ok())
                    .map_or(true, |date| range.contains(date))
            })
            .cloned()
            .collect())
    }

    async fn probe(&self) -> Result<ProbeReport, SourceError> {
        let (script, latency_ms) = {
            let mut state = self.state();
            state.probe_calls += 1;
            (state.probe.clone(), state.latency_ms)
        };

        match script {
            ProbeScript::Score(score) => Ok(ProbeReport::new(score, latency_ms)),
            ProbeScript::Fail(reason) => Err(SourceError::Connection(reason)),
            ProbeScript::Hang => {
                std::future::pending::<()>().await;
                Err(SourceError::Connection("unreachable".into()))
            }
            ProbeScript::Panic => panic!("scripted probe panic for {}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(date: &str) -> RawRecord {
        RawRecord::new().with("date", date).with("close", "10")
    }

    #[tokio::test]
    async fn test_scripted_probe() {
        let provider = StaticProvider::new("sina").with_score(82.0);
        assert_eq!(provider.probe().await.unwrap().health_score, 82.0);

        provider.set_probe(ProbeScript::Fail("refused".into()));
        assert!(provider.probe().await.is_err());
        assert_eq!(provider.probe_calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_filters_range() {
        let provider = StaticProvider::new("sina").with_records(
            "600000",
            vec![record("2024-01-02"), record("2024-01-03"), record("2024-01-04")],
        );
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
        )
        .unwrap();

        assert_eq!(provider.fetch_bars("600000", range).await.unwrap().len(), 2);
        assert!(provider.fetch_bars("000001", range).await.is_err());
        assert_eq!(provider.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_scripted_fetch_failure() {
        let provider = StaticProvider::new("sina").with_records("600000", vec![record("2024-01-02")]);
        provider.set_fetch_failure(Some(SourceError::Api("503".into())));

        assert_eq!(
            provider.fetch_bars("600000", DateRange::all()).await,
            Err(SourceError::Api("503".into()))
        );

        provider.set_fetch_failure(None);
        assert!(provider.fetch_bars("600000", DateRange::all()).await.is_ok());
    }
}
