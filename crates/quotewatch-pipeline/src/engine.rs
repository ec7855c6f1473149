//! Ingestion pipeline.
//!
//! Runs the fetch -> normalize -> screen -> store -> recompute -> signal flow
//! for one instrument at a time. Work for the same instrument is serialized
//! behind a per-instrument lock; different instruments run concurrently.

use chrono::{Duration, NaiveDate, NaiveTime};
use futures::future::join_all;
use quotewatch_core::error::{PipelineError, SourceError};
use quotewatch_core::traits::{BarRepository, Clock, PurgeSummary, SignalSink};
use quotewatch_core::types::{
    Bar, BarSeries, DataQuality, DateRange, IndicatorRow, InstrumentInfo, RawRecord, SignalEvent,
};
use quotewatch_data::normalize::{infer_market, instrument_code, normalize_record, same_instrument};
use quotewatch_indicators::{IndicatorEngine, IndicatorParams};
use quotewatch_quality::{detect_missing_dates, weekdays, QualityGate, QualityThresholds, Verdict};
use quotewatch_signals::{SignalConfig, SignalDetector, SignalSummary};
use quotewatch_sources::SourceHealthMonitor;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::report::IngestionReport;
use crate::statistics::SeriesStatistics;

/// Pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub quality: QualityThresholds,
    pub indicators: IndicatorParams,
    pub signals: SignalConfig,
    /// Bars older than this many days are purged; 0 keeps everything
    pub retention_days: u32,
    /// Name and market per symbol, for providers that send prices only
    pub instruments: BTreeMap<String, InstrumentInfo>,
}

/// Orchestrates ingestion for any number of instruments.
pub struct IngestionPipeline {
    monitor: Arc<SourceHealthMonitor>,
    repository: Arc<dyn BarRepository>,
    sink: Arc<dyn SignalSink>,
    clock: Arc<dyn Clock>,
    gate: QualityGate,
    engine: IndicatorEngine,
    detector: SignalDetector,
    retention_days: u32,
    instruments: HashMap<String, InstrumentInfo>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IngestionPipeline {
    /// Create a new pipeline, validating indicator and signal settings.
    pub fn new(
        monitor: Arc<SourceHealthMonitor>,
        repository: Arc<dyn BarRepository>,
        sink: Arc<dyn SignalSink>,
        clock: Arc<dyn Clock>,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        settings.signals.validate()?;
        let engine = IndicatorEngine::new(settings.indicators)?;
        let instruments = settings
            .instruments
            .into_iter()
            .map(|(symbol, info)| (instrument_code(&symbol).to_string(), info))
            .collect();

        Ok(Self {
            monitor,
            repository,
            sink,
            clock,
            gate: QualityGate::new(settings.quality),
            engine,
            detector: SignalDetector::new(settings.signals),
            retention_days: settings.retention_days,
            instruments,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn monitor(&self) -> &SourceHealthMonitor {
        &self.monitor
    }

    fn instrument_lock(&self, symbol: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(symbol.to_string()).or_default())
    }

    /// Drop the lock entry for `symbol` once no caller holds or awaits it.
    fn release_lock(&self, symbol: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        drop(lock);
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(symbol).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(symbol);
        }
    }

    /// Ingest several instruments concurrently.
    pub async fn run(
        &self,
        symbols: &[String],
        range: DateRange,
    ) -> Vec<(String, Result<IngestionReport, PipelineError>)> {
        let runs = symbols.iter().map(|symbol| async move {
            (symbol.clone(), self.ingest(symbol, range).await)
        });
        join_all(runs).await
    }

    /// Fetch and ingest one instrument.
    ///
    /// Sources are tried in failover order, the primary first. Only when
    /// every source fails is an error returned.
    pub async fn ingest(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<IngestionReport, PipelineError> {
        let lock = self.instrument_lock(symbol);
        let result = {
            let _guard = lock.lock().await;
            self.fetch_and_process(symbol, range).await
        };
        self.release_lock(symbol, lock);
        result
    }

    async fn fetch_and_process(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<IngestionReport, PipelineError> {
        let mut report = IngestionReport::new(symbol, self.clock.now());
        let primary = self.monitor.primary_source();
        report.degraded = primary.degraded;
        if primary.degraded {
            warn!(%symbol, source = %primary.id, "No healthy source above threshold, using fallback");
        }

        let mut delivered = None;
        for (source_id, provider) in self.monitor.failover_order() {
            match provider.fetch_bars(symbol, range).await {
                Ok(records) => {
                    debug!(%symbol, source = %source_id, count = records.len(), "Fetched records");
                    delivered = Some((source_id, records));
                    break;
                }
                Err(e) => {
                    warn!(%symbol, source = %source_id, error = %e, "Fetch failed, trying next source");
                    report.failed_sources.push((source_id, e.to_string()));
                }
            }
        }

        let Some((source_id, records)) = delivered else {
            return Err(SourceError::AllSourcesFailed {
                symbol: symbol.to_string(),
            }
            .into());
        };
        report.source_id = Some(source_id);

        self.process(symbol, records, range, &mut report).await?;
        Ok(report)
    }

    /// Ingest records already obtained from `source_id`.
    pub async fn ingest_records(
        &self,
        symbol: &str,
        source_id: &str,
        records: Vec<RawRecord>,
    ) -> Result<IngestionReport, PipelineError> {
        let lock = self.instrument_lock(symbol);
        let result = {
            let _guard = lock.lock().await;
            let mut report = IngestionReport::new(symbol, self.clock.now());
            report.source_id = Some(source_id.to_string());
            self.process(symbol, records, DateRange::all(), &mut report)
                .await
                .map(|()| report)
        };
        self.release_lock(symbol, lock);
        result
    }

    /// Everything after the fetch. Caller holds the instrument lock.
    async fn process(
        &self,
        symbol: &str,
        records: Vec<RawRecord>,
        range: DateRange,
        report: &mut IngestionReport,
    ) -> Result<(), PipelineError> {
        report.fetched = records.len();

        let candidates = self.screen(symbol, records, report);

        let existing = self.repository.read_series(symbol, DateRange::all()).await?;
        let candidates = self.flag_anomalies(symbol, existing, candidates, report)?;

        let mut earliest_changed: Option<NaiveDate> = None;
        for bar in candidates {
            let date = bar.date();
            let outcome = self.repository.upsert_bar(bar).await?;
            report.record_outcome(outcome);
            if outcome.is_change() {
                earliest_changed = Some(earliest_changed.map_or(date, |d| d.min(date)));
            }
        }

        if let Some(since) = earliest_changed {
            self.recompute(symbol, since, report).await?;
        }

        self.check_coverage(symbol, range, report).await?;

        report.finished_at = Some(self.clock.now());
        info!(
            %symbol,
            source = report.source_id.as_deref().unwrap_or("-"),
            accepted = report.accepted,
            flagged = report.flagged,
            rejected = report.rejected,
            changed = report.changed(),
            recomputed = report.rows_recomputed,
            "Ingestion complete"
        );
        Ok(())
    }

    /// Fill name and market the provider left out, from the instrument
    /// table or, for the market, from the code itself.
    fn describe(&self, record: &mut RawRecord, provider_symbol: &str) {
        if let Some(info) = self.instruments.get(instrument_code(provider_symbol)) {
            info.fill(record);
        }
        if !record.is_present("market") {
            if let Some(market) = infer_market(provider_symbol) {
                record.insert("market", market);
            }
        }
    }

    /// Normalize and screen records. Returns storable bars for `symbol`,
    /// ascending by date, with later duplicates winning.
    fn screen(&self, symbol: &str, records: Vec<RawRecord>, report: &mut IngestionReport) -> Vec<Bar> {
        let mut accepted: Vec<Bar> = Vec::new();

        for mut record in records {
            let mut draft = match normalize_record(&record, symbol) {
                Ok(draft) => draft,
                Err(e) => {
                    debug!(%symbol, error = %e, "Record could not be normalized");
                    report.reject(None, e.to_string(), Vec::new());
                    continue;
                }
            };

            if !same_instrument(&draft.symbol, symbol) {
                let reason = format!("record for {} does not belong to {}", draft.symbol, symbol);
                warn!(%symbol, date = %draft.date, other = %draft.symbol, "Record for another instrument");
                report.reject(Some(draft.date), reason, Vec::new());
                continue;
            }

            self.describe(&mut record, &draft.symbol);
            if !record.is_present("symbol") {
                record.insert("symbol", symbol);
            }
            draft.symbol = symbol.to_string();

            match self.gate.screen(&record, &draft) {
                Verdict::Rejected { violations } => {
                    let names: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
                    let error = PipelineError::Rejected {
                        symbol: symbol.to_string(),
                        date: draft.date,
                        violations: names,
                    };
                    warn!(%error, "Bar rejected");
                    report.reject(Some(draft.date), error.to_string(), violations);
                    continue;
                }
                Verdict::Flagged { reasons } => {
                    draft.quality = DataQuality::Flagged;
                    report
                        .warnings
                        .extend(reasons.into_iter().map(|r| format!("{}: {}", draft.date, r)));
                }
                Verdict::Accepted => {}
            }

            let date = draft.date;
            match Bar::try_from(draft) {
                Ok(bar) => accepted.push(bar),
                Err(e) => report.reject(Some(date), e.to_string(), Vec::new()),
            }
        }

        // Stable sort keeps arrival order among equal dates
        accepted.sort_by_key(Bar::date);
        let mut deduped: Vec<Bar> = Vec::with_capacity(accepted.len());
        for bar in accepted {
            match deduped.last_mut() {
                Some(last) if last.date() == bar.date() => *last = bar,
                _ => deduped.push(bar),
            }
        }
        deduped
    }

    /// Scan the history as it will look after the upsert and flag anomalous
    /// incoming bars.
    fn flag_anomalies(
        &self,
        symbol: &str,
        existing: Vec<Bar>,
        candidates: Vec<Bar>,
        report: &mut IngestionReport,
    ) -> Result<Vec<Bar>, PipelineError> {
        let mut merged = BarSeries::from_bars(symbol, existing)?;
        for bar in &candidates {
            merged.upsert(bar.clone())?;
        }

        let bars = merged.to_vec();
        let closes: Vec<_> = bars.iter().map(Bar::close).collect();
        let volumes: Vec<u64> = bars.iter().map(Bar::volume).collect();
        let scan = self.gate.scan(&closes, &volumes);

        let incoming: BTreeSet<NaiveDate> = candidates.iter().map(Bar::date).collect();
        let mut reasons: HashMap<NaiveDate, Vec<String>> = HashMap::new();
        for index in scan.flagged_indices() {
            let date = bars[index].date();
            if incoming.contains(&date) {
                reasons.insert(date, scan.reasons_for(index));
            }
        }

        let flagged = candidates
            .into_iter()
            .map(|bar| match reasons.remove(&bar.date()) {
                Some(why) => {
                    report
                        .warnings
                        .extend(why.into_iter().map(|r| format!("{}: {}", bar.date(), r)));
                    bar.with_quality(DataQuality::Flagged)
                }
                None => bar,
            })
            .collect::<Vec<_>>();

        report.flagged = flagged.iter().filter(|bar| !bar.is_verified()).count();
        report.accepted = flagged.len();
        Ok(flagged)
    }

    /// Recompute indicator rows from `since`, apply signals, and emit the
    /// newest signal if it qualifies.
    async fn recompute(
        &self,
        symbol: &str,
        since: NaiveDate,
        report: &mut IngestionReport,
    ) -> Result<(), PipelineError> {
        let bars = self.repository.read_series(symbol, DateRange::all()).await?;
        let mut rows = self.engine.compute(&bars);
        self.detector.apply(&mut rows);

        let flagged: BTreeSet<NaiveDate> = bars
            .iter()
            .filter(|bar| !bar.is_verified())
            .map(Bar::date)
            .collect();
        for row in rows.iter_mut().filter(|row| flagged.contains(&row.date)) {
            row.clear_signal();
        }

        let latest_event = self.latest_event(&rows, &flagged, since);

        let mut recomputed = 0;
        for row in rows.into_iter().filter(|row| row.date >= since) {
            self.repository.upsert_indicator(row).await?;
            recomputed += 1;
        }
        report.rows_recomputed = recomputed;
        debug!(%symbol, %since, rows = recomputed, "Recomputed indicators");

        if let Some(event) = latest_event {
            if report.degraded && self.detector.config().suppress_when_degraded {
                info!(%symbol, date = %event.date, "Signal suppressed in degraded mode");
                report.signal_suppressed = true;
            } else {
                match self.sink.emit(&event).await {
                    Ok(()) => {
                        info!(
                            %symbol,
                            date = %event.date,
                            direction = %event.direction,
                            strength = event.strength,
                            sink = self.sink.name(),
                            "Signal emitted"
                        );
                        report.signal = Some(event);
                    }
                    Err(e) => {
                        warn!(%symbol, sink = self.sink.name(), error = %e, "Signal delivery failed");
                        report.warnings.push(format!("signal delivery failed: {}", e));
                    }
                }
            }
        }

        Ok(())
    }

    /// Event for the newest row, when that row changed in this run and its
    /// bar is verified.
    fn latest_event(
        &self,
        rows: &[IndicatorRow],
        flagged: &BTreeSet<NaiveDate>,
        since: NaiveDate,
    ) -> Option<SignalEvent> {
        let latest = rows.last()?;
        if latest.date < since || flagged.contains(&latest.date) {
            return None;
        }
        self.detector.evaluate_latest(rows)?.to_event(latest)
    }

    /// Record missing weekdays and staleness of the newest bar.
    async fn check_coverage(
        &self,
        symbol: &str,
        range: DateRange,
        report: &mut IngestionReport,
    ) -> Result<(), PipelineError> {
        let bars = self.repository.read_series(symbol, range).await?;
        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            report.warnings.push("no bars stored for the requested range".into());
            return Ok(());
        };

        let end = range.end().min(self.clock.today());
        if let Ok(expected) = DateRange::new(first.date(), end) {
            let actual: Vec<NaiveDate> = bars.iter().map(Bar::date).collect();
            report.missing_dates = detect_missing_dates(&weekdays(expected), &actual);
        }

        let last_update = last.date().and_time(NaiveTime::MIN).and_utc();
        let freshness = self.gate.freshness(last_update, self.clock.now());
        if !freshness.is_fresh {
            report.warnings.push(format!(
                "newest bar {} is {:.0} h old (threshold {:.0} h)",
                last.date(),
                freshness.hours_since_update,
                freshness.threshold_hours
            ));
        }
        report.freshness = Some(freshness);
        Ok(())
    }

    /// Stored indicator rows for `symbol` inside `range`.
    pub async fn indicators(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<Vec<IndicatorRow>, PipelineError> {
        Ok(self.repository.read_indicators(symbol, range).await?)
    }

    /// Signal counts and entries for `symbol` inside `range`.
    pub async fn signal_summary(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<SignalSummary, PipelineError> {
        let rows = self.repository.read_indicators(symbol, range).await?;
        Ok(SignalSummary::from_rows(symbol, &rows))
    }

    /// Statistics over the trailing window of stored bars.
    pub async fn statistics(&self, symbol: &str) -> Result<SeriesStatistics, PipelineError> {
        let bars = self.repository.read_series(symbol, DateRange::all()).await?;
        Ok(SeriesStatistics::from_bars(symbol, &bars, self.clock.now()))
    }

    /// Remove bars and rows older than the retention window.
    pub async fn purge_expired(&self) -> Result<PurgeSummary, PipelineError> {
        if self.retention_days == 0 {
            return Ok(PurgeSummary::default());
        }

        let cutoff = self.clock.today() - Duration::days(i64::from(self.retention_days));
        let summary = self.repository.purge_before(cutoff).await?;
        info!(
            %cutoff,
            bars = summary.bars_removed,
            rows = summary.indicator_rows_removed,
            "Retention purge complete"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{Datelike, TimeZone, Utc, Weekday};
    use quotewatch_core::error::SinkError;
    use quotewatch_core::traits::FixedClock;
    use quotewatch_core::types::{SignalDirection, SignalRule, SourceDescriptor};
    use quotewatch_core::QuoteProvider;
    use quotewatch_data::{BarStore, CsvQuoteProvider};
    use quotewatch_sources::{MonitorSettings, ProbeScript, StaticProvider};
    use tokio::sync::Mutex as AsyncMutex;

    #[derive(Default)]
    struct RecordingSink {
        events: AsyncMutex<Vec<SignalEvent>>,
    }

    #[async_trait]
    impl SignalSink for RecordingSink {
        async fn emit(&self, event: &SignalEvent) -> Result<(), SinkError> {
            self.events.lock().await.push(event.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct Fixture {
        pipeline: IngestionPipeline,
        providers: Vec<StaticProvider>,
        store: Arc<BarStore>,
        sink: Arc<RecordingSink>,
        clock: Arc<FixedClock>,
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    /// Consecutive weekdays starting 2024-01-01.
    fn trading_days(n: usize) -> Vec<NaiveDate> {
        start()
            .iter_days()
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .take(n)
            .collect()
    }

    fn record(date: NaiveDate, close: f64, volume: u64) -> RawRecord {
        RawRecord::new()
            .with("symbol", "600000")
            .with("name", "浦发银行")
            .with("market", "SH")
            .with("date", date.to_string())
            .with("open", close)
            .with("high", close + 0.25)
            .with("low", close - 0.25)
            .with("close", close)
            .with("volume", volume)
    }

    fn series(closes: &[f64]) -> Vec<RawRecord> {
        trading_days(closes.len())
            .into_iter()
            .zip(closes)
            .map(|(date, close)| record(date, *close, 10_000))
            .collect()
    }

    async fn fixture(scores: &[f64], records: Vec<RawRecord>) -> Fixture {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()));
        let providers: Vec<StaticProvider> = scores
            .iter()
            .enumerate()
            .map(|(i, score)| {
                StaticProvider::new(format!("src{}", i + 1))
                    .with_score(*score)
                    .with_records("600000", records.clone())
            })
            .collect();

        let sources = providers
            .iter()
            .enumerate()
            .map(|(i, provider)| {
                let descriptor =
                    SourceDescriptor::new(provider.id(), provider.id(), i as u32 + 1);
                let provider: Arc<dyn QuoteProvider> = Arc::new(provider.clone());
                (descriptor, provider)
            })
            .collect();

        let monitor =
            SourceHealthMonitor::new(sources, MonitorSettings::default(), clock.clone()).unwrap();
        monitor.check_all().await.unwrap();

        let store = Arc::new(BarStore::new());
        let sink = Arc::new(RecordingSink::default());
        let settings = PipelineSettings {
            retention_days: 30,
            ..Default::default()
        };
        let pipeline = IngestionPipeline::new(
            Arc::new(monitor),
            store.clone(),
            sink.clone(),
            clock.clone(),
            settings,
        )
        .unwrap();

        Fixture {
            pipeline,
            providers,
            store,
            sink,
            clock,
        }
    }

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 10.0 + i as f64 * 0.05).collect()
    }

    #[tokio::test]
    async fn test_ingest_stores_bars_and_indicators() {
        let f = fixture(&[95.0], series(&ramp(25))).await;

        let report = f.pipeline.ingest("600000", DateRange::all()).await.unwrap();

        assert_eq!(report.source_id.as_deref(), Some("src1"));
        assert_eq!(report.fetched, 25);
        assert_eq!(report.accepted, 25);
        assert_eq!(report.inserted, 25);
        assert_eq!(report.rows_recomputed, 25);
        assert!(report.finished_at.is_some());

        let rows = f.pipeline.indicators("600000", DateRange::all()).await.unwrap();
        assert_eq!(rows.len(), 25);
        assert!(rows[3].ma5.is_none());
        assert!(rows[4].ma5.is_some());
        assert!(rows[18].ma20.is_none());
        assert!(rows[19].ma20.is_some());
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let f = fixture(&[95.0], series(&ramp(30))).await;

        f.pipeline.ingest("600000", DateRange::all()).await.unwrap();
        let first = f.pipeline.indicators("600000", DateRange::all()).await.unwrap();

        let report = f.pipeline.ingest("600000", DateRange::all()).await.unwrap();
        let second = f.pipeline.indicators("600000", DateRange::all()).await.unwrap();

        assert_eq!(report.unchanged, 30);
        assert_eq!(report.changed(), 0);
        assert_eq!(report.rows_recomputed, 0);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_inconsistent_bar_is_rejected() {
        let days = trading_days(3);
        let bad = RawRecord::new()
            .with("symbol", "600000")
            .with("name", "浦发银行")
            .with("market", "SH")
            .with("date", days[1].to_string())
            .with("open", 10.0)
            .with("high", 8.0)
            .with("low", 5.0)
            .with("close", 9.0)
            .with("volume", 100);
        let records = vec![record(days[0], 10.0, 100), bad, record(days[2], 10.1, 100)];
        let f = fixture(&[95.0], records).await;

        let report = f.pipeline.ingest("600000", DateRange::all()).await.unwrap();

        assert_eq!(report.rejected, 1);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rejections[0].date, Some(days[1]));
        assert!(report.rejections[0].reason.contains("high<open"));
        assert_eq!(f.store.bar_count("600000").await, 2);
    }

    #[tokio::test]
    async fn test_failover_to_next_source() {
        let f = fixture(&[95.0, 82.0], series(&ramp(5))).await;
        f.providers[0].set_fetch_failure(Some(SourceError::Api("503".into())));

        let report = f.pipeline.ingest("600000", DateRange::all()).await.unwrap();

        assert_eq!(report.source_id.as_deref(), Some("src2"));
        assert_eq!(report.failed_sources.len(), 1);
        assert_eq!(report.failed_sources[0].0, "src1");
        assert_eq!(report.inserted, 5);
    }

    #[tokio::test]
    async fn test_all_sources_failing() {
        let f = fixture(&[95.0, 82.0], series(&ramp(5))).await;
        for provider in &f.providers {
            provider.set_fetch_failure(Some(SourceError::Connection("refused".into())));
        }

        let result = f.pipeline.ingest("600000", DateRange::all()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Source(SourceError::AllSourcesFailed { .. }))
        ));
        assert_eq!(f.store.bar_count("600000").await, 0);
    }

    /// Steady decline in quarter steps: RSI6 sits at 0, MACD and KDJ never
    /// cross on the last rows.
    fn decline() -> Vec<f64> {
        (0..40).map(|i| 20.0 - i as f64 * 0.25).collect()
    }

    #[tokio::test]
    async fn test_signal_emitted_for_newest_row() {
        let f = fixture(&[95.0], series(&decline())).await;

        let report = f.pipeline.ingest("600000", DateRange::all()).await.unwrap();
        let rows = f.pipeline.indicators("600000", DateRange::all()).await.unwrap();
        let latest = rows.last().unwrap();
        let events = f.sink.events.lock().await;

        assert_eq!(latest.rsi6, Some(0.0));
        assert_eq!(latest.direction(), SignalDirection::Buy);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].date, latest.date);
        assert_eq!(events[0].direction, SignalDirection::Buy);
        assert_eq!(events[0].strength, 1);
        assert_eq!(events[0].contributing, vec![SignalRule::RsiOversold]);
        assert_eq!(report.signal.as_ref(), Some(&events[0]));
    }

    #[tokio::test]
    async fn test_degraded_mode_suppresses_signals() {
        let f = fixture(&[40.0], series(&decline())).await;

        let report = f.pipeline.ingest("600000", DateRange::all()).await.unwrap();

        assert!(report.degraded);
        assert!(report.signal_suppressed);
        assert!(report.signal.is_none());
        assert!(f.sink.events.lock().await.is_empty());
        assert_eq!(report.source_id.as_deref(), Some("src1"));
    }

    #[tokio::test]
    async fn test_price_jump_flags_bar_and_clears_signal() {
        let mut closes = ramp(20);
        closes.push(14.0);
        let f = fixture(&[95.0], series(&closes)).await;

        let report = f.pipeline.ingest("600000", DateRange::all()).await.unwrap();

        assert_eq!(report.flagged, 1);
        assert!(report.signal.is_none());
        let rows = f.pipeline.indicators("600000", DateRange::all()).await.unwrap();
        assert_eq!(rows.last().unwrap().direction(), SignalDirection::Neutral);

        let bars = f.store.read_series("600000", DateRange::all()).await.unwrap();
        assert!(!bars.last().unwrap().is_verified());
        assert!(bars[0].is_verified());
    }

    #[tokio::test]
    async fn test_correction_recomputes_following_rows() {
        let closes = ramp(30);
        let f = fixture(&[95.0], series(&closes)).await;
        f.pipeline.ingest("600000", DateRange::all()).await.unwrap();
        let before = f.pipeline.indicators("600000", DateRange::all()).await.unwrap();

        let days = trading_days(30);
        let corrected = record(days[24], closes[24] + 0.3, 10_000);
        let report = f
            .pipeline
            .ingest_records("600000", "manual", vec![corrected])
            .await
            .unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.rows_recomputed, 6);

        let after = f.pipeline.indicators("600000", DateRange::all()).await.unwrap();
        assert_eq!(before[..24], after[..24]);
        assert_ne!(before[24].ma5, after[24].ma5);
    }

    #[tokio::test]
    async fn test_missing_dates_and_freshness() {
        let days = trading_days(5);
        let records = vec![
            record(days[0], 10.0, 100),
            record(days[1], 10.0, 100),
            record(days[3], 10.0, 100),
            record(days[4], 10.0, 100),
        ];
        let f = fixture(&[95.0], records).await;
        let range = DateRange::new(days[0], days[4]).unwrap();

        let report = f.pipeline.ingest("600000", range).await.unwrap();

        assert_eq!(report.missing_dates, vec![days[2]]);
        let freshness = report.freshness.unwrap();
        assert!(!freshness.is_fresh);
        assert!(report.warnings.iter().any(|w| w.contains("h old")));
    }

    #[tokio::test]
    async fn test_concurrent_ingest_of_many_symbols() {
        let f = fixture(&[95.0], series(&ramp(10))).await;
        for symbol in ["000001", "000002"] {
            let records = series(&ramp(10))
                .into_iter()
                .map(|r| r.with("symbol", symbol))
                .collect();
            f.providers[0].set_records(symbol, records);
        }

        let symbols = vec!["600000".to_string(), "000001".to_string(), "000002".to_string()];
        let results = f.pipeline.run(&symbols, DateRange::all()).await;

        assert_eq!(results.len(), 3);
        for (symbol, result) in results {
            let report = result.unwrap();
            assert_eq!(report.symbol, symbol);
            assert_eq!(report.inserted, 10);
        }
        assert_eq!(f.store.symbols().await.len(), 3);
    }

    #[tokio::test]
    async fn test_summary_statistics_and_purge() {
        let f = fixture(&[95.0], series(&decline())).await;
        f.pipeline.ingest("600000", DateRange::all()).await.unwrap();

        let summary = f.pipeline.signal_summary("600000", DateRange::all()).await.unwrap();
        assert_eq!(summary.total_signals, summary.buy_signals + summary.sell_signals);
        assert_eq!(summary.latest().map(|e| e.direction), Some(SignalDirection::Buy));

        let stats = f.pipeline.statistics("600000").await.unwrap();
        assert_eq!(stats.data_points, 40);

        // Clock sits at 2024-03-01 with 30 days retention
        let purged = f.pipeline.purge_expired().await.unwrap();
        assert!(purged.bars_removed > 0);
        let remaining = f.store.read_series("600000", DateRange::all()).await.unwrap();
        assert!(remaining
            .iter()
            .all(|bar| bar.date() >= NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));

        f.clock.advance(Duration::days(365));
        f.pipeline.purge_expired().await.unwrap();
        assert_eq!(f.store.bar_count("600000").await, 0);
    }

    #[tokio::test]
    async fn test_rejects_invalid_settings() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let provider: Arc<dyn QuoteProvider> =
            Arc::new(StaticProvider::new("a").with_probe(ProbeScript::Score(90.0)));
        let monitor = SourceHealthMonitor::new(
            vec![(SourceDescriptor::new("a", "A", 1), provider)],
            MonitorSettings::default(),
            clock.clone(),
        )
        .unwrap();

        let mut settings = PipelineSettings::default();
        settings.signals.rsi_oversold = 80.0;

        let result = IngestionPipeline::new(
            Arc::new(monitor),
            Arc::new(BarStore::new()),
            Arc::new(RecordingSink::default()),
            clock,
            settings,
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    fn prices_only(date: NaiveDate, close: f64) -> RawRecord {
        RawRecord::new()
            .with("date", date.to_string())
            .with("open", close)
            .with("high", close + 0.25)
            .with("low", close - 0.25)
            .with("close", close)
            .with("volume", 10_000)
    }

    async fn pipeline_over(
        provider: Arc<dyn QuoteProvider>,
        settings: PipelineSettings,
    ) -> (IngestionPipeline, Arc<BarStore>, Arc<RecordingSink>) {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()));
        let descriptor = SourceDescriptor::new(provider.id(), provider.id(), 1);
        let monitor = SourceHealthMonitor::new(
            vec![(descriptor, provider)],
            MonitorSettings::default(),
            clock.clone(),
        )
        .unwrap();
        monitor.check_all().await.unwrap();

        let store = Arc::new(BarStore::new());
        let sink = Arc::new(RecordingSink::default());
        let pipeline = IngestionPipeline::new(
            Arc::new(monitor),
            store.clone(),
            sink.clone(),
            clock,
            settings,
        )
        .unwrap();
        (pipeline, store, sink)
    }

    #[tokio::test]
    async fn test_exchange_suffixed_symbol_is_same_instrument() {
        let records = series(&ramp(25))
            .into_iter()
            .map(|record| record.with("symbol", "600000.SH"))
            .collect();
        let f = fixture(&[95.0], records).await;

        let report = f.pipeline.ingest("600000", DateRange::all()).await.unwrap();

        assert_eq!(report.rejected, 0);
        assert_eq!(report.accepted, 25);
        assert_eq!(report.flagged, 0);
        assert_eq!(f.store.bar_count("600000").await, 25);
        let bars = f.store.read_series("600000", DateRange::all()).await.unwrap();
        assert!(bars.iter().all(|bar| bar.symbol() == "600000"));
    }

    #[tokio::test]
    async fn test_record_for_other_instrument_is_rejected_alone() {
        let mut records = series(&ramp(25));
        records.push(record(trading_days(26)[25], 11.0, 10_000).with("symbol", "000001"));
        let f = fixture(&[95.0], records).await;

        let report = f.pipeline.ingest("600000", DateRange::all()).await.unwrap();

        assert_eq!(report.fetched, 26);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.accepted, 25);
        assert!(report.rejections[0].reason.contains("000001"));
        assert_eq!(f.store.bar_count("600000").await, 25);
    }

    #[tokio::test]
    async fn test_instrument_table_completes_price_only_records() {
        let records: Vec<RawRecord> = trading_days(40)
            .into_iter()
            .zip(decline())
            .map(|(date, close)| prices_only(date, close))
            .collect();
        let provider: Arc<dyn QuoteProvider> =
            Arc::new(StaticProvider::new("bare").with_score(95.0).with_records("600000", records));

        // Without metadata the market is inferred but the name is missing
        let (pipeline, _, sink) = pipeline_over(provider.clone(), PipelineSettings::default()).await;
        let report = pipeline.ingest("600000", DateRange::all()).await.unwrap();
        assert_eq!(report.flagged, 40);
        assert!(report.warnings[0].contains("missing name"));
        assert!(!report.warnings[0].contains("market"));
        assert!(sink.events.lock().await.is_empty());

        let mut settings = PipelineSettings::default();
        settings
            .instruments
            .insert("600000.SH".into(), InstrumentInfo::new("浦发银行", "SH"));
        let (pipeline, _, sink) = pipeline_over(provider, settings).await;
        let report = pipeline.ingest("600000", DateRange::all()).await.unwrap();

        assert_eq!(report.flagged, 0);
        assert_eq!(sink.events.lock().await.len(), 1);
        assert_eq!(report.signal.as_ref().map(|e| e.direction), Some(SignalDirection::Buy));
    }

    #[tokio::test]
    async fn test_csv_directory_source_emits_signal() {
        let dir = std::env::temp_dir().join(format!("quotewatch-pipeline-csv-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut csv = String::from("date,open,high,low,close,volume\n");
        for (date, close) in trading_days(40).into_iter().zip(decline()) {
            csv.push_str(&format!(
                "{},{},{},{},{},10000\n",
                date,
                close,
                close + 0.25,
                close - 0.25,
                close
            ));
        }
        std::fs::write(dir.join("600000.csv"), csv).unwrap();
        std::fs::write(dir.join("instruments.csv"), "symbol,name,market\n600000,浦发银行,SH\n").unwrap();

        let provider: Arc<dyn QuoteProvider> = Arc::new(CsvQuoteProvider::new("local", &dir));
        let (pipeline, store, sink) = pipeline_over(provider, PipelineSettings::default()).await;
        let report = pipeline.ingest("600000", DateRange::all()).await.unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(report.accepted, 40);
        assert_eq!(report.flagged, 0);
        assert_eq!(store.bar_count("600000").await, 40);

        let events = sink.events.lock().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, SignalDirection::Buy);
        assert_eq!(report.signal.as_ref(), Some(&events[0]));
    }

    #[tokio::test]
    async fn test_instrument_locks_are_released() {
        let f = fixture(&[95.0], series(&ramp(10))).await;

        f.pipeline.ingest("600000", DateRange::all()).await.unwrap();
        f.pipeline
            .ingest_records("600001", "manual", series(&ramp(3)))
            .await
            .ok();

        assert!(f.pipeline.locks.lock().unwrap().is_empty());
    }
}
