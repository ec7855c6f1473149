//! Configuration structures.

use quotewatch_core::types::InstrumentInfo;
use quotewatch_core::PipelineError;
use quotewatch_indicators::IndicatorParams;
use quotewatch_monitor::LoggingConfig;
use quotewatch_pipeline::PipelineSettings;
use quotewatch_quality::QualityThresholds;
use quotewatch_signals::SignalConfig;
use quotewatch_sources::{HttpSourceConfig, MonitorSettings, ProviderKind, SourceSettings};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// Probes slower than this are not "short".
const MAX_PROBE_TIMEOUT_MS: u64 = 10_000;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceSettings>,
    #[serde(default)]
    pub health: HealthSettings,
    #[serde(default)]
    pub quality: QualityThresholds,
    #[serde(default)]
    pub indicators: IndicatorParams,
    #[serde(default)]
    pub signals: SignalConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    /// Name and market per symbol, for sources that send prices only
    #[serde(default)]
    pub instruments: BTreeMap<String, InstrumentInfo>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app: AppSettings::default(),
            logging: LoggingConfig::default(),
            sources: default_sources(),
            health: HealthSettings::default(),
            quality: QualityThresholds::default(),
            indicators: IndicatorParams::default(),
            signals: SignalConfig::default(),
            storage: StorageSettings::default(),
            instruments: BTreeMap::new(),
        }
    }
}

/// General app settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    pub name: String,
    pub environment: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: "quotewatch".to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Source health checking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub check_interval_secs: u64,
    pub probe_timeout_ms: u64,
    /// A source must score above this to be primary
    pub primary_threshold: f64,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
            probe_timeout_ms: 5_000,
            primary_threshold: 70.0,
        }
    }
}

impl HealthSettings {
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            check_interval: Duration::from_secs(self.check_interval_secs),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            primary_threshold: self.primary_threshold,
        }
    }
}

/// Retention settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Age in days after which bars are purged; 0 keeps everything
    pub retention_days: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { retention_days: 365 }
    }
}

/// The four upstream quote sources, broker first.
pub fn default_sources() -> Vec<SourceSettings> {
    let http = |base_url: &str| ProviderKind::Http(HttpSourceConfig::new(base_url));
    vec![
        SourceSettings::new("broker", "涨乐财富通", 1, http("https://www.hualala.com/api/v1/stock")),
        SourceSettings::new("sina", "新浪财经", 2, http("http://hq.sinajs.cn")),
        SourceSettings::new("tencent", "腾讯财经", 3, http("http://qt.gtimg.cn")),
        SourceSettings::new("eastmoney", "东方财富", 4, http("http://push2.eastmoney.com")),
    ]
}

impl AppConfig {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sources.is_empty() {
            return Err(PipelineError::Config("at least one source is required".into()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(PipelineError::Config("source id must not be empty".into()));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(PipelineError::Config(format!(
                    "duplicate source id: {}",
                    source.id
                )));
            }
            if let ProviderKind::Http(http) = &source.provider {
                if http.base_url.trim().is_empty() {
                    return Err(PipelineError::Config(format!(
                        "source {} has an empty base_url",
                        source.id
                    )));
                }
            }
        }

        let health = &self.health;
        if health.check_interval_secs == 0 {
            return Err(PipelineError::Config("check_interval_secs must be positive".into()));
        }
        if health.probe_timeout_ms == 0 || health.probe_timeout_ms >= MAX_PROBE_TIMEOUT_MS {
            return Err(PipelineError::Config(format!(
                "probe_timeout_ms must be between 1 and {}",
                MAX_PROBE_TIMEOUT_MS - 1
            )));
        }
        if !(0.0..=100.0).contains(&health.primary_threshold) {
            return Err(PipelineError::Config(
                "primary_threshold must be within 0-100".into(),
            ));
        }

        let quality = &self.quality;
        if quality.freshness_hours <= 0.0
            || quality.price_anomaly_fraction <= 0.0
            || quality.volume_anomaly_multiple <= 0.0
        {
            return Err(PipelineError::Config(
                "quality thresholds must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&quality.min_completeness) {
            return Err(PipelineError::Config(
                "min_completeness must be within 0-1".into(),
            ));
        }

        self.indicators.validate()?;
        self.signals.validate()?;
        Ok(())
    }

    /// Settings handed to the ingestion pipeline.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            quality: self.quality.clone(),
            indicators: self.indicators.clone(),
            signals: self.signals.clone(),
            retention_days: self.storage.retention_days,
            instruments: self.instruments.clone(),
        }
    }
}
