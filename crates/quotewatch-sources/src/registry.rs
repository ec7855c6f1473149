//! Configured sources and the providers built from them.

use crate::http::{HttpQuoteProvider, HttpSourceConfig};
use crate::monitor::{MonitorSettings, SourceHealthMonitor};
use quotewatch_core::error::SourceError;
use quotewatch_core::traits::{Clock, QuoteProvider};
use quotewatch_core::types::SourceDescriptor;
use quotewatch_data::CsvQuoteProvider;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// How a source is reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderKind {
    /// JSON over HTTP
    Http(HttpSourceConfig),
    /// One `<SYMBOL>.csv` file per instrument in `dir`
    Csv { dir: PathBuf },
}

/// One configured upstream source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSettings {
    pub id: String,
    pub name: String,
    /// Lower is preferred on ties and in degraded mode
    pub priority: u32,
    pub provider: ProviderKind,
}

impl SourceSettings {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        priority: u32,
        provider: ProviderKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority,
            provider,
        }
    }

    pub fn descriptor(&self) -> SourceDescriptor {
        SourceDescriptor::new(&self.id, &self.name, self.priority)
    }

    /// Build the provider for this source.
    ///
    /// `timeout` bounds every HTTP request the provider makes.
    pub fn build(&self, timeout: Duration) -> Result<Arc<dyn QuoteProvider>, SourceError> {
        let provider: Arc<dyn QuoteProvider> = match &self.provider {
            ProviderKind::Http(config) => Arc::new(HttpQuoteProvider::new(
                self.id.clone(),
                config.clone(),
                timeout,
            )?),
            ProviderKind::Csv { dir } => Arc::new(CsvQuoteProvider::new(self.id.clone(), dir.clone())),
        };
        Ok(provider)
    }
}

/// Build providers for every configured source and wrap them in a monitor.
pub fn build_monitor(
    sources: &[SourceSettings],
    settings: MonitorSettings,
    clock: Arc<dyn Clock>,
) -> Result<SourceHealthMonitor, SourceError> {
    let entries = sources
        .iter()
        .map(|source| Ok((source.descriptor(), source.build(settings.probe_timeout)?)))
        .collect::<Result<Vec<_>, SourceError>>()?;

    SourceHealthMonitor::new(entries, settings, clock)
}
