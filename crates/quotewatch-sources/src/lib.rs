//! Upstream quote sources and their health monitor.
//!
//! Providers implement [`quotewatch_core::QuoteProvider`]; the
//! [`SourceHealthMonitor`] probes them and decides which one to fetch from.

mod fixture;
mod http;
mod monitor;
mod registry;

pub use fixture::{ProbeScript, StaticProvider};
pub use http::{HttpQuoteProvider, HttpSourceConfig};
pub use monitor::{HealthReport, MonitorSettings, PrimarySource, SourceHealthMonitor};
pub use registry::{build_monitor, ProviderKind, SourceSettings};
