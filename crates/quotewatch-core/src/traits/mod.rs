//! Collaborator traits for the quote pipeline.

mod clock;
mod indicator;
mod provider;
mod repository;
mod sink;

pub use clock::{Clock, FixedClock, SystemClock};
pub use indicator::{Indicator, OhlcIndicator};
pub use provider::{ProbeReport, QuoteProvider};
pub use repository::{BarRepository, PurgeSummary};
pub use sink::SignalSink;
