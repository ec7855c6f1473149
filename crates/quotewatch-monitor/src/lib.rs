//! Logging and notification sinks.

mod logging;
mod sink;

pub use logging::{env_filter, setup_logging, LogFormat, LoggingConfig};
pub use sink::{ChannelSignalSink, LogSignalSink};
