//! Error types for the quote pipeline.

use chrono::NaiveDate;
use thiserror::Error;

/// Top-level pipeline error.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Bar {symbol} {date} rejected: {}", violations.join(", "))]
    Rejected {
        symbol: String,
        date: NaiveDate,
        violations: Vec<String>,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while turning provider records into bars.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("No data available for the requested range")]
    NoDataAvailable,

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Invalid bar: {0}")]
    InvalidBar(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Upstream source and probe errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("No sources configured")]
    NoSourcesConfigured,

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Duplicate source id: {0}")]
    DuplicateSource(String),

    #[error("Probe of {source_id} timed out after {timeout_ms} ms")]
    Timeout { source_id: String, timeout_ms: u64 },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] DataError),

    #[error("Every probe in the check cycle failed unexpectedly")]
    AllProbesFailed,

    #[error("Every source failed to deliver bars for {symbol}")]
    AllSourcesFailed { symbol: String },
}

/// Persistence collaborator errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Bar not found: {symbol} {date}")]
    BarNotFound { symbol: String, date: NaiveDate },
}

/// Indicator configuration errors.
///
/// Insufficient history is never an error; it is represented as `None`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Notification sink errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Sink closed")]
    Closed,

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
