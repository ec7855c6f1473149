//! Ingestion pipeline.
//!
//! Ties the source monitor, quality gate, bar store, indicator engine and
//! signal detector together for each instrument.

mod engine;
mod report;
mod statistics;

pub use engine::{IngestionPipeline, PipelineSettings};
pub use report::{IngestionReport, Rejection, RunStatus};
pub use statistics::{LatestBar, PriceChange, SeriesStatistics, STATISTICS_WINDOW};
