//! Core records and traits for the quote pipeline.
//!
//! This crate provides the foundational building blocks including:
//! - Validated daily bars and the raw provider records they come from
//! - Indicator rows, source status and signal events
//! - Collaborator traits for quote providers, persistence, notification sinks and clocks

pub mod types;
pub mod traits;
pub mod error;

pub use error::{PipelineError, PipelineResult};
pub use types::*;
pub use traits::*;
