//! Core data types for the quote pipeline.

mod bar;
mod indicator_row;
mod instrument;
mod range;
mod raw;
mod signal;
mod source;

pub use bar::{Bar, BarDraft, BarSeries, ConsistencyViolation, DataQuality, UpsertOutcome};
pub use indicator_row::IndicatorRow;
pub use instrument::InstrumentInfo;
pub use range::DateRange;
pub use raw::RawRecord;
pub use signal::{SignalDirection, SignalEvent, SignalRule};
pub use source::{Availability, SourceDescriptor, SourceStatus};
