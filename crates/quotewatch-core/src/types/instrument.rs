//! Instrument display metadata.

use super::RawRecord;
use serde::{Deserialize, Serialize};

/// Name and market of one instrument, for providers that only send prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub name: String,
    /// Exchange code, e.g. `SH` or `SZ`
    pub market: String,
}

impl InstrumentInfo {
    pub fn new(name: impl Into<String>, market: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            market: market.into(),
        }
    }

    /// Fill `name` and `market` on `record` where the provider left them out.
    pub fn fill(&self, record: &mut RawRecord) {
        if !record.is_present("name") && !self.name.trim().is_empty() {
            record.insert("name", self.name.as_str());
        }
        if !record.is_present("market") && !self.market.trim().is_empty() {
            record.insert("market", self.market.as_str());
        }
    }
}
