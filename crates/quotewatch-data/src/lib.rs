//! Bar storage and provider record handling.

mod csv_source;
pub mod normalize;
mod store;

pub use csv_source::CsvQuoteProvider;
pub use normalize::{
    infer_market, instrument_code, normalize_record, parse_decimal, parse_trade_date,
    same_instrument,
};
pub use store::BarStore;

use quotewatch_core::error::DataError;
use quotewatch_core::types::{Bar, DateRange};

/// Load validated bars for one symbol from a CSV file.
///
/// Rows that fail normalization or validation are returned as errors rather
/// than skipped.
pub async fn load_csv(path: &str, symbol: &str) -> Result<Vec<Bar>, DataError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DataError::ParseError(format!("{path}: {e}")))?;

    let mut bars = CsvQuoteProvider::parse(&content, symbol, DateRange::all())?
        .iter()
        .map(|record| normalize_record(record, symbol).and_then(Bar::try_from))
        .collect::<Result<Vec<_>, _>>()?;

    bars.sort_by_key(Bar::date);
    Ok(bars)
}
