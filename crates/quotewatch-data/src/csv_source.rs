//! CSV-backed quote provider.

use crate::normalize::{instrument_code, parse_trade_date, DATE_FIELDS, SYMBOL_FIELDS};
use async_trait::async_trait;
use csv::ReaderBuilder;
use quotewatch_core::error::{DataError, SourceError};
use quotewatch_core::traits::{ProbeReport, QuoteProvider};
use quotewatch_core::types::{DateRange, InstrumentInfo, RawRecord};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

/// Optional `symbol,name,market` table next to the price files.
pub const INSTRUMENTS_FILE: &str = "instruments.csv";

#[derive(Debug, Deserialize)]
struct InstrumentRow {
    symbol: String,
    name: String,
    #[serde(default)]
    market: String,
}

/// Quote provider reading `{symbol}.csv` files from a directory.
///
/// Columns are passed through as string fields; normalization decides what
/// they mean. Rows whose date cannot be parsed are kept so the pipeline can
/// report them. Name and market come from [`INSTRUMENTS_FILE`] when the
/// price file does not carry them.
#[derive(Debug, Clone)]
pub struct CsvQuoteProvider {
    id: String,
    dir: PathBuf,
}

impl CsvQuoteProvider {
    /// Create a new CSV provider over `dir`.
    pub fn new(id: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.csv"))
    }

    /// Parse CSV text into records, keeping rows inside `range`.
    pub fn parse(
        content: &str,
        symbol: &str,
        range: DateRange,
    ) -> Result<Vec<RawRecord>, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut records = Vec::new();

        for result in reader.deserialize() {
            let row: HashMap<String, String> =
                result.map_err(|e| DataError::ParseError(e.to_string()))?;

            let mut record: RawRecord = row
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();

            if record.get_any(SYMBOL_FIELDS).is_none() {
                record.insert("symbol", symbol);
            }

            let in_range = record
                .get_any(DATE_FIELDS)
                .and_then(|value| parse_trade_date(value).ok())
                .map_or(true, |date| range.contains(date));

            if in_range {
                records.push(record);
            }
        }

        Ok(records)
    }

    /// Parse an instruments table, keyed by bare instrument code.
    pub fn parse_instruments(content: &str) -> Result<HashMap<String, InstrumentInfo>, DataError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut instruments = HashMap::new();
        for result in reader.deserialize() {
            let row: InstrumentRow = result.map_err(|e| DataError::ParseError(e.to_string()))?;
            instruments.insert(
                instrument_code(&row.symbol).to_string(),
                InstrumentInfo::new(row.name, row.market),
            );
        }
        Ok(instruments)
    }

    /// Metadata for `symbol` from the instruments table, if there is one.
    async fn instrument_info(&self, symbol: &str) -> Result<Option<InstrumentInfo>, SourceError> {
        let path = self.dir.join(INSTRUMENTS_FILE);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SourceError::Connection(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut instruments = Self::parse_instruments(&content)?;
        Ok(instruments.remove(instrument_code(symbol)))
    }
}

#[async_trait]
impl QuoteProvider for CsvQuoteProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch_bars(
        &self,
        symbol: &str,
        range: DateRange,
    ) -> Result<Vec<RawRecord>, SourceError> {
        let path = self.file_for(symbol);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataError::SymbolNotFound(symbol.to_string()).into());
            }
            Err(e) => {
                return Err(SourceError::Connection(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut records = Self::parse(&content, symbol, range)?;
        if let Some(info) = self.instrument_info(symbol).await? {
            records.iter_mut().for_each(|record| info.fill(record));
        }
        debug!(source = %self.id, %symbol, count = records.len(), "Loaded CSV records");
        Ok(records)
    }

    async fn probe(&self) -> Result<ProbeReport, SourceError> {
        let start = Instant::now();
        let metadata = tokio::fs::metadata(&self.dir)
            .await
            .map_err(|e| SourceError::Connection(format!("{}: {}", self.dir.display(), e)))?;

        if !metadata.is_dir() {
            return Err(SourceError::Connection(format!(
                "{} is not a directory",
                self.dir.display()
            )));
        }

        Ok(ProbeReport::new(100.0, start.elapsed().as_millis() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const CSV: &str = "\
date,open,high,low,close,volume,name,market
2024-01-15,10.0,10.5,9.8,10.2,1000,平安银行,SZ
2024-01-16,10.2,10.6,10.1,10.4,1100,平安银行,SZ
2024-01-17,10.4,10.9,10.3,10.8,1500,平安银行,SZ
";

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[test]
    fn test_parse_filters_range_and_stamps_symbol() {
        let range = DateRange::new(d(16), d(31)).unwrap();
        let records = CsvQuoteProvider::parse(CSV, "000001", range).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("symbol").as_deref(), Some("000001"));
        assert_eq!(records[0].text("close").as_deref(), Some("10.4"));
        assert_eq!(records[1].text("name").as_deref(), Some("平安银行"));
    }

    #[test]
    fn test_parse_keeps_undated_rows() {
        let csv = "date,open,high,low,close\nnot-a-date,1,1,1,1\n";
        let records = CsvQuoteProvider::parse(csv, "X", DateRange::all()).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_instruments() {
        let table = "symbol,name,market\n600000.SH,浦发银行,SH\n000001,平安银行,\n";
        let instruments = CsvQuoteProvider::parse_instruments(table).unwrap();

        assert_eq!(instruments["600000"], InstrumentInfo::new("浦发银行", "SH"));
        assert_eq!(instruments["000001"].market, "");
    }

    #[tokio::test]
    async fn test_fetch_fills_metadata_from_instruments_file() {
        let dir = std::env::temp_dir().join(format!("quotewatch-csv-meta-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("600000.csv"),
            "date,open,high,low,close,volume\n2024-01-15,10.0,10.5,9.8,10.2,1000\n",
        )
        .unwrap();
        std::fs::write(dir.join(INSTRUMENTS_FILE), "symbol,name,market\n600000,浦发银行,SH\n").unwrap();

        let provider = CsvQuoteProvider::new("csv", &dir);
        let records = provider.fetch_bars("600000", DateRange::all()).await.unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text("name").as_deref(), Some("浦发银行"));
        assert_eq!(records[0].text("market").as_deref(), Some("SH"));
    }

    #[tokio::test]
    async fn test_missing_symbol_file() {
        let provider = CsvQuoteProvider::new("csv", std::env::temp_dir());
        let result = provider
            .fetch_bars("quotewatch-no-such-symbol", DateRange::all())
            .await;

        assert!(matches!(
            result,
            Err(SourceError::Fetch(DataError::SymbolNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_probe_directory() {
        let healthy = CsvQuoteProvider::new("csv", std::env::temp_dir());
        let report = healthy.probe().await.unwrap();
        assert!(report.is_well_formed());

        let missing = CsvQuoteProvider::new("csv", "/nonexistent/quotewatch");
        assert!(missing.probe().await.is_err());
    }
}
