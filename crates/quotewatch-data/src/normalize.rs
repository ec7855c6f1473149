//! Provider record normalization.
//!
//! Providers disagree on field names and on whether numbers arrive as JSON
//! numbers or strings. Everything is funnelled into a [`BarDraft`] here;
//! validation happens later, in the quality gate.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use num_traits::ToPrimitive;
use quotewatch_core::error::DataError;
use quotewatch_core::types::{BarDraft, RawRecord};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

pub const SYMBOL_FIELDS: &[&str] = &["symbol", "code", "stock_code", "ts_code"];
pub const DATE_FIELDS: &[&str] = &["date", "trade_date", "Date", "day", "timestamp"];
const OPEN_FIELDS: &[&str] = &["open", "open_price", "Open"];
const HIGH_FIELDS: &[&str] = &["high", "high_price", "High"];
const LOW_FIELDS: &[&str] = &["low", "low_price", "Low"];
const CLOSE_FIELDS: &[&str] = &["close", "close_price", "Close", "price"];
const VOLUME_FIELDS: &[&str] = &["volume", "vol", "Volume"];
const AMOUNT_FIELDS: &[&str] = &["amount", "Amount", "turnover"];
const PRE_CLOSE_FIELDS: &[&str] = &["pre_close", "preclose", "prev_close", "yesterday_close"];
const CHANGE_FIELDS: &[&str] = &["change", "change_amount"];
const CHANGE_PERCENT_FIELDS: &[&str] = &["change_percent", "pct_chg", "change_pct"];
const TURNOVER_RATE_FIELDS: &[&str] = &["turnover_rate", "turnover_ratio"];
const AMPLITUDE_FIELDS: &[&str] = &["amplitude"];

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;
const EXCHANGE_PREFIXES: &[&str] = &["sh", "sz", "bj"];

/// Turn a provider record into an unvalidated bar.
///
/// `symbol` is used when the record does not name its instrument.
pub fn normalize_record(record: &RawRecord, symbol: &str) -> Result<BarDraft, DataError> {
    let symbol = record
        .get_any(SYMBOL_FIELDS)
        .and_then(value_text)
        .unwrap_or_else(|| symbol.to_string());

    let date = record
        .get_any(DATE_FIELDS)
        .ok_or_else(|| DataError::MissingField("date".into()))
        .and_then(parse_trade_date)?;

    let open = required_decimal(record, "open", OPEN_FIELDS)?;
    let high = required_decimal(record, "high", HIGH_FIELDS)?;
    let low = required_decimal(record, "low", LOW_FIELDS)?;
    let close = required_decimal(record, "close", CLOSE_FIELDS)?;

    let volume = match optional_decimal(record, "volume", VOLUME_FIELDS)? {
        Some(v) => v.trunc().to_i64().ok_or_else(|| DataError::InvalidValue {
            field: "volume".into(),
            value: v.to_string(),
        })?,
        None => 0,
    };

    let mut draft = BarDraft::new(symbol, date, open, high, low, close, volume);
    draft.amount = optional_decimal(record, "amount", AMOUNT_FIELDS)?.unwrap_or_default();
    draft.pre_close = optional_decimal(record, "pre_close", PRE_CLOSE_FIELDS)?;
    draft.change = optional_decimal(record, "change", CHANGE_FIELDS)?;
    draft.change_percent = optional_decimal(record, "change_percent", CHANGE_PERCENT_FIELDS)?;
    draft.turnover_rate = optional_decimal(record, "turnover_rate", TURNOVER_RATE_FIELDS)?;
    draft.amplitude = optional_decimal(record, "amplitude", AMPLITUDE_FIELDS)?;

    derive_changes(&mut draft);
    Ok(draft)
}

/// Fill change, change percent and amplitude from the previous close.
fn derive_changes(draft: &mut BarDraft) {
    let Some(pre_close) = draft.pre_close.filter(|p| *p > Decimal::ZERO) else {
        return;
    };

    let change = *draft.change.get_or_insert(draft.close - pre_close);
    if draft.change_percent.is_none() {
        draft.change_percent = Some((change / pre_close * HUNDRED).round_dp(4));
    }
    if draft.amplitude.is_none() {
        draft.amplitude = Some(((draft.high - draft.low) / pre_close * HUNDRED).round_dp(4));
    }
}

fn required_decimal(record: &RawRecord, field: &str, aliases: &[&str]) -> Result<Decimal, DataError> {
    optional_decimal(record, field, aliases)?.ok_or_else(|| DataError::MissingField(field.into()))
}

fn optional_decimal(
    record: &RawRecord,
    field: &str,
    aliases: &[&str],
) -> Result<Option<Decimal>, DataError> {
    match record.get_any(aliases) {
        None => Ok(None),
        Some(value) => parse_decimal(field, value),
    }
}

/// Parse a JSON number or numeric string. Blank strings count as absent.
pub fn parse_decimal(field: &str, value: &Value) -> Result<Option<Decimal>, DataError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            let trimmed = s.trim().replace(',', "");
            if trimmed.is_empty() || trimmed == "-" {
                return Ok(None);
            }
            trimmed
        }
        Value::Null => return Ok(None),
        other => {
            return Err(DataError::InvalidValue {
                field: field.into(),
                value: other.to_string(),
            })
        }
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map(Some)
        .map_err(|_| DataError::InvalidValue {
            field: field.into(),
            value: text,
        })
}

/// Parse a trading date from the formats providers are known to send.
///
/// Numeric values are Unix timestamps, in milliseconds when above 10^10.
pub fn parse_trade_date(value: &Value) -> Result<NaiveDate, DataError> {
    let invalid = |raw: String| DataError::InvalidValue {
        field: "date".into(),
        value: raw,
    };

    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(invalid(other.to_string())),
    };

    let formats = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%m/%d/%Y"];
    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            return Ok(date);
        }
    }

    let datetime_formats = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    for format in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, format) {
            return Ok(dt.date());
        }
    }

    if let Ok(ts) = text.parse::<i64>() {
        // 8-digit values were handled as %Y%m%d above
        let millis = if ts > 10_000_000_000 { ts } else { ts * 1000 };
        if let Some(dt) = DateTime::from_timestamp_millis(millis) {
            return Ok(dt.date_naive());
        }
    }

    Err(invalid(text))
}

/// Bare instrument code: `600000.SH` and `sh600000` both become `600000`.
pub fn instrument_code(symbol: &str) -> &str {
    let symbol = symbol.trim();
    let code = symbol.split_once('.').map_or(symbol, |(code, _)| code);

    match (code.get(..2), code.get(2..)) {
        (Some(prefix), Some(rest))
            if EXCHANGE_PREFIXES.iter().any(|p| p.eq_ignore_ascii_case(prefix))
                && !rest.is_empty()
                && rest.bytes().all(|b| b.is_ascii_digit()) =>
        {
            rest
        }
        _ => code,
    }
}

/// Whether two symbols name the same instrument, ignoring exchange decoration.
pub fn same_instrument(a: &str, b: &str) -> bool {
    instrument_code(a).eq_ignore_ascii_case(instrument_code(b))
}

/// Market code from an exchange suffix or prefix, else from the A-share code
/// range.
pub fn infer_market(symbol: &str) -> Option<String> {
    let symbol = symbol.trim();
    if let Some((_, suffix)) = symbol.split_once('.') {
        if !suffix.is_empty() {
            return Some(suffix.to_ascii_uppercase());
        }
    }

    let code = instrument_code(symbol);
    if code.len() + 2 == symbol.len() {
        return Some(symbol[..2].to_ascii_uppercase());
    }

    if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let market = match code.as_bytes()[0] {
        b'6' | b'9' => "SH",
        b'0' | b'2' | b'3' => "SZ",
        b'4' | b'8' => "BJ",
        _ => return None,
    };
    Some(market.to_string())
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn record() -> RawRecord {
        RawRecord::new()
            .with("trade_date", "20240603")
            .with("open_price", "10.10")
            .with("high", 10.5)
            .with("low", json!("9.90"))
            .with("Close", 10.3)
            .with("vol", "1,234,500")
            .with("pre_close", "10.00")
    }

    #[test]
    fn test_aliases_and_string_numbers() {
        let draft = normalize_record(&record(), "600000").unwrap();

        assert_eq!(draft.symbol, "600000");
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(draft.open, dec!(10.10));
        assert_eq!(draft.high, dec!(10.5));
        assert_eq!(draft.low, dec!(9.90));
        assert_eq!(draft.close, dec!(10.3));
        assert_eq!(draft.volume, 1_234_500);
    }

    #[test]
    fn test_derived_changes() {
        let draft = normalize_record(&record(), "600000").unwrap();

        assert_eq!(draft.change, Some(dec!(0.3)));
        assert_eq!(draft.change_percent, Some(dec!(3)));
        assert_eq!(draft.amplitude, Some(dec!(6)));
    }

    #[test]
    fn test_provider_values_win_over_derived() {
        let record = record().with("pct_chg", "2.99");
        let draft = normalize_record(&record, "600000").unwrap();
        assert_eq!(draft.change_percent, Some(dec!(2.99)));
    }

    #[test]
    fn test_record_symbol_wins() {
        let record = record().with("code", "000001");
        assert_eq!(normalize_record(&record, "600000").unwrap().symbol, "000001");
    }

    #[test]
    fn test_missing_close() {
        let record = RawRecord::new()
            .with("date", "2024-06-03")
            .with("open", 1)
            .with("high", 1)
            .with("low", 1);

        let err = normalize_record(&record, "X").unwrap_err();
        assert_eq!(err, DataError::MissingField("close".into()));
    }

    #[test]
    fn test_garbage_number() {
        let record = record().with("high", "n/a");
        assert!(matches!(
            normalize_record(&record, "X"),
            Err(DataError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_negative_volume_survives_normalization() {
        let record = record().with("vol", -10);
        assert_eq!(normalize_record(&record, "X").unwrap().volume, -10);
    }

    #[test]
    fn test_parse_trade_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();

        assert_eq!(parse_trade_date(&json!("2024-01-15")).unwrap(), expected);
        assert_eq!(parse_trade_date(&json!("2024/01/15")).unwrap(), expected);
        assert_eq!(parse_trade_date(&json!("2024-01-15 10:30:00")).unwrap(), expected);
        assert_eq!(parse_trade_date(&json!(1705312800000i64)).unwrap(), expected); // Unix ms
        assert_eq!(parse_trade_date(&json!(1705312800)).unwrap(), expected); // Unix sec
        assert!(parse_trade_date(&json!("yesterday")).is_err());
    }

    #[test]
    fn test_instrument_code_strips_exchange() {
        assert_eq!(instrument_code("600000.SH"), "600000");
        assert_eq!(instrument_code("sz000001"), "000001");
        assert_eq!(instrument_code(" 600000 "), "600000");
        assert_eq!(instrument_code("SHOP"), "SHOP");

        assert!(same_instrument("600000.SH", "600000"));
        assert!(same_instrument("sh600000", "600000.sh"));
        assert!(!same_instrument("000001", "600000"));
    }

    #[test]
    fn test_infer_market() {
        assert_eq!(infer_market("600000").as_deref(), Some("SH"));
        assert_eq!(infer_market("000001").as_deref(), Some("SZ"));
        assert_eq!(infer_market("300750").as_deref(), Some("SZ"));
        assert_eq!(infer_market("830799").as_deref(), Some("BJ"));
        assert_eq!(infer_market("000001.sz").as_deref(), Some("SZ"));
        assert_eq!(infer_market("sh600036").as_deref(), Some("SH"));
        assert_eq!(infer_market("AAPL"), None);
        assert_eq!(infer_market("SHOP"), None);
    }
}
