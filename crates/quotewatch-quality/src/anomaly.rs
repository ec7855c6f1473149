//! Series-level anomaly detection.

use chrono::{Datelike, NaiveDate, Weekday};
use num_traits::ToPrimitive;
use quotewatch_core::types::DateRange;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of trailing points averaged for the volume baseline.
pub const VOLUME_BASELINE_WINDOW: usize = 10;

/// Number of trailing points checked against the volume baseline.
pub const VOLUME_CHECK_WINDOW: usize = 5;

/// A close-to-close jump larger than the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAnomaly {
    pub index: usize,
    pub previous: Decimal,
    pub price: Decimal,
    /// `|price - previous| / previous`
    pub change: f64,
}

/// A volume spike above a multiple of the recent mean.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeAnomaly {
    pub index: usize,
    pub volume: u64,
    pub baseline: f64,
    pub ratio: f64,
}

/// Flag every index whose relative move from the previous price exceeds
/// `threshold`. Pairs with a zero previous price are skipped.
pub fn detect_price_anomalies(prices: &[Decimal], threshold: f64) -> Vec<PriceAnomaly> {
    if prices.len() < 2 {
        return Vec::new();
    }

    prices
        .windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            let (previous, price) = (pair[0], pair[1]);
            if previous.is_zero() {
                return None;
            }
            let change = ((price - previous) / previous).abs().to_f64()?;
            (change > threshold).then_some(PriceAnomaly {
                index: i + 1,
                previous,
                price,
                change,
            })
        })
        .collect()
}

/// Flag any of the last 5 volumes above `multiple` times the mean of the
/// last 10. Needs at least 10 points.
pub fn detect_volume_anomalies(volumes: &[u64], multiple: f64) -> Vec<VolumeAnomaly> {
    if volumes.len() < VOLUME_BASELINE_WINDOW {
        return Vec::new();
    }

    let tail = &volumes[volumes.len() - VOLUME_BASELINE_WINDOW..];
    let baseline = tail.iter().map(|v| *v as f64).sum::<f64>() / VOLUME_BASELINE_WINDOW as f64;
    if baseline <= 0.0 {
        return Vec::new();
    }

    let offset = volumes.len() - VOLUME_CHECK_WINDOW;
    volumes[offset..]
        .iter()
        .enumerate()
        .filter(|(_, volume)| **volume as f64 > baseline * multiple)
        .map(|(i, volume)| VolumeAnomaly {
            index: offset + i,
            volume: *volume,
            baseline,
            ratio: *volume as f64 / baseline,
        })
        .collect()
}

/// Expected dates that have no bar, in the order given.
pub fn detect_missing_dates(expected: &[NaiveDate], actual: &[NaiveDate]) -> Vec<NaiveDate> {
    let actual: BTreeSet<&NaiveDate> = actual.iter().collect();
    expected
        .iter()
        .filter(|date| !actual.contains(date))
        .copied()
        .collect()
}

/// Monday-to-Friday dates inside `range`. Exchange holidays are not known
/// here and are reported as missing.
pub fn weekdays(range: DateRange) -> Vec<NaiveDate> {
    range
        .start()
        .iter_days()
        .take_while(|date| *date <= range.end())
        .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
        .collect()
}
