//! Inclusive trading-date ranges.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Inclusive date range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DataError> {
        if start > end {
            return Err(DataError::InvalidValue {
                field: "date_range".into(),
                value: format!("{} > {}", start, end),
            });
        }
        Ok(Self { start, end })
    }

    /// Every representable date.
    pub fn all() -> Self {
        Self {
            start: NaiveDate::MIN,
            end: NaiveDate::MAX,
        }
    }

    /// From `start` onwards.
    pub fn from(start: NaiveDate) -> Self {
        Self {
            start,
            end: NaiveDate::MAX,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_bounds() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

        let range = DateRange::new(a, b).unwrap();
        assert!(range.contains(a));
        assert!(range.contains(b));
        assert!(!range.contains(b.succ_opt().unwrap()));

        assert!(DateRange::new(b, a).is_err());
        assert!(DateRange::all().contains(a));
    }
}
