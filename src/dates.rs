// Copyright 2026 Meterport Contributors
// SPDX-License-Identifier: Apache-2.0

//! Report date-range validation.
//!
//! The portal's report dialog takes a start and an end date. Both bounds
//! arrive as raw strings (environment or CLI) and are validated here before
//! any browser work starts. The shape gate (`YYYY-MM-DD`) is purely
//! syntactic; chrono decides whether a shaped string is a real calendar
//! date, so `2024-13-40` reports [`DateRangeError::InvalidDate`], not
//! [`DateRangeError::BadFormat`].

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A validated report range. Invariant: `start < end` strictly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Error)]
pub enum DateRangeError {
    #[error("{name} is not set")]
    MissingValue { name: &'static str },

    #[error("{name} must be in YYYY-MM-DD format, got \"{raw}\"")]
    BadFormat { name: &'static str, raw: String },

    #[error("{name} is not a real calendar date: \"{raw}\"")]
    InvalidDate { name: &'static str, raw: String },

    #[error("start date ({start}) must be strictly before end date ({end})")]
    RangeOrder { start: NaiveDate, end: NaiveDate },
}

/// Parse a single date bound. `name` identifies the source variable in
/// error messages.
pub fn parse_date(name: &'static str, raw: Option<&str>) -> Result<NaiveDate, DateRangeError> {
    let raw = match raw {
        Some(r) if !r.is_empty() => r,
        _ => return Err(DateRangeError::MissingValue { name }),
    };

    let shape = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date shape regex is valid");
    if !shape.is_match(raw) {
        return Err(DateRangeError::BadFormat {
            name,
            raw: raw.to_string(),
        });
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| DateRangeError::InvalidDate {
        name,
        raw: raw.to_string(),
    })
}

/// Parse and order-check both bounds. Equal dates are rejected, not just
/// descending ones.
pub fn parse_date_range(
    raw_start: Option<&str>,
    raw_end: Option<&str>,
) -> Result<DateRange, DateRangeError> {
    let start = parse_date("METERPORT_START_DATE", raw_start)?;
    let end = parse_date("METERPORT_END_DATE", raw_end)?;

    if start >= end {
        return Err(DateRangeError::RangeOrder { start, end });
    }

    Ok(DateRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_range() {
        let range = parse_date_range(Some("2024-01-01"), Some("2024-01-10")).unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    }

    #[test]
    fn test_descending_range_rejected() {
        let err = parse_date_range(Some("2024-01-10"), Some("2024-01-01")).unwrap_err();
        match &err {
            DateRangeError::RangeOrder { .. } => {}
            other => panic!("expected RangeOrder, got {other:?}"),
        }
        // Both dates appear in the message, formatted YYYY-MM-DD.
        let msg = err.to_string();
        assert!(msg.contains("2024-01-10"));
        assert!(msg.contains("2024-01-01"));
    }

    #[test]
    fn test_equal_dates_rejected() {
        let err = parse_date_range(Some("2024-01-01"), Some("2024-01-01")).unwrap_err();
        assert!(matches!(err, DateRangeError::RangeOrder { .. }));
    }

    #[test]
    fn test_missing_start_names_variable() {
        let err = parse_date_range(None, Some("2024-01-01")).unwrap_err();
        match err {
            DateRangeError::MissingValue { name } => assert_eq!(name, "METERPORT_START_DATE"),
            other => panic!("expected MissingValue, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_string_is_missing() {
        let err = parse_date("METERPORT_START_DATE", Some("")).unwrap_err();
        assert!(matches!(err, DateRangeError::MissingValue { .. }));
    }

    #[test]
    fn test_impossible_calendar_date() {
        // Correct shape, impossible date: InvalidDate, consistently.
        let err = parse_date_range(Some("2024-13-40"), Some("2024-01-10")).unwrap_err();
        assert!(matches!(err, DateRangeError::InvalidDate { .. }));
    }

    #[test]
    fn test_wrong_shape() {
        let err = parse_date_range(Some("01-01-2024"), Some("2024-01-10")).unwrap_err();
        assert!(matches!(err, DateRangeError::BadFormat { .. }));
    }

    #[test]
    fn test_shape_rejects_garbage() {
        for raw in ["2024/01/01", "2024-1-1", "yesterday", "2024-01-01T00:00:00"] {
            let err = parse_date("METERPORT_END_DATE", Some(raw)).unwrap_err();
            assert!(matches!(err, DateRangeError::BadFormat { .. }), "raw: {raw}");
        }
    }

    #[test]
    fn test_leap_day() {
        assert!(parse_date("METERPORT_START_DATE", Some("2024-02-29")).is_ok());
        let err = parse_date("METERPORT_START_DATE", Some("2023-02-29")).unwrap_err();
        assert!(matches!(err, DateRangeError::InvalidDate { .. }));
    }
}
