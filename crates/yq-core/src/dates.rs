//! Date normalization for suggest, observe and search payloads.
//!
//! Every date sent to the service uses one format, ISO-8601 in UTC with
//! millisecond precision (`2024-01-02T03:04:05.000Z`). Inputs without an
//! offset are read as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use tracing::debug;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%b %d, %Y"];

/// Parse a loosely formatted date. Returns `None` for anything unrecognized.
#[must_use]
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(input, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[must_use]
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Normalize a date string. Malformed input yields `None` so the caller
/// leaves the field unset.
#[must_use]
pub fn normalize_date(input: &str) -> Option<String> {
    let parsed = parse_date(input);
    if parsed.is_none() {
        debug!("Dropping malformed date {input:?}");
    }
    parsed.as_ref().map(format_date)
}

/// Normalize a date and replace the trailing `Z` with a UTC offset such as `-05:00`.
#[must_use]
pub fn normalize_date_with_offset(input: &str, utc_offset: Option<&str>) -> Option<String> {
    let normalized = normalize_date(input)?;
    Some(match utc_offset.filter(|o| !o.is_empty()) {
        Some(offset) => normalized.replacen('Z', offset, 1),
        None => normalized,
    })
}
