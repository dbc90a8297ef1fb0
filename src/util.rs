//! Helpers for parsing survey cells and formatting console numbers.
//!
//! The "dirty" date and number handling lives here so the subset and join
//! steps can assume clean, typed values.
use chrono::{NaiveDate, NaiveDateTime};
use num_format::{Locale, ToFormattedString};

/// Timestamp layouts seen in survey exports, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

/// Parse a survey date/time cell.
///
/// - Trims whitespace; empty input is `None`.
/// - Date-only values are taken at midnight.
/// - Returns `None` for anything that matches no known layout.
pub fn parse_datetime_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ts);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Largest repeat count accepted from a cell. Anything above is treated as a
/// data-entry error (a pasted barcode, say) rather than a row count.
pub const MAX_COUNT: u64 = 10_000;

/// Parse a repeat count in `0..=MAX_COUNT`. Whole-number floats such as
/// `3.0` are accepted because spreadsheet exports often write integers that
/// way.
pub fn parse_count(s: Option<&str>) -> Option<u64> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let n = match s.parse::<u64>() {
        Ok(n) => n,
        Err(_) => {
            let f = s.parse::<f64>().ok()?;
            if !(f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= MAX_COUNT as f64) {
                return None;
            }
            f as u64
        }
    };
    (n <= MAX_COUNT).then_some(n)
}

/// System type code from a site id such as `ePR_L01` (`L`, a lake).
///
/// The code is the character at index 4; a site id of `other` (any case)
/// maps to `other`. Ids too short to hold a code yield `None`.
pub fn system_type(site_id: &str) -> Option<String> {
    if site_id.eq_ignore_ascii_case("other") {
        return Some("other".to_string());
    }
    site_id.chars().nth(4).map(|c| c.to_string())
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    // Thin wrapper around `num-format` for row counts in console messages
    // (e.g., `1,204 rows written`).
    n.to_formatted_string(&Locale::en)
}
