//! Date and time string normalization.
//!
//! The matcher and the date conversion functions compare dates as strings,
//! which is valid because normalized ISO-8601 sorts lexicographically. The
//! normalization rules are deliberately forgiving: anything that cannot be
//! normalized is returned unchanged rather than failing.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static DATE_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}(-\d{2}(-\d{2})?)?$").expect("valid regex"));

static TIME_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^T?\d{2}(:\d{2}(:\d{2}(\.\d{1,3})?)?)?$").expect("valid regex"));

/// True for full or partial date strings (`2021`, `2021-01`, `2021-01-01`).
pub fn is_date_string(input: &str) -> bool {
    DATE_ONLY.is_match(input)
}

/// True for time-of-day strings, with or without the `T` prefix.
pub fn is_time_string(input: &str) -> bool {
    TIME_ONLY.is_match(input)
}

/// True for anything that can participate in date comparison: a date, or a
/// date followed by a `T` time section.
pub fn is_date_time_string(input: &str) -> bool {
    match input.split_once('T') {
        None => is_date_string(input),
        Some((date, _)) => DATE_ONLY.is_match(date),
    }
}

/// Canonical form used for comparisons:
/// - a bare time (`T10:00`) is right-padded to full precision
///   (`T10:00:00.000`);
/// - a date-only string passes through unchanged;
/// - anything else is normalized to UTC ISO with millisecond precision, and
///   falls back to the original string if it does not parse.
pub fn normalize_date_time(input: &str) -> String {
    if let Some(rest) = input.strip_prefix('T') {
        return format!("T{}", pad_time(rest));
    }
    if DATE_ONLY.is_match(input) {
        return input.to_string();
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
    }
    // No timezone designator: treat as UTC.
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return naive
                .and_utc()
                .to_rfc3339_opts(SecondsFormat::Millis, true);
        }
    }
    input.to_string()
}

/// Pads `HH[:MM[:SS[.mmm]]]` out to `HH:MM:SS.mmm`.
fn pad_time(time: &str) -> String {
    let (main, millis) = match time.split_once('.') {
        Some((main, millis)) => (main, millis),
        None => (time, ""),
    };
    let mut parts: Vec<String> = main.split(':').map(str::to_string).collect();
    while parts.len() < 3 {
        parts.push("00".to_string());
    }
    let mut millis = millis.to_string();
    while millis.len() < 3 {
        millis.push('0');
    }
    format!("{}.{}", parts.join(":"), millis)
}
