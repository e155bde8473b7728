//! Timestamp parsing and formatting.
//!
//! Trim points and show times arrive as bare clock times (`00:03:12.5`) or as
//! full date-times (`2024-05-01T18:00:00Z`). Clock-only values are anchored
//! to a fixed date so differences between them are well defined.

use crate::error::TimeParseError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

const CLOCK_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%H:%M:%S%.f"];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

fn anchor_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Parse a timestamp in any of the recognised formats.
pub fn parse_time(s: &str) -> Result<NaiveDateTime, TimeParseError> {
    let s = s.trim();
    for fmt in CLOCK_FORMATS {
        if let Ok(t) = NaiveTime::parse_from_str(s, fmt) {
            return Ok(anchor_date().and_time(t));
        }
    }
    for fmt in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }
    Err(TimeParseError(s.to_string()))
}

/// Absolute time between two timestamps.
pub fn parse_delta(a: &str, b: &str) -> Result<TimeDelta, TimeParseError> {
    Ok((parse_time(a)? - parse_time(b)?).abs())
}

/// Hours elapsed between `timestamp` and `now`. Negative if the timestamp
/// lies in the future.
pub fn hours_since(timestamp: &str, now: NaiveDateTime) -> Result<f64, TimeParseError> {
    let then = parse_time(timestamp)?;
    Ok((now - then).num_milliseconds() as f64 / 3_600_000.0)
}

/// Drop the sub-millisecond remainder.
pub fn truncate_to_millis(d: TimeDelta) -> TimeDelta {
    TimeDelta::milliseconds(d.num_milliseconds())
}

/// Format as `HH:MM:SS.ffffff`, the same shape trim points use.
pub fn format_delta(d: TimeDelta) -> String {
    let sign = if d < TimeDelta::zero() { "-" } else { "" };
    let d = d.abs();
    let total_secs = d.num_seconds();
    let micros = (d - TimeDelta::seconds(total_secs)).num_microseconds().unwrap_or(0);
    format!(
        "{}{:02}:{:02}:{:02}.{:06}",
        sign,
        total_secs / 3600,
        (total_secs / 60) % 60,
        total_secs % 60,
        micros
    )
}
