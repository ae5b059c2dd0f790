//! Lenient parsing of the portal's date strings.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

/// Parses `YYYY-MM-DD`, `DD/MM/YYYY`, `DD-MM-YYYY` or an RFC 3339
/// timestamp. Any time component of a plain date is ignored.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.date_naive());
    }
    let date_part = raw.split_whitespace().next()?;
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Parses `HH:MM` or `HH:MM:SS`.
#[must_use]
pub fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// Combines an opening date and optional time into a UTC instant. A missing
/// or unparseable time means midnight.
#[must_use]
pub fn opening_instant(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = parse_date(date)?;
    let time = time.and_then(parse_time).unwrap_or(NaiveTime::MIN);
    Some(NaiveDateTime::new(date, time).and_utc())
}
