//! Timestamp parsing shared by history sorting and analytics.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 (`2024-09-20T12:00:00+00:00`), RFC 2822
/// (`Fri, 20 Sep 2024 12:00:00 GMT`) and the offset-less form Postgres
/// emits for `timestamp` columns, which is read as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Calendar day (UTC) of a backend timestamp.
pub fn day_of(text: &str) -> Option<NaiveDate> {
    parse_timestamp(text).map(|dt| dt.date_naive())
}
