//! Timestamp encoding for stored rows
//!
//! Rows are written as naive UTC `YYYY-MM-DD HH:MM:SS`. Older writers used
//! RFC3339 (with and without fractional seconds), so reads go through an
//! ordered chain of parsers. Strings without a zone are taken as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;

const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive layouts tried after the storage format and RFC3339
const NAIVE_FALLBACKS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Zoned layouts that are not strict RFC3339
const ZONED_FALLBACKS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"];

/// Format a timestamp the way it is stored
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(STORAGE_FORMAT).to_string()
}

/// Parse a stored timestamp, trying each known layout in turn
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, STORAGE_FORMAT) {
        return Some(naive.and_utc());
    }

    // Covers both plain RFC3339 and the nanosecond variant
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    for layout in NAIVE_FALLBACKS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc());
        }
    }

    for layout in ZONED_FALLBACKS {
        if let Ok(ts) = DateTime::parse_from_str(raw, layout) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    None
}

/// Read a timestamp column, reporting unparseable text as a conversion error
pub(crate) fn column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(super::StoreError::Timestamp(raw)),
        )
    })
}

/// Read a nullable timestamp column
pub(crate) fn optional_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                Box::new(super::StoreError::Timestamp(raw)),
            )
        }),
    }
}
