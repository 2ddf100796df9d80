//! Row-to-entity parsing helpers.
//!
//! Timestamps are stored as fixed-width RFC 3339 text with microseconds and a
//! `Z` suffix, so lexical order in SQL equals chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

use erp_core::snapshot::Snapshot;

use crate::error::DatabaseError;

/// Render a timestamp the way every table stores it.
#[must_use]
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a required TEXT column as `DateTime<Utc>`.
///
/// Handles both RFC 3339 (`"2026-02-09T14:30:00+00:00"`) and `SQLite`'s default
/// format (`"2026-02-09 14:30:00"`).
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string cannot be parsed as either format.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| DatabaseError::Query(format!("Failed to parse datetime '{s}': {e}")))
}

/// Parse a TEXT column into a serde-deserializable enum.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if the string does not match any enum variant.
pub fn parse_enum<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, DatabaseError> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| DatabaseError::Query(format!("Failed to parse enum from '{s}': {e}")))
}

/// Read a nullable TEXT column. Returns `None` for both SQL NULL and empty string,
/// so a stored `Some("")` reads back as `None`.
///
/// `row.get::<String>(idx)` on a NULL column returns an error, not `""`.
///
/// # Errors
///
/// Returns `DatabaseError` if the column read fails.
pub fn get_opt_string(row: &libsql::Row, idx: i32) -> Result<Option<String>, DatabaseError> {
    match row.get::<Option<String>>(idx)? {
        Some(s) if s.is_empty() => Ok(None),
        other => Ok(other),
    }
}

/// Read an INTEGER column that must fit in `i32`.
///
/// # Errors
///
/// Returns `DatabaseError::InvalidState` if the value is out of range.
pub fn get_i32(row: &libsql::Row, idx: i32) -> Result<i32, DatabaseError> {
    let raw = row.get::<i64>(idx)?;
    i32::try_from(raw)
        .map_err(|_| DatabaseError::InvalidState(format!("column {idx} value {raw} exceeds i32")))
}

/// Parse an optional snapshot stored as JSON text.
///
/// # Errors
///
/// Returns `DatabaseError::Query` if a non-empty string is not a JSON object.
pub fn parse_optional_snapshot(s: Option<&str>) -> Result<Option<Snapshot>, DatabaseError> {
    match s {
        Some(s) if !s.is_empty() => serde_json::from_str(s)
            .map(Some)
            .map_err(|e| DatabaseError::Query(format!("Invalid snapshot JSON in column: {e}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2025, 1, 9, 8, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap();
        let (a, b) = (format_timestamp(&early), format_timestamp(&late));
        assert_eq!(a, "2025-01-09T08:00:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn parse_datetime_accepts_both_formats() {
        let rfc = parse_datetime("2025-07-01T09:30:00.000000Z").unwrap();
        let sqlite = parse_datetime("2025-07-01 09:30:00").unwrap();
        assert_eq!(rfc, sqlite);
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn snapshot_parsing() {
        assert_eq!(parse_optional_snapshot(None).unwrap(), None);
        assert_eq!(parse_optional_snapshot(Some("")).unwrap(), None);
        let snap = parse_optional_snapshot(Some(r#"{"value":"7"}"#))
            .unwrap()
            .unwrap();
        assert_eq!(snap.get("value"), Some(&serde_json::json!("7")));
        assert!(parse_optional_snapshot(Some("[1,2]")).is_err());
    }
}
