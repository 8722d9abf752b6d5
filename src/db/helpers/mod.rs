use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{types::Type, Row};

use crate::db::models::{Activity, PredictionSource};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

/// Fixed-width RFC 3339 so stored timestamps order lexicographically.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_activity(value: &str) -> Result<Activity> {
    Activity::ALL
        .into_iter()
        .find(|activity| activity.as_str() == value)
        .ok_or_else(|| anyhow!("unknown activity {value}"))
}

pub fn parse_source(value: &str) -> Result<PredictionSource> {
    match value {
        "Primary" => Ok(PredictionSource::Primary),
        "Backup" => Ok(PredictionSource::Backup),
        other => Err(anyhow!("unknown prediction source {other}")),
    }
}

/// Wraps a row-decoding failure for column `idx` so it can be returned from
/// a `query_map` closure.
pub fn conversion_error(idx: usize, ty: Type, err: impl std::fmt::Display) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        ty,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            err.to_string(),
        )),
    )
}

/// Reads a TEXT column by name and parses it with `parse`.
pub fn decode_text<T, F>(row: &Row, column: &str, parse: F) -> rusqlite::Result<T>
where
    F: FnOnce(&str) -> Result<T>,
{
    let idx = row.as_ref().column_index(column)?;
    let raw: String = row.get(idx)?;
    parse(&raw).map_err(|err| conversion_error(idx, Type::Text, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formatted_timestamps_sort_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap();
        let later = earlier + chrono::Duration::milliseconds(1);
        assert!(format_timestamp(earlier) < format_timestamp(later));
        assert_eq!(format_timestamp(earlier).len(), format_timestamp(later).len());
    }

    #[test]
    fn timestamp_round_trips() {
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let parsed = parse_datetime(&format_timestamp(now), "timestamp").unwrap();
        assert_eq!(parsed, now);
    }

    #[test]
    fn parses_stored_enums() {
        assert_eq!(parse_activity("Calibrating").unwrap(), Activity::Calibrating);
        assert!(parse_activity("walking").is_err());
        assert_eq!(parse_source("Backup").unwrap(), PredictionSource::Backup);
        assert!(parse_source("device").is_err());
        assert!(to_u64(-1, "count").is_err());
        assert_eq!(to_i64(7).unwrap(), 7);
    }

    #[test]
    fn bad_stored_text_is_a_read_side_conversion_error() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err = conn
            .query_row("SELECT 'x' AS label, 'walking' AS activity", [], |row| {
                decode_text(row, "activity", parse_activity)
            })
            .unwrap_err();

        match err {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, cause) => {
                assert_eq!(idx, 1);
                assert!(cause.to_string().contains("walking"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
