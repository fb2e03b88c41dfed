//! Row mapping between SQLite and the engine's record types.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Result as SqliteResult, Row};

use rememberizer_engine::{Attempt, Domain, Fact, FactState};

/// Fixed-width UTC timestamp; lexical order equals time order.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

fn datetime_column(row: &Row, idx: &str) -> SqliteResult<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).map_err(|e| conversion_error(idx, e))
}

fn optional_datetime_column(row: &Row, idx: &str) -> SqliteResult<Option<DateTime<Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|raw| parse_datetime(&raw).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row, idx: &str) -> SqliteResult<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn conversion_error<E>(column: &str, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    tracing::warn!(column, error = %err, "unreadable column value");
    rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(err))
}

// ============================================================
// Catalog
// ============================================================

pub fn domain_from_row(row: &Row) -> SqliteResult<Domain> {
    Ok(Domain {
        id: row.get("id")?,
        name: row.get("name")?,
        fields: json_column(row, "fields")?,
    })
}

pub fn fact_from_row(row: &Row) -> SqliteResult<Fact> {
    let values: BTreeMap<String, String> = json_column(row, "data")?;
    Ok(Fact {
        id: row.get("id")?,
        domain_id: row.get("domain_id")?,
        values,
    })
}

// ============================================================
// Per-user records
// ============================================================

pub fn fact_state_from_row(row: &Row) -> SqliteResult<FactState> {
    Ok(FactState {
        fact_id: row.get("fact_id")?,
        user_id: row.get("user_id")?,
        learned_at: optional_datetime_column(row, "learned_at")?,
        last_shown_at: optional_datetime_column(row, "last_shown_at")?,
        consecutive_correct: row.get("consecutive_correct")?,
        consecutive_wrong: row.get("consecutive_wrong")?,
        version: row.get("version")?,
    })
}

pub fn attempt_from_row(row: &Row) -> SqliteResult<Attempt> {
    Ok(Attempt {
        id: row.get("id")?,
        fact_id: row.get("fact_id")?,
        user_id: row.get("user_id")?,
        field_name: row.get("field_name")?,
        correct: row.get::<_, i32>("correct")? != 0,
        timestamp: datetime_column(row, "timestamp")?,
        session_id: row.get("session_id")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_datetime_text_sorts_chronologically() {
        let base = Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .expect("valid time");
        let earlier = format_datetime(base);
        let later = format_datetime(base + Duration::microseconds(1));
        assert!(earlier < later);
        assert_eq!(earlier.len(), later.len());
    }

    #[test]
    fn test_datetime_parses_back() {
        let now = Utc::now();
        let parsed = parse_datetime(&format_datetime(now)).expect("Failed to parse");
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn test_garbage_timestamp_is_an_error() {
        assert!(parse_datetime("yesterday").is_err());
    }
}
