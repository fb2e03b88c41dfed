//! Append-only attempt ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection};

use rememberizer_engine::{Attempt, AttemptStats, DomainId, FactId, NewAttempt};

use crate::models::{attempt_from_row, format_datetime, parse_datetime};
use crate::{lock, StorageResult};

const COLUMNS: &str = "a.id, a.fact_id, a.user_id, a.field_name, a.correct, a.timestamp, a.session_id";

pub struct AttemptRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AttemptRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn append(&self, attempt: &NewAttempt) -> StorageResult<Attempt> {
        let conn = lock(&self.conn)?;
        append(&conn, attempt)
    }

    /// Newest first; insertion order breaks timestamp ties.
    pub fn recent(&self, user_id: &str, fact_id: FactId, limit: usize) -> StorageResult<Vec<Attempt>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM attempt a
             WHERE a.user_id = ?1 AND a.fact_id = ?2
             ORDER BY a.timestamp DESC, a.id DESC
             LIMIT ?3"
        ))?;
        let attempts = stmt
            .query_map(params![user_id, fact_id, limit as i64], attempt_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attempts)
    }

    /// Every attempt of the user in one domain, oldest first.
    pub fn for_domain(&self, user_id: &str, domain_id: DomainId) -> StorageResult<Vec<Attempt>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM attempt a
             JOIN fact f ON f.id = a.fact_id
             WHERE a.user_id = ?1 AND f.domain_id = ?2
             ORDER BY a.timestamp, a.id"
        ))?;
        let attempts = stmt
            .query_map(params![user_id, domain_id], attempt_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(attempts)
    }

    pub fn stats_for_domain(
        &self,
        user_id: &str,
        domain_id: DomainId,
    ) -> StorageResult<HashMap<FactId, AttemptStats>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT a.fact_id, COUNT(*), SUM(a.correct), MAX(a.timestamp)
             FROM attempt a
             JOIN fact f ON f.id = a.fact_id
             WHERE a.user_id = ?1 AND f.domain_id = ?2
             GROUP BY a.fact_id",
        )?;
        let rows = stmt
            .query_map(params![user_id, domain_id], |row| {
                Ok((
                    row.get::<_, FactId>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stats = HashMap::with_capacity(rows.len());
        for (fact_id, total, correct, last) in rows {
            let last_attempt_at = match last {
                Some(raw) => Some(parse_datetime(&raw).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?),
                None => None,
            };
            stats.insert(
                fact_id,
                AttemptStats {
                    total: total as u32,
                    correct: correct.unwrap_or(0) as u32,
                    last_attempt_at,
                },
            );
        }
        Ok(stats)
    }

    pub fn delete_for_domain(&self, user_id: &str, domain_id: DomainId) -> StorageResult<usize> {
        let conn = lock(&self.conn)?;
        delete_for_domain(&conn, user_id, domain_id)
    }
}

pub(crate) fn append(conn: &Connection, attempt: &NewAttempt) -> StorageResult<Attempt> {
    conn.execute(
        r#"
        INSERT INTO attempt (fact_id, user_id, field_name, correct, timestamp, session_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            attempt.fact_id,
            attempt.user_id,
            attempt.field_name,
            attempt.correct as i32,
            format_datetime(attempt.timestamp),
            attempt.session_id,
        ],
    )?;
    Ok(attempt.clone().into_attempt(conn.last_insert_rowid()))
}

pub(crate) fn delete_for_domain(
    conn: &Connection,
    user_id: &str,
    domain_id: DomainId,
) -> StorageResult<usize> {
    let rows = conn.execute(
        "DELETE FROM attempt
         WHERE user_id = ?1 AND fact_id IN (SELECT id FROM fact WHERE domain_id = ?2)",
        params![user_id, domain_id],
    )?;
    Ok(rows)
}
