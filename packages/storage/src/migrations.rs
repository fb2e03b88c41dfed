//! Schema migrations.
//!
//! Each migration runs in its own transaction and is recorded in
//! `schema_migrations`; applied versions are skipped.

use chrono::Utc;
use rusqlite::Connection;

use crate::{StorageError, StorageResult};

pub const CURRENT_SCHEMA_VERSION: i32 = 2;

const INIT_SCHEMA: &str = include_str!("schema.sql");

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i32,
    pub name: String,
    pub sql: String,
}

impl Migration {
    pub fn new(version: i32, name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            version,
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// All migrations, ascending by version.
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration::new(1, "initial schema", INIT_SCHEMA),
        Migration::new(
            2,
            "ledger and progress indexes",
            r#"
            CREATE INDEX IF NOT EXISTS idx_attempt_user_time
                ON attempt(user_id, timestamp, id);

            CREATE INDEX IF NOT EXISTS idx_attempt_session
                ON attempt(user_id, session_id);

            CREATE INDEX IF NOT EXISTS idx_fact_state_user_shown
                ON fact_state(user_id, last_shown_at);
            "#,
        ),
    ]
}

fn ensure_migrations_table(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );
        "#,
    )
    .map_err(|e| StorageError::Migration(format!("failed to create schema_migrations: {e}")))?;
    Ok(())
}

/// Highest applied version, 0 for an empty database.
pub fn get_current_version(conn: &Connection) -> StorageResult<i32> {
    ensure_migrations_table(conn)?;
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn get_applied_versions(conn: &Connection) -> StorageResult<Vec<i32>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<i32>, _>>()?;
    Ok(versions)
}

/// Applies pending migrations and returns the resulting schema version.
pub fn run_migrations(conn: &Connection) -> StorageResult<i32> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_versions(conn)?;
    let mut version = get_current_version(conn)?;

    for migration in get_migrations() {
        if applied.contains(&migration.version) {
            continue;
        }
        tracing::info!(version = migration.version, name = %migration.name, "running migration");
        execute_migration_in_transaction(conn, &migration)?;
        version = migration.version;
    }

    tracing::debug!(version, target = CURRENT_SCHEMA_VERSION, "schema up to date");
    Ok(version)
}

fn execute_migration_in_transaction(conn: &Connection, migration: &Migration) -> StorageResult<()> {
    conn.execute_batch("BEGIN IMMEDIATE")?;

    let result = conn
        .execute_batch(&migration.sql)
        .map_err(|e| {
            StorageError::Migration(format!("migration v{} failed: {e}", migration.version))
        })
        .and_then(|_| {
            conn.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![migration.version, migration.name, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        });

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT")?;
            Ok(())
        }
        Err(err) => {
            tracing::error!(version = migration.version, error = %err, "migration failed");
            conn.execute_batch("ROLLBACK").ok();
            Err(err)
        }
    }
}
