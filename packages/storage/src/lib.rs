//! SQLite storage for the Rememberizer engine.
//!
//! - catalog: domains and facts, JSON import
//! - fact states: one row per (user, fact), version-checked updates
//! - attempts: append-only answer ledger
//!
//! [`Storage`] implements [`rememberizer_engine::LearningStore`], so it can be
//! handed straight to a `LearningEngine`.

// ============================================================
// Modules
// ============================================================

pub mod attempt;
pub mod catalog;
pub mod fact_state;
pub mod migrations;
pub mod models;
mod store;

// ============================================================
// Re-exports
// ============================================================

pub use attempt::AttemptRepository;
pub use catalog::{CatalogRepository, DomainFile, DomainSummary};
pub use fact_state::FactStateRepository;
pub use migrations::run_migrations;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

// ============================================================
// Errors
// ============================================================

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid domain file: {0}")]
    InvalidDomain(String),

    #[error("domain '{0}' already exists")]
    DuplicateDomain(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("lock poisoned: {0}")]
    LockError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ============================================================
// Storage
// ============================================================

/// Shared connection plus repository accessors.
#[derive(Clone)]
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
    db_path: String,
}

impl Storage {
    /// Opens (or creates) a database file and applies pending migrations.
    pub fn new<P: AsRef<Path>>(db_path: P) -> StorageResult<Self> {
        let path = db_path.as_ref().to_string_lossy().to_string();
        let connection = Connection::open(&db_path)?;

        connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        Self::with_connection(connection, path)
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> StorageResult<Self> {
        let connection = Connection::open_in_memory()?;
        connection.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::with_connection(connection, ":memory:".to_string())
    }

    fn with_connection(connection: Connection, db_path: String) -> StorageResult<Self> {
        let version = migrations::run_migrations(&connection)?;
        tracing::debug!(db_path = %db_path, schema_version = version, "storage opened");
        Ok(Self {
            conn: Arc::new(Mutex::new(connection)),
            db_path,
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(Arc::clone(&self.conn))
    }

    pub fn fact_state_repo(&self) -> FactStateRepository {
        FactStateRepository::new(Arc::clone(&self.conn))
    }

    pub fn attempt_repo(&self) -> AttemptRepository {
        AttemptRepository::new(Arc::clone(&self.conn))
    }

    /// Runs `f` inside one SQLite transaction; any error rolls it back.
    pub fn transaction<F, T>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}

pub(crate) fn lock(conn: &Mutex<Connection>) -> StorageResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StorageError::LockError(e.to_string()))
}

// ============================================================
// Tests
// ============================================================
