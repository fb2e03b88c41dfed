//! FactState rows. Every query filters on `user_id`.

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension};

use rememberizer_engine::{DomainId, FactId, FactState};

use crate::models::{fact_state_from_row, format_datetime};
use crate::{lock, StorageResult};

const COLUMNS: &str = "fs.user_id, fs.fact_id, fs.learned_at, fs.last_shown_at, \
                       fs.consecutive_correct, fs.consecutive_wrong, fs.version";

pub struct FactStateRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FactStateRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn get_state(&self, user_id: &str, fact_id: FactId) -> StorageResult<Option<FactState>> {
        let conn = lock(&self.conn)?;
        get_state(&conn, user_id, fact_id)
    }

    /// States of the user for the facts of one domain, by fact id.
    pub fn states_for_domain(
        &self,
        user_id: &str,
        domain_id: DomainId,
    ) -> StorageResult<Vec<FactState>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM fact_state fs
             JOIN fact f ON f.id = fs.fact_id
             WHERE fs.user_id = ?1 AND f.domain_id = ?2
             ORDER BY fs.fact_id"
        ))?;
        let states = stmt
            .query_map(params![user_id, domain_id], fact_state_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(states)
    }

    /// Returns `false` when the (user, fact) row already exists.
    pub fn insert_state(&self, state: &FactState) -> StorageResult<bool> {
        let conn = lock(&self.conn)?;
        let rows = conn.execute(
            r#"
            INSERT OR IGNORE INTO fact_state (
                user_id, fact_id, learned_at, last_shown_at,
                consecutive_correct, consecutive_wrong, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                state.user_id,
                state.fact_id,
                state.learned_at.map(format_datetime),
                state.last_shown_at.map(format_datetime),
                state.consecutive_correct,
                state.consecutive_wrong,
                state.version,
            ],
        )?;
        Ok(rows > 0)
    }

    /// Optimistic update: writes only if the stored version is
    /// `expected_version`. `false` means a version conflict.
    pub fn update_state(&self, state: &FactState, expected_version: i64) -> StorageResult<bool> {
        let conn = lock(&self.conn)?;
        update_state(&conn, state, expected_version)
    }

    /// Deletes the user's states for one domain; returns the row count.
    pub fn delete_for_domain(&self, user_id: &str, domain_id: DomainId) -> StorageResult<usize> {
        let conn = lock(&self.conn)?;
        delete_for_domain(&conn, user_id, domain_id)
    }
}

// ============================================================
// Connection-level helpers, shared with transactional callers
// ============================================================

pub(crate) fn get_state(
    conn: &Connection,
    user_id: &str,
    fact_id: FactId,
) -> StorageResult<Option<FactState>> {
    let state = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM fact_state fs WHERE fs.user_id = ?1 AND fs.fact_id = ?2"),
            params![user_id, fact_id],
            fact_state_from_row,
        )
        .optional()?;
    Ok(state)
}

pub(crate) fn update_state(
    conn: &Connection,
    state: &FactState,
    expected_version: i64,
) -> StorageResult<bool> {
    let rows = conn.execute(
        r#"
        UPDATE fact_state SET
            learned_at = ?1,
            last_shown_at = ?2,
            consecutive_correct = ?3,
            consecutive_wrong = ?4,
            version = ?5
        WHERE user_id = ?6 AND fact_id = ?7 AND version = ?8
        "#,
        params![
            state.learned_at.map(format_datetime),
            state.last_shown_at.map(format_datetime),
            state.consecutive_correct,
            state.consecutive_wrong,
            state.version,
            state.user_id,
            state.fact_id,
            expected_version,
        ],
    )?;
    Ok(rows > 0)
}

pub(crate) fn delete_for_domain(
    conn: &Connection,
    user_id: &str,
    domain_id: DomainId,
) -> StorageResult<usize> {
    let rows = conn.execute(
        "DELETE FROM fact_state
         WHERE user_id = ?1 AND fact_id IN (SELECT id FROM fact WHERE domain_id = ?2)",
        params![user_id, domain_id],
    )?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRepository;
    use crate::migrations;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn setup_test_db() -> (Arc<Mutex<Connection>>, DomainId, Vec<FactId>) {
        let conn = Connection::open_in_memory().expect("Failed to open in-memory connection");
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .expect("Failed to set pragma");
        migrations::run_migrations(&conn).expect("Failed to run migrations");
        let conn = Arc::new(Mutex::new(conn));

        let catalog = CatalogRepository::new(Arc::clone(&conn));
        let rows: Vec<BTreeMap<String, String>> = ["red", "green", "blue"]
            .iter()
            .map(|name| BTreeMap::from([("name".to_string(), name.to_string())]))
            .collect();
        let domain_id = catalog
            .create_domain("Colors", &["name".to_string()], &rows)
            .expect("Failed to create domain");
        let fact_ids = catalog
            .facts(domain_id)
            .expect("Failed to read facts")
            .iter()
            .map(|f| f.id)
            .collect();
        (conn, domain_id, fact_ids)
    }

    #[test]
    fn test_insert_and_get_state() {
        let (conn, _, facts) = setup_test_db();
        let repo = FactStateRepository::new(conn);

        let state = FactState::new(facts[0], "user-1");
        assert!(repo.insert_state(&state).expect("Failed to insert"));
        assert!(!repo.insert_state(&state).expect("Failed to insert"));

        let stored = repo
            .get_state("user-1", facts[0])
            .expect("Failed to get state")
            .expect("State not found");
        assert_eq!(stored, state);
        assert!(repo
            .get_state("user-2", facts[0])
            .expect("Failed to get state")
            .is_none());
    }

    #[test]
    fn test_update_state_with_version_check() {
        let (conn, _, facts) = setup_test_db();
        let repo = FactStateRepository::new(conn);

        let state = FactState::new(facts[0], "user-1");
        repo.insert_state(&state).expect("Failed to insert");

        let mut next = state.clone();
        next.learned_at = Some(Utc::now());
        next.consecutive_correct = 1;
        next.version = 1;
        assert!(repo.update_state(&next, 0).expect("Failed to update"));

        // Stale writer still expects version 0.
        assert!(!repo.update_state(&next, 0).expect("Failed to update"));

        let stored = repo
            .get_state("user-1", facts[0])
            .expect("Failed to get state")
            .expect("State not found");
        assert_eq!(stored.version, 1);
        assert_eq!(stored.consecutive_correct, 1);
    }

    #[test]
    fn test_states_scoped_to_user_and_domain() {
        let (conn, domain_id, facts) = setup_test_db();
        let repo = FactStateRepository::new(conn);
        for fact_id in &facts {
            repo.insert_state(&FactState::new(*fact_id, "user-1"))
                .expect("Failed to insert");
        }
        repo.insert_state(&FactState::new(facts[0], "user-2"))
            .expect("Failed to insert");

        let states = repo
            .states_for_domain("user-1", domain_id)
            .expect("Failed to list");
        assert_eq!(states.len(), 3);
        assert!(states.iter().all(|s| s.user_id == "user-1"));

        let deleted = repo
            .delete_for_domain("user-1", domain_id)
            .expect("Failed to delete");
        assert_eq!(deleted, 3);
        assert_eq!(
            repo.states_for_domain("user-2", domain_id)
                .expect("Failed to list")
                .len(),
            1
        );
    }
}
