//! In-memory storage collaborator.
//!
//! Backs tests and embedders that keep everything in process. A single mutex
//! guards all tables, so every trait call is atomic.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::store::{LearningStore, StoreError, StoreResult};
use crate::types::{
    Attempt, AttemptStats, Domain, DomainId, Fact, FactId, FactState, NewAttempt, ResetSummary,
};

#[derive(Default)]
struct Tables {
    domains: BTreeMap<DomainId, Domain>,
    facts: BTreeMap<FactId, Fact>,
    states: HashMap<(String, FactId), FactState>,
    attempts: Vec<Attempt>,
    next_domain_id: DomainId,
    next_fact_id: FactId,
    next_attempt_id: i64,
    unavailable: bool,
}

impl Tables {
    fn domain_fact_ids(&self, domain_id: DomainId) -> HashSet<FactId> {
        self.facts
            .values()
            .filter(|f| f.domain_id == domain_id)
            .map(|f| f.id)
            .collect()
    }

    fn append(&mut self, attempt: &NewAttempt) -> Attempt {
        self.next_attempt_id += 1;
        let stored = attempt.clone().into_attempt(self.next_attempt_id);
        self.attempts.push(stored.clone());
        stored
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Seeding ==========

    /// Adds a domain and its facts; fact ids are assigned in row order.
    pub fn add_domain(
        &self,
        name: &str,
        fields: &[&str],
        rows: Vec<BTreeMap<String, String>>,
    ) -> DomainId {
        let mut tables = self.seed_lock();
        tables.next_domain_id += 1;
        let domain_id = tables.next_domain_id;
        tables.domains.insert(
            domain_id,
            Domain {
                id: domain_id,
                name: name.to_string(),
                fields: fields.iter().map(|f| f.to_string()).collect(),
            },
        );
        for values in rows {
            tables.next_fact_id += 1;
            let fact_id = tables.next_fact_id;
            tables.facts.insert(
                fact_id,
                Fact {
                    id: fact_id,
                    domain_id,
                    values,
                },
            );
        }
        domain_id
    }

    /// Adds a domain from positional rows matching `fields`.
    pub fn add_domain_with_rows(&self, name: &str, fields: &[&str], rows: &[&[&str]]) -> DomainId {
        let rows = rows
            .iter()
            .map(|row| {
                fields
                    .iter()
                    .zip(row.iter())
                    .map(|(field, value)| (field.to_string(), value.to_string()))
                    .collect()
            })
            .collect();
        self.add_domain(name, fields, rows)
    }

    pub fn fact_ids(&self, domain_id: DomainId) -> Vec<FactId> {
        let tables = self.seed_lock();
        tables
            .facts
            .values()
            .filter(|f| f.domain_id == domain_id)
            .map(|f| f.id)
            .collect()
    }

    /// Appends an attempt directly to the ledger, bypassing FactState.
    pub fn push_attempt(
        &self,
        user_id: &str,
        fact_id: FactId,
        correct: bool,
        timestamp: DateTime<Utc>,
    ) -> Attempt {
        let mut tables = self.seed_lock();
        tables.append(&NewAttempt {
            fact_id,
            user_id: user_id.to_string(),
            field_name: String::new(),
            correct,
            timestamp,
            session_id: "seed".to_string(),
        })
    }

    /// Makes every trait call fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.seed_lock().unavailable = unavailable;
    }

    fn seed_lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        let tables = self
            .tables
            .lock()
            .map_err(|e| StoreError::message(format!("lock poisoned: {e}")))?;
        if tables.unavailable {
            return Err(StoreError::message("in-memory store unavailable"));
        }
        Ok(tables)
    }
}

impl LearningStore for InMemoryStore {
    fn domain(&self, domain_id: DomainId) -> StoreResult<Option<Domain>> {
        Ok(self.lock()?.domains.get(&domain_id).cloned())
    }

    fn facts(&self, domain_id: DomainId) -> StoreResult<Vec<Fact>> {
        Ok(self
            .lock()?
            .facts
            .values()
            .filter(|f| f.domain_id == domain_id)
            .cloned()
            .collect())
    }

    fn fact_state(&self, user_id: &str, fact_id: FactId) -> StoreResult<Option<FactState>> {
        Ok(self
            .lock()?
            .states
            .get(&(user_id.to_string(), fact_id))
            .cloned())
    }

    fn fact_states(&self, user_id: &str, domain_id: DomainId) -> StoreResult<Vec<FactState>> {
        let tables = self.lock()?;
        let fact_ids = tables.domain_fact_ids(domain_id);
        let mut states: Vec<FactState> = tables
            .states
            .values()
            .filter(|s| s.user_id == user_id && fact_ids.contains(&s.fact_id))
            .cloned()
            .collect();
        states.sort_by_key(|s| s.fact_id);
        Ok(states)
    }

    fn insert_fact_state(&self, state: &FactState) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        let key = (state.user_id.clone(), state.fact_id);
        if tables.states.contains_key(&key) {
            return Ok(false);
        }
        tables.states.insert(key, state.clone());
        Ok(true)
    }

    fn update_fact_state(&self, state: &FactState, expected_version: i64) -> StoreResult<bool> {
        let mut tables = self.lock()?;
        match tables.states.get_mut(&(state.user_id.clone(), state.fact_id)) {
            Some(stored) if stored.version == expected_version => {
                *stored = state.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn commit_answer(
        &self,
        attempt: &NewAttempt,
        state: &FactState,
        expected_version: i64,
    ) -> StoreResult<Option<Attempt>> {
        let mut tables = self.lock()?;
        match tables.states.get_mut(&(state.user_id.clone(), state.fact_id)) {
            Some(stored) if stored.version == expected_version => {
                *stored = state.clone();
            }
            _ => return Ok(None),
        }
        Ok(Some(tables.append(attempt)))
    }

    fn recent_attempts(
        &self,
        user_id: &str,
        fact_id: FactId,
        limit: usize,
    ) -> StoreResult<Vec<Attempt>> {
        let tables = self.lock()?;
        let mut attempts: Vec<Attempt> = tables
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && a.fact_id == fact_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| (b.timestamp, b.id).cmp(&(a.timestamp, a.id)));
        attempts.truncate(limit);
        Ok(attempts)
    }

    fn attempts(&self, user_id: &str, domain_id: DomainId) -> StoreResult<Vec<Attempt>> {
        let tables = self.lock()?;
        let fact_ids = tables.domain_fact_ids(domain_id);
        let mut attempts: Vec<Attempt> = tables
            .attempts
            .iter()
            .filter(|a| a.user_id == user_id && fact_ids.contains(&a.fact_id))
            .cloned()
            .collect();
        attempts.sort_by_key(|a| (a.timestamp, a.id));
        Ok(attempts)
    }

    fn attempt_stats(
        &self,
        user_id: &str,
        domain_id: DomainId,
    ) -> StoreResult<HashMap<FactId, AttemptStats>> {
        let mut stats: HashMap<FactId, AttemptStats> = HashMap::new();
        for attempt in self.attempts(user_id, domain_id)? {
            let entry = stats.entry(attempt.fact_id).or_default();
            entry.total += 1;
            if attempt.correct {
                entry.correct += 1;
            }
            entry.last_attempt_at = entry.last_attempt_at.max(Some(attempt.timestamp));
        }
        Ok(stats)
    }

    fn delete_progress(&self, user_id: &str, domain_id: DomainId) -> StoreResult<ResetSummary> {
        let mut tables = self.lock()?;
        let fact_ids = tables.domain_fact_ids(domain_id);

        let states_before = tables.states.len();
        tables
            .states
            .retain(|(owner, fact_id), _| !(owner == user_id && fact_ids.contains(fact_id)));
        let attempts_before = tables.attempts.len();
        tables
            .attempts
            .retain(|a| !(a.user_id == user_id && fact_ids.contains(&a.fact_id)));

        Ok(ResetSummary {
            fact_states_deleted: states_before - tables.states.len(),
            attempts_deleted: attempts_before - tables.attempts.len(),
        })
    }
}
