//! Storage collaborator interface.
//!
//! The engine never talks to a database directly. It reads the catalog and
//! reads/writes per-user records through [`LearningStore`]. Every per-user
//! method takes the user id explicitly; implementations must filter on it at
//! the query layer so one user's rows are never visible to another.

use std::collections::HashMap;
use std::error::Error as StdError;

use thiserror::Error;

use crate::types::{
    Attempt, AttemptStats, Domain, DomainId, Fact, FactId, FactState, NewAttempt, ResetSummary,
};

/// Failure reported by a storage collaborator. Passed through untouched.
#[derive(Debug, Error)]
#[error("storage failure: {source}")]
pub struct StoreError {
    source: Box<dyn StdError + Send + Sync>,
}

impl StoreError {
    pub fn new<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        Self {
            source: source.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::new(message.into())
    }

    pub fn into_inner(self) -> Box<dyn StdError + Send + Sync> {
        self.source
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait LearningStore {
    // ========== Catalog (read-only) ==========

    fn domain(&self, domain_id: DomainId) -> StoreResult<Option<Domain>>;

    /// All facts of a domain, ordered by fact id ascending.
    fn facts(&self, domain_id: DomainId) -> StoreResult<Vec<Fact>>;

    // ========== FactState ==========

    fn fact_state(&self, user_id: &str, fact_id: FactId) -> StoreResult<Option<FactState>>;

    /// States of `user_id` for the facts of `domain_id`. Facts never shown to
    /// the user have no row.
    fn fact_states(&self, user_id: &str, domain_id: DomainId) -> StoreResult<Vec<FactState>>;

    /// Inserts a new state. Returns `false` if a row for the same
    /// (user, fact) already exists.
    fn insert_fact_state(&self, state: &FactState) -> StoreResult<bool>;

    /// Writes `state` only if the stored version equals `expected_version`.
    /// Returns `false` on a version mismatch.
    fn update_fact_state(&self, state: &FactState, expected_version: i64) -> StoreResult<bool>;

    // ========== Attempts ==========

    /// Appends `attempt` and writes `state` (version-checked) as one atomic
    /// unit. Returns `None` without writing anything on a version mismatch.
    fn commit_answer(
        &self,
        attempt: &NewAttempt,
        state: &FactState,
        expected_version: i64,
    ) -> StoreResult<Option<Attempt>>;

    /// The newest `limit` attempts of `user_id` on `fact_id`, newest first
    /// (timestamp descending, insertion order breaking ties).
    fn recent_attempts(
        &self,
        user_id: &str,
        fact_id: FactId,
        limit: usize,
    ) -> StoreResult<Vec<Attempt>>;

    /// Every attempt of `user_id` on the facts of `domain_id`, oldest first.
    fn attempts(&self, user_id: &str, domain_id: DomainId) -> StoreResult<Vec<Attempt>>;

    /// Per-fact ledger aggregates. Facts without attempts are absent.
    fn attempt_stats(
        &self,
        user_id: &str,
        domain_id: DomainId,
    ) -> StoreResult<HashMap<FactId, AttemptStats>>;

    /// Deletes every FactState and Attempt of `user_id` for `domain_id`.
    fn delete_progress(&self, user_id: &str, domain_id: DomainId) -> StoreResult<ResetSummary>;
}

impl<S: LearningStore + ?Sized> LearningStore for &S {
    fn domain(&self, domain_id: DomainId) -> StoreResult<Option<Domain>> {
        (**self).domain(domain_id)
    }

    fn facts(&self, domain_id: DomainId) -> StoreResult<Vec<Fact>> {
        (**self).facts(domain_id)
    }

    fn fact_state(&self, user_id: &str, fact_id: FactId) -> StoreResult<Option<FactState>> {
        (**self).fact_state(user_id, fact_id)
    }

    fn fact_states(&self, user_id: &str, domain_id: DomainId) -> StoreResult<Vec<FactState>> {
        (**self).fact_states(user_id, domain_id)
    }

    fn insert_fact_state(&self, state: &FactState) -> StoreResult<bool> {
        (**self).insert_fact_state(state)
    }

    fn update_fact_state(&self, state: &FactState, expected_version: i64) -> StoreResult<bool> {
        (**self).update_fact_state(state, expected_version)
    }

    fn commit_answer(
        &self,
        attempt: &NewAttempt,
        state: &FactState,
        expected_version: i64,
    ) -> StoreResult<Option<Attempt>> {
        (**self).commit_answer(attempt, state, expected_version)
    }

    fn recent_attempts(
        &self,
        user_id: &str,
        fact_id: FactId,
        limit: usize,
    ) -> StoreResult<Vec<Attempt>> {
        (**self).recent_attempts(user_id, fact_id, limit)
    }

    fn attempts(&self, user_id: &str, domain_id: DomainId) -> StoreResult<Vec<Attempt>> {
        (**self).attempts(user_id, domain_id)
    }

    fn attempt_stats(
        &self,
        user_id: &str,
        domain_id: DomainId,
    ) -> StoreResult<HashMap<FactId, AttemptStats>> {
        (**self).attempt_stats(user_id, domain_id)
    }

    fn delete_progress(&self, user_id: &str, domain_id: DomainId) -> StoreResult<ResetSummary> {
        (**self).delete_progress(user_id, domain_id)
    }
}
