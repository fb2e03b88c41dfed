use std::collections::HashMap;

use rememberizer_engine::{
    Attempt, AttemptStats, Domain, DomainId, Fact, FactId, FactState, LearningStore, NewAttempt,
    ResetSummary, StoreError, StoreResult,
};

use crate::{attempt, fact_state, Storage, StorageError};

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        StoreError::new(err)
    }
}

impl LearningStore for Storage {
    fn domain(&self, domain_id: DomainId) -> StoreResult<Option<Domain>> {
        Ok(self.catalog().get_domain(domain_id)?)
    }

    fn facts(&self, domain_id: DomainId) -> StoreResult<Vec<Fact>> {
        Ok(self.catalog().facts(domain_id)?)
    }

    fn fact_state(&self, user_id: &str, fact_id: FactId) -> StoreResult<Option<FactState>> {
        Ok(self.fact_state_repo().get_state(user_id, fact_id)?)
    }

    fn fact_states(&self, user_id: &str, domain_id: DomainId) -> StoreResult<Vec<FactState>> {
        Ok(self.fact_state_repo().states_for_domain(user_id, domain_id)?)
    }

    fn insert_fact_state(&self, state: &FactState) -> StoreResult<bool> {
        Ok(self.fact_state_repo().insert_state(state)?)
    }

    fn update_fact_state(&self, state: &FactState, expected_version: i64) -> StoreResult<bool> {
        Ok(self.fact_state_repo().update_state(state, expected_version)?)
    }

    fn commit_answer(
        &self,
        attempt: &NewAttempt,
        state: &FactState,
        expected_version: i64,
    ) -> StoreResult<Option<Attempt>> {
        let committed = self.transaction(|conn| {
            if !fact_state::update_state(conn, state, expected_version)? {
                return Ok(None);
            }
            attempt::append(conn, attempt).map(Some)
        })?;
        if committed.is_none() {
            tracing::debug!(
                user_id = %state.user_id,
                fact_id = state.fact_id,
                expected_version,
                "answer not committed: version mismatch"
            );
        }
        Ok(committed)
    }

    fn recent_attempts(
        &self,
        user_id: &str,
        fact_id: FactId,
        limit: usize,
    ) -> StoreResult<Vec<Attempt>> {
        Ok(self.attempt_repo().recent(user_id, fact_id, limit)?)
    }

    fn attempts(&self, user_id: &str, domain_id: DomainId) -> StoreResult<Vec<Attempt>> {
        Ok(self.attempt_repo().for_domain(user_id, domain_id)?)
    }

    fn attempt_stats(
        &self,
        user_id: &str,
        domain_id: DomainId,
    ) -> StoreResult<HashMap<FactId, AttemptStats>> {
        Ok(self.attempt_repo().stats_for_domain(user_id, domain_id)?)
    }

    fn delete_progress(&self, user_id: &str, domain_id: DomainId) -> StoreResult<ResetSummary> {
        let summary = self.transaction(|conn| {
            let attempts_deleted = attempt::delete_for_domain(conn, user_id, domain_id)?;
            let fact_states_deleted = fact_state::delete_for_domain(conn, user_id, domain_id)?;
            Ok(ResetSummary {
                fact_states_deleted,
                attempts_deleted,
            })
        })?;
        Ok(summary)
    }
}
