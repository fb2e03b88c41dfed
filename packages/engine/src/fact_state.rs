//! FactState lifecycle.
//!
//! ```text
//!   (no row) --get_or_create--> unlearned --mark_learned--> learned
//!                                   ^                          |
//!                                   |   demote_after_wrong     |  record_outcome
//!                                   +--------------------------+
//! ```
//!
//! All writes go through a version-checked update; a lost race surfaces as
//! [`EngineError::Conflict`].

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::TransitionConfig;
use crate::error::{EngineError, EngineResult};
use crate::store::LearningStore;
use crate::types::{FactId, FactState};

/// What the caller should do after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Enough consecutive correct answers: move on to another fact.
    Advance,
    /// Quiz the same fact again.
    Retry,
    /// The fact is unlearned (again): show its card.
    Demoted,
}

impl Outcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Outcome::Advance => "advance",
            Outcome::Retry => "retry",
            Outcome::Demoted => "demoted",
        }
    }
}

/// Pure transition: the state that follows `state` after one answer.
///
/// An unlearned state is returned unchanged with [`Outcome::Demoted`], so
/// counters of an unlearned fact stay at zero.
pub fn apply_outcome(
    state: &FactState,
    correct: bool,
    rules: &TransitionConfig,
) -> (FactState, Outcome) {
    if !state.is_learned() {
        return (state.clone(), Outcome::Demoted);
    }

    let mut next = state.clone();
    if correct {
        next.consecutive_correct = next.consecutive_correct.saturating_add(1);
        next.consecutive_wrong = 0;
        let outcome = if next.consecutive_correct >= rules.advance_after_correct {
            Outcome::Advance
        } else {
            Outcome::Retry
        };
        return (next, outcome);
    }

    next.consecutive_wrong = next.consecutive_wrong.saturating_add(1);
    next.consecutive_correct = 0;
    if next.consecutive_wrong >= rules.demote_after_wrong {
        next.learned_at = None;
        next.consecutive_wrong = 0;
        next.consecutive_correct = 0;
        return (next, Outcome::Demoted);
    }
    (next, Outcome::Retry)
}

/// Write path for FactState. Borrowed from the engine per operation.
pub struct FactStateStore<'a, S: LearningStore + ?Sized> {
    store: &'a S,
    rules: &'a TransitionConfig,
}

impl<'a, S: LearningStore + ?Sized> FactStateStore<'a, S> {
    pub fn new(store: &'a S, rules: &'a TransitionConfig) -> Self {
        Self { store, rules }
    }

    /// Returns the stored state, creating a zeroed one if absent.
    pub fn get_or_create(&self, fact_id: FactId, user_id: &str) -> EngineResult<FactState> {
        if let Some(state) = self.store.fact_state(user_id, fact_id)? {
            return Ok(state);
        }

        let fresh = FactState::new(fact_id, user_id);
        if self.store.insert_fact_state(&fresh)? {
            tracing::debug!(fact_id, user_id, "fact state created");
            return Ok(fresh);
        }

        // Created concurrently by another request.
        self.store
            .fact_state(user_id, fact_id)?
            .ok_or_else(|| EngineError::NotFound(format!("fact state {fact_id} for {user_id}")))
    }

    pub fn mark_shown(&self, fact_id: FactId, user_id: &str) -> EngineResult<FactState> {
        let state = self.get_or_create(fact_id, user_id)?;
        let mut next = state.clone();
        next.last_shown_at = Some(Utc::now());
        self.write(&state, next)
    }

    /// Marks an unlearned fact as learned. A no-op on a learned fact.
    pub fn mark_learned(&self, fact_id: FactId, user_id: &str) -> EngineResult<FactState> {
        let state = self.get_or_create(fact_id, user_id)?;
        if state.is_learned() {
            tracing::debug!(fact_id, user_id, "mark_learned ignored, already learned");
            return Ok(state);
        }

        let now = Utc::now();
        let mut next = state.clone();
        next.learned_at = Some(now);
        next.last_shown_at = Some(now);
        next.consecutive_correct = 0;
        next.consecutive_wrong = 0;
        let written = self.write(&state, next)?;
        tracing::info!(fact_id, user_id, "fact learned");
        Ok(written)
    }

    /// Applies one answer to the stored state.
    ///
    /// This does not touch the attempt ledger; `LearningEngine::submit_answer`
    /// commits both together.
    pub fn record_outcome(
        &self,
        fact_id: FactId,
        user_id: &str,
        correct: bool,
    ) -> EngineResult<Outcome> {
        let state = self.get_or_create(fact_id, user_id)?;
        let (next, outcome) = self.transition(&state, correct);
        if next != state {
            self.write(&state, next)?;
        }
        if outcome == Outcome::Demoted && state.is_learned() {
            tracing::info!(fact_id, user_id, "fact demoted to unlearned");
        }
        Ok(outcome)
    }

    /// The next state for `state` under this store's rules, with the
    /// version bumped when anything changed.
    pub fn transition(&self, state: &FactState, correct: bool) -> (FactState, Outcome) {
        let (mut next, outcome) = apply_outcome(state, correct, self.rules);
        if next != *state {
            next.version = state.version + 1;
        }
        (next, outcome)
    }

    fn write(&self, current: &FactState, mut next: FactState) -> EngineResult<FactState> {
        next.version = current.version + 1;
        if self.store.update_fact_state(&next, current.version)? {
            Ok(next)
        } else {
            tracing::warn!(
                fact_id = current.fact_id,
                user_id = %current.user_id,
                version = current.version,
                "fact state version conflict"
            );
            Err(EngineError::Conflict {
                fact_id: current.fact_id,
                user_id: current.user_id.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;

    fn learned_state() -> FactState {
        let mut state = FactState::new(1, "user-1");
        state.learned_at = Some(Utc::now());
        state
    }

    fn setup() -> (InMemoryStore, i64) {
        let store = InMemoryStore::new();
        let domain_id = store.add_domain_with_rows(
            "Planets",
            &["name", "order"],
            &[&["Mercury", "1"], &["Venus", "2"], &["Earth", "3"], &["Mars", "4"]],
        );
        (store, domain_id)
    }

    #[test]
    fn test_correct_twice_advances() {
        let rules = TransitionConfig::default();
        let (first, outcome) = apply_outcome(&learned_state(), true, &rules);
        assert_eq!(outcome, Outcome::Retry);
        assert_eq!(first.consecutive_correct, 1);

        let (second, outcome) = apply_outcome(&first, true, &rules);
        assert_eq!(outcome, Outcome::Advance);
        assert_eq!(second.consecutive_correct, 2);
        assert_eq!(second.consecutive_wrong, 0);
    }

    #[test]
    fn test_wrong_twice_demotes() {
        let rules = TransitionConfig::default();
        let (first, outcome) = apply_outcome(&learned_state(), false, &rules);
        assert_eq!(outcome, Outcome::Retry);
        assert_eq!(first.consecutive_wrong, 1);
        assert!(first.is_learned());

        let (second, outcome) = apply_outcome(&first, false, &rules);
        assert_eq!(outcome, Outcome::Demoted);
        assert!(second.learned_at.is_none());
        assert_eq!(second.consecutive_wrong, 0);
        assert_eq!(second.consecutive_correct, 0);
    }

    #[test]
    fn test_each_outcome_resets_the_other_counter() {
        let rules = TransitionConfig::default();
        let (state, _) = apply_outcome(&learned_state(), true, &rules);
        let (state, _) = apply_outcome(&state, false, &rules);
        assert_eq!(state.consecutive_correct, 0);
        assert_eq!(state.consecutive_wrong, 1);

        let (state, _) = apply_outcome(&state, true, &rules);
        assert_eq!(state.consecutive_correct, 1);
        assert_eq!(state.consecutive_wrong, 0);
    }

    #[test]
    fn test_unlearned_state_is_left_untouched() {
        let rules = TransitionConfig::default();
        let state = FactState::new(1, "user-1");
        let (next, outcome) = apply_outcome(&state, true, &rules);
        assert_eq!(outcome, Outcome::Demoted);
        assert_eq!(next, state);
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let (store, domain_id) = setup();
        let fact_id = store.fact_ids(domain_id)[0];
        let rules = TransitionConfig::default();
        let states = FactStateStore::new(&store, &rules);

        let created = states.get_or_create(fact_id, "user-1").expect("create");
        let again = states.get_or_create(fact_id, "user-1").expect("read");
        assert_eq!(created, again);
        assert!(!created.is_learned());
    }

    #[test]
    fn test_mark_learned_twice_keeps_progress() {
        let (store, domain_id) = setup();
        let fact_id = store.fact_ids(domain_id)[0];
        let rules = TransitionConfig::default();
        let states = FactStateStore::new(&store, &rules);

        let learned = states.mark_learned(fact_id, "user-1").expect("learn");
        states
            .record_outcome(fact_id, "user-1", true)
            .expect("answer");

        let again = states.mark_learned(fact_id, "user-1").expect("no-op");
        assert_eq!(again.learned_at, learned.learned_at);
        assert_eq!(again.consecutive_correct, 1);
    }

    #[test]
    fn test_record_outcome_persists_demotion() {
        let (store, domain_id) = setup();
        let fact_id = store.fact_ids(domain_id)[0];
        let rules = TransitionConfig::default();
        let states = FactStateStore::new(&store, &rules);

        states.mark_learned(fact_id, "user-1").expect("learn");
        assert_eq!(
            states.record_outcome(fact_id, "user-1", false).expect("wrong"),
            Outcome::Retry
        );
        assert_eq!(
            states.record_outcome(fact_id, "user-1", false).expect("wrong"),
            Outcome::Demoted
        );

        let stored = states.get_or_create(fact_id, "user-1").expect("read");
        assert!(stored.learned_at.is_none());
        assert_eq!(stored.consecutive_wrong, 0);
    }

    #[test]
    fn test_mark_shown_sets_timestamp_only() {
        let (store, domain_id) = setup();
        let fact_id = store.fact_ids(domain_id)[0];
        let rules = TransitionConfig::default();
        let states = FactStateStore::new(&store, &rules);

        let shown = states.mark_shown(fact_id, "user-1").expect("shown");
        assert!(shown.was_shown());
        assert!(!shown.is_learned());
        assert_eq!(shown.version, 1);
    }

    #[test]
    fn test_stale_write_is_a_conflict() {
        let (store, domain_id) = setup();
        let fact_id = store.fact_ids(domain_id)[0];
        let rules = TransitionConfig::default();
        let states = FactStateStore::new(&store, &rules);

        let stale = states.get_or_create(fact_id, "user-1").expect("create");
        states.mark_shown(fact_id, "user-1").expect("shown");

        let err = states.write(&stale, stale.clone()).unwrap_err();
        assert!(matches!(err, EngineError::Conflict { .. }));
    }
}
