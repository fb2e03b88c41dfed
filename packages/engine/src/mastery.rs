//! Mastery predicate.
//!
//! Mastery is derived from the attempt ledger on every query and is never
//! stored: with the default rule a fact is mastered when at least 6 of the
//! newest 7 attempts are correct and the newest one is correct.

use crate::config::MasteryConfig;
use crate::error::EngineResult;
use crate::store::LearningStore;
use crate::types::{Attempt, DomainId, FactId};

impl MasteryConfig {
    /// Evaluates the rule over attempts ordered newest first. Only the first
    /// `window` entries are considered.
    pub fn evaluate(&self, newest_first: &[Attempt]) -> bool {
        self.evaluate_outcomes(newest_first.iter().map(|a| a.correct))
    }

    /// Same as [`evaluate`](Self::evaluate) over bare outcomes, newest first.
    pub fn evaluate_outcomes<I>(&self, newest_first: I) -> bool
    where
        I: IntoIterator<Item = bool>,
    {
        let recent: Vec<bool> = newest_first.into_iter().take(self.window).collect();
        if recent.len() < self.window {
            return false;
        }
        if !recent[0] {
            return false;
        }
        recent.iter().filter(|correct| **correct).count() >= self.required_correct
    }
}

pub struct MasteryEvaluator<'a, S: LearningStore + ?Sized> {
    store: &'a S,
    rule: &'a MasteryConfig,
}

impl<'a, S: LearningStore + ?Sized> MasteryEvaluator<'a, S> {
    pub fn new(store: &'a S, rule: &'a MasteryConfig) -> Self {
        Self { store, rule }
    }

    pub fn is_mastered(&self, fact_id: FactId, user_id: &str) -> EngineResult<bool> {
        let recent = self
            .store
            .recent_attempts(user_id, fact_id, self.rule.window)?;
        Ok(self.rule.evaluate(&recent))
    }

    /// Ids of the mastered facts of a domain, ascending.
    pub fn mastered_facts(&self, domain_id: DomainId, user_id: &str) -> EngineResult<Vec<FactId>> {
        let mut mastered = Vec::new();
        for fact in self.store.facts(domain_id)? {
            if self.is_mastered(fact.id, user_id)? {
                mastered.push(fact.id);
            }
        }
        Ok(mastered)
    }
}
