//! Read model of one (domain, user) pair, loaded once per operation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::config::MasteryConfig;
use crate::error::{EngineError, EngineResult};
use crate::mastery::MasteryEvaluator;
use crate::recovery::BacklogCounts;
use crate::store::LearningStore;
use crate::types::{Domain, DomainId, Fact, FactId, FactState, LearningState};

/// Everything the selection rules need to know about one fact.
#[derive(Debug, Clone, PartialEq)]
pub struct FactView {
    pub fact_id: FactId,
    pub learned: bool,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub mastered: bool,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl FactView {
    pub fn state(&self) -> LearningState {
        if !self.learned {
            LearningState::Unlearned
        } else if self.mastered {
            LearningState::Mastered
        } else {
            LearningState::Learned
        }
    }

    pub fn was_shown(&self) -> bool {
        self.last_shown_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct DomainSnapshot {
    pub domain: Domain,
    /// Ordered by fact id ascending; `views[i]` describes `facts[i]`.
    pub facts: Vec<Fact>,
    pub views: Vec<FactView>,
}

impl DomainSnapshot {
    pub fn load<S: LearningStore + ?Sized>(
        store: &S,
        mastery: &MasteryConfig,
        domain_id: DomainId,
        user_id: &str,
    ) -> EngineResult<Self> {
        let domain = store
            .domain(domain_id)?
            .ok_or_else(|| EngineError::NotFound(format!("domain {domain_id}")))?;

        let mut facts = store.facts(domain_id)?;
        facts.sort_by_key(|f| f.id);

        let states: HashMap<FactId, FactState> = store
            .fact_states(user_id, domain_id)?
            .into_iter()
            .map(|s| (s.fact_id, s))
            .collect();
        let stats = store.attempt_stats(user_id, domain_id)?;
        let evaluator = MasteryEvaluator::new(store, mastery);

        let mut views = Vec::with_capacity(facts.len());
        for fact in &facts {
            let state = states.get(&fact.id);
            let stat = stats.get(&fact.id).copied().unwrap_or_default();
            // No attempts, no mastery: skip the ledger read.
            let mastered = stat.total as usize >= mastery.window
                && evaluator.is_mastered(fact.id, user_id)?;
            views.push(FactView {
                fact_id: fact.id,
                learned: state.map(FactState::is_learned).unwrap_or(false),
                last_shown_at: state.and_then(|s| s.last_shown_at),
                mastered,
                attempts: stat.total,
                last_attempt_at: stat.last_attempt_at,
            });
        }

        Ok(Self {
            domain,
            facts,
            views,
        })
    }

    pub fn fact(&self, fact_id: FactId) -> Option<&Fact> {
        self.facts.iter().find(|f| f.id == fact_id)
    }

    pub fn view(&self, fact_id: FactId) -> Option<&FactView> {
        self.views.iter().find(|v| v.fact_id == fact_id)
    }

    pub fn counts(&self) -> BacklogCounts {
        BacklogCounts {
            domain_size: self.views.len(),
            learned: self.views.iter().filter(|v| v.learned).count(),
            mastered: self
                .views
                .iter()
                .filter(|v| v.state() == LearningState::Mastered)
                .count(),
        }
    }
}
