//! Which fact comes next.
//!
//! Rules, first match wins:
//!
//! 1. a card waiting for acknowledgement is shown again;
//! 2. the pending fact (retry after an answer, or re-learn after a demotion);
//! 3. unlearned facts, never-shown first;
//! 4. every `interval`-th question: a random mastered fact;
//! 5. recovery mode: the least recently practiced backlog fact;
//! 6. the least practiced learned fact.
//!
//! Nothing left gives [`Selection::NoEligibleFact`].

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::recovery::{RecoveryModeDetector, RecoveryStatus};
use crate::session::SessionState;
use crate::snapshot::{DomainSnapshot, FactView};
use crate::types::{FactId, LearningState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    AwaitingAcknowledgement,
    PendingRetry,
    Relearn,
    Unlearned,
    Reinforcement,
    Recovery,
    LeastPracticed,
}

impl SelectionReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            SelectionReason::AwaitingAcknowledgement => "awaiting_acknowledgement",
            SelectionReason::PendingRetry => "pending_retry",
            SelectionReason::Relearn => "relearn",
            SelectionReason::Unlearned => "unlearned",
            SelectionReason::Reinforcement => "reinforcement",
            SelectionReason::Recovery => "recovery",
            SelectionReason::LeastPracticed => "least_practiced",
        }
    }

    /// Reasons that keep the session's pending marker.
    pub fn keeps_pending(self) -> bool {
        matches!(
            self,
            SelectionReason::PendingRetry
                | SelectionReason::Relearn
                | SelectionReason::AwaitingAcknowledgement
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Show the fact card; the learner acknowledges it before being quizzed.
    ShowFact {
        fact_id: FactId,
        reason: SelectionReason,
    },
    Ask {
        fact_id: FactId,
        reason: SelectionReason,
    },
    NoEligibleFact,
}

pub struct FactSelector<'a> {
    config: &'a EngineConfig,
}

impl<'a> FactSelector<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn select<R: Rng + ?Sized>(
        &self,
        snapshot: &DomainSnapshot,
        session: &SessionState,
        recovery: &RecoveryStatus,
        rng: &mut R,
    ) -> Selection {
        let selection = self.pick(snapshot, session, recovery, rng);
        match selection {
            Selection::ShowFact { fact_id, reason } | Selection::Ask { fact_id, reason } => {
                tracing::debug!(
                    domain_id = snapshot.domain.id,
                    fact_id,
                    reason = reason.as_str(),
                    recovery = recovery.is_active(),
                    "fact selected"
                );
            }
            Selection::NoEligibleFact => {
                tracing::debug!(domain_id = snapshot.domain.id, "no eligible fact");
            }
        }
        selection
    }

    fn pick<R: Rng + ?Sized>(
        &self,
        snapshot: &DomainSnapshot,
        session: &SessionState,
        recovery: &RecoveryStatus,
        rng: &mut R,
    ) -> Selection {
        let detector = RecoveryModeDetector::new(&self.config.recovery);

        if let Some(view) = session.awaiting_ack_for().and_then(|id| snapshot.view(id)) {
            if !view.learned {
                return Selection::ShowFact {
                    fact_id: view.fact_id,
                    reason: SelectionReason::AwaitingAcknowledgement,
                };
            }
        }

        if let Some(view) = session.pending_fact.and_then(|id| snapshot.view(id)) {
            return if view.learned {
                Selection::Ask {
                    fact_id: view.fact_id,
                    reason: SelectionReason::PendingRetry,
                }
            } else {
                Selection::ShowFact {
                    fact_id: view.fact_id,
                    reason: SelectionReason::Relearn,
                }
            };
        }

        let allow_new = detector.new_facts_allowed(recovery);
        if let Some(fact_id) = next_unlearned(&snapshot.views, allow_new) {
            return Selection::ShowFact {
                fact_id,
                reason: SelectionReason::Unlearned,
            };
        }

        let upcoming = session.question_count + 1;
        if upcoming % self.config.reinforcement.interval == 0
            && detector.reinforcement_allowed(recovery)
        {
            let mastered: Vec<&FactView> = snapshot
                .views
                .iter()
                .filter(|v| v.state() == LearningState::Mastered)
                .collect();
            if let Some(view) = without_recent(mastered, session).choose(rng) {
                return Selection::Ask {
                    fact_id: view.fact_id,
                    reason: SelectionReason::Reinforcement,
                };
            }
        }

        if recovery.is_active() {
            let backlog = snapshot
                .views
                .iter()
                .filter(|v| v.state() == LearningState::Learned)
                .min_by_key(|v| (v.last_attempt_at, v.attempts, v.fact_id));
            if let Some(view) = backlog {
                return Selection::Ask {
                    fact_id: view.fact_id,
                    reason: SelectionReason::Recovery,
                };
            }
        }

        let learned: Vec<&FactView> = snapshot.views.iter().filter(|v| v.learned).collect();
        let least_practiced = without_recent(learned, session)
            .into_iter()
            .min_by_key(|v| (v.attempts, v.last_shown_at, v.fact_id));
        if let Some(view) = least_practiced {
            return Selection::Ask {
                fact_id: view.fact_id,
                reason: SelectionReason::LeastPracticed,
            };
        }

        // Only deferred new facts remain: recovery has nothing to consolidate.
        if !allow_new {
            if let Some(fact_id) = next_unlearned(&snapshot.views, true) {
                return Selection::ShowFact {
                    fact_id,
                    reason: SelectionReason::Unlearned,
                };
            }
        }

        Selection::NoEligibleFact
    }
}

/// Never-shown facts first (lowest id), then the unlearned fact shown
/// longest ago.
fn next_unlearned(views: &[FactView], allow_never_shown: bool) -> Option<FactId> {
    let unlearned = views.iter().filter(|v| !v.learned);
    if allow_never_shown {
        if let Some(view) = unlearned.clone().find(|v| !v.was_shown()) {
            return Some(view.fact_id);
        }
    }
    unlearned
        .filter(|v| v.was_shown())
        .min_by_key(|v| (v.last_shown_at, v.fact_id))
        .map(|v| v.fact_id)
}

/// Drops recently asked facts unless that would empty the pool.
fn without_recent<'v>(pool: Vec<&'v FactView>, session: &SessionState) -> Vec<&'v FactView> {
    let fresh: Vec<&FactView> = pool
        .iter()
        .copied()
        .filter(|v| !session.is_recently_asked(v.fact_id))
        .collect();
    if fresh.is_empty() {
        pool
    } else {
        fresh
    }
}
