//! Engine facade: the operations a session-orchestration layer calls.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::fact_state::{FactStateStore, Outcome};
use crate::mastery::MasteryEvaluator;
use crate::progress::{ActivitySummary, ProgressSnapshot, ProgressTracker};
use crate::question::{build_question, ensure_practicable, Question, OPTION_COUNT};
use crate::recovery::RecoveryModeDetector;
use crate::selector::{FactSelector, Selection, SelectionReason};
use crate::session::{SessionState, TurnPhase};
use crate::snapshot::DomainSnapshot;
use crate::store::LearningStore;
use crate::types::{Domain, DomainId, Fact, FactId, NewAttempt, ResetSummary};

/// What the caller should present next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnDirective {
    /// Show the fact card and wait for [`LearningEngine::acknowledge_fact`].
    ShowFact {
        fact: Fact,
        reason: SelectionReason,
        /// Field the learner missed, when re-showing a demoted fact.
        highlight_field: Option<String>,
    },
    AskQuestion {
        question: Question,
        reason: SelectionReason,
        question_number: u32,
    },
    /// Nothing left to ask; not an error.
    NoEligibleFact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub directive: TurnDirective,
    pub session: SessionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub fact_id: FactId,
    pub field: String,
    pub correct: bool,
    pub outcome: Outcome,
    pub chosen_index: usize,
    pub correct_index: usize,
    /// Set on wrong answers: the field to emphasize when showing the card.
    pub highlight_field: Option<String>,
    pub attempt_id: i64,
}

pub struct LearningEngine<S: LearningStore> {
    store: S,
    config: EngineConfig,
    rng: Mutex<ChaCha8Rng>,
}

impl<S: LearningStore> LearningEngine<S> {
    pub fn new(store: S, config: EngineConfig) -> EngineResult<Self> {
        Self::with_rng(store, config, ChaCha8Rng::from_entropy())
    }

    /// Deterministic question generation and reinforcement picks.
    pub fn with_seed(store: S, config: EngineConfig, seed: u64) -> EngineResult<Self> {
        Self::with_rng(store, config, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(store: S, config: EngineConfig, rng: ChaCha8Rng) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            rng: Mutex::new(rng),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn fact_states(&self) -> FactStateStore<'_, S> {
        FactStateStore::new(&self.store, &self.config.transitions)
    }

    pub fn mastery(&self) -> MasteryEvaluator<'_, S> {
        MasteryEvaluator::new(&self.store, &self.config.mastery)
    }

    fn rng(&self) -> MutexGuard<'_, ChaCha8Rng> {
        self.rng.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self, domain_id: DomainId, user_id: &str) -> EngineResult<DomainSnapshot> {
        DomainSnapshot::load(&self.store, &self.config.mastery, domain_id, user_id)
    }

    // ==================== Session ====================

    /// Opens a practice session. Fails when the domain is unknown or too
    /// small to build questions from.
    pub fn start_session(&self, domain_id: DomainId, user_id: &str) -> EngineResult<SessionState> {
        let domain = self
            .store
            .domain(domain_id)?
            .ok_or_else(|| EngineError::NotFound(format!("domain {domain_id}")))?;
        let facts = self.store.facts(domain_id)?;
        ensure_practicable(&domain, &facts)?;

        let session = SessionState::new(domain_id, Uuid::new_v4().to_string());
        tracing::info!(
            domain_id,
            user_id,
            session_id = %session.session_id,
            facts = facts.len(),
            "practice session started"
        );
        Ok(session)
    }

    /// Decides the next turn. `session` is not modified; the updated state is
    /// returned in the [`Turn`].
    pub fn next_turn(
        &self,
        domain_id: DomainId,
        user_id: &str,
        session: &SessionState,
    ) -> EngineResult<Turn> {
        let snapshot = self.snapshot(domain_id, user_id)?;
        let mut next = session.clone();
        next.domain_id = domain_id;

        if snapshot.facts.is_empty() {
            return Ok(Turn {
                directive: TurnDirective::NoEligibleFact,
                session: next,
            });
        }

        let detector = RecoveryModeDetector::new(&self.config.recovery);
        let outcomes: Vec<bool> = session.recent_outcomes.iter().copied().collect();
        let recovery = detector.evaluate(
            &snapshot.counts(),
            &session.recovery,
            &outcomes,
            session.correct_run,
        );
        if recovery.is_active() != session.recovery.is_active() {
            tracing::info!(
                domain_id,
                user_id,
                backlog = recovery.backlog,
                streak = recovery.streak,
                active = recovery.is_active(),
                "recovery mode changed"
            );
        }
        next.recovery = recovery;

        let selection = {
            let mut rng = self.rng();
            FactSelector::new(&self.config).select(&snapshot, session, &recovery, &mut *rng)
        };

        let directive = match selection {
            Selection::NoEligibleFact => TurnDirective::NoEligibleFact,
            Selection::ShowFact { fact_id, reason } => {
                let fact = lookup(&snapshot, fact_id)?.clone();
                next.enter(TurnPhase::ShowUnlearnedFact)?;
                next.enter(TurnPhase::AwaitLearnedAck)?;
                next.current_fact = Some(fact_id);
                self.fact_states().mark_shown(fact_id, user_id)?;

                let highlight_field = match reason {
                    SelectionReason::Relearn => session.last_field.clone(),
                    _ => None,
                };
                TurnDirective::ShowFact {
                    fact,
                    reason,
                    highlight_field,
                }
            }
            Selection::Ask { fact_id, reason } => {
                let target = lookup(&snapshot, fact_id)?;
                let question = {
                    let mut rng = self.rng();
                    build_question(
                        &mut *rng,
                        &snapshot.domain,
                        target,
                        &snapshot.facts,
                        session.last_field.as_deref(),
                    )?
                };
                next.enter(TurnPhase::AskQuestion)?;
                next.current_fact = Some(fact_id);
                next.question_count += 1;
                next.last_field = Some(question.field.clone());
                next.remember_fact(fact_id, self.config.reinforcement.exclusion_window);
                self.fact_states().mark_shown(fact_id, user_id)?;

                TurnDirective::AskQuestion {
                    question,
                    reason,
                    question_number: next.question_count,
                }
            }
        };

        let keeps_pending = match selection {
            Selection::ShowFact { reason, .. } | Selection::Ask { reason, .. } => {
                reason.keeps_pending()
            }
            Selection::NoEligibleFact => false,
        };
        if !keeps_pending {
            next.pending_fact = None;
        }

        Ok(Turn {
            directive,
            session: next,
        })
    }

    /// The learner has read the card of `fact_id`: mark it learned and quiz it
    /// next.
    pub fn acknowledge_fact(
        &self,
        domain_id: DomainId,
        user_id: &str,
        fact_id: FactId,
        session: &SessionState,
    ) -> EngineResult<SessionState> {
        if session.awaiting_ack_for() != Some(fact_id) {
            return Err(EngineError::InvalidTransition {
                from: session.phase,
                to: TurnPhase::AskQuestion,
            });
        }
        self.fact_in_domain(domain_id, fact_id)?;
        self.fact_states().mark_learned(fact_id, user_id)?;

        let mut next = session.clone();
        next.pending_fact = Some(fact_id);
        Ok(next)
    }

    /// Grades one answer, appends it to the ledger and applies the FactState
    /// transition, atomically.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_answer(
        &self,
        domain_id: DomainId,
        user_id: &str,
        fact_id: FactId,
        field_name: &str,
        chosen_index: usize,
        correct_index: usize,
        session_id: &str,
    ) -> EngineResult<AnswerOutcome> {
        let (domain, _) = self.fact_in_domain(domain_id, fact_id)?;
        if !domain.has_field(field_name) {
            return Err(EngineError::NotFound(format!(
                "field {field_name} in domain {domain_id}"
            )));
        }
        for (label, index) in [("chosen", chosen_index), ("correct", correct_index)] {
            if index >= OPTION_COUNT {
                return Err(EngineError::InvalidAnswer(format!(
                    "{label} option index {index} out of range (0..{OPTION_COUNT})"
                )));
            }
        }

        let correct = chosen_index == correct_index;
        let states = self.fact_states();
        let current = states.get_or_create(fact_id, user_id)?;
        let (next, outcome) = states.transition(&current, correct);

        let attempt = NewAttempt {
            fact_id,
            user_id: user_id.to_string(),
            field_name: field_name.to_string(),
            correct,
            timestamp: Utc::now(),
            session_id: session_id.to_string(),
        };
        let stored = self
            .store
            .commit_answer(&attempt, &next, current.version)?
            .ok_or_else(|| {
                tracing::warn!(fact_id, user_id, "answer lost a concurrent update");
                EngineError::Conflict {
                    fact_id,
                    user_id: user_id.to_string(),
                }
            })?;

        if outcome == Outcome::Demoted && current.is_learned() {
            tracing::info!(fact_id, user_id, "fact demoted to unlearned");
        }
        tracing::debug!(
            fact_id,
            user_id,
            correct,
            outcome = outcome.as_str(),
            "answer recorded"
        );

        Ok(AnswerOutcome {
            fact_id,
            field: field_name.to_string(),
            correct,
            outcome,
            chosen_index,
            correct_index,
            highlight_field: (!correct).then(|| field_name.to_string()),
            attempt_id: stored.id,
        })
    }

    /// Session state after `answer`, which must answer the current question.
    pub fn apply_answer(
        &self,
        session: &SessionState,
        answer: &AnswerOutcome,
    ) -> EngineResult<SessionState> {
        if session.asking() != Some(answer.fact_id) {
            return Err(EngineError::InvalidTransition {
                from: session.phase,
                to: TurnPhase::ShowAnswerFeedback,
            });
        }
        let mut next = session.clone();
        next.enter(TurnPhase::ShowAnswerFeedback)?;
        next.pending_fact = match answer.outcome {
            Outcome::Advance => None,
            Outcome::Retry | Outcome::Demoted => Some(answer.fact_id),
        };
        next.remember_outcome(answer.correct, self.config.recovery.streak_window);
        Ok(next)
    }

    // ==================== Progress ====================

    /// Deletes every FactState and Attempt of the user for the domain.
    pub fn reset_progress(&self, domain_id: DomainId, user_id: &str) -> EngineResult<ResetSummary> {
        if self.store.domain(domain_id)?.is_none() {
            return Err(EngineError::NotFound(format!("domain {domain_id}")));
        }
        let summary = self.store.delete_progress(user_id, domain_id)?;
        tracing::info!(
            domain_id,
            user_id,
            fact_states = summary.fact_states_deleted,
            attempts = summary.attempts_deleted,
            "progress reset"
        );
        Ok(summary)
    }

    /// An unknown domain yields an empty snapshot.
    pub fn progress_summary(
        &self,
        domain_id: DomainId,
        user_id: &str,
    ) -> EngineResult<ProgressSnapshot> {
        match self.snapshot(domain_id, user_id) {
            Ok(snapshot) => Ok(ProgressTracker::summarize(&snapshot)),
            Err(EngineError::NotFound(_)) => Ok(ProgressSnapshot::empty(domain_id)),
            Err(err) => Err(err),
        }
    }

    pub fn activity_summary(
        &self,
        domain_id: DomainId,
        user_id: &str,
    ) -> EngineResult<ActivitySummary> {
        let attempts = self.store.attempts(user_id, domain_id)?;
        Ok(ActivitySummary::from_attempts(
            &attempts,
            Utc::now().date_naive(),
        ))
    }

    fn fact_in_domain(
        &self,
        domain_id: DomainId,
        fact_id: FactId,
    ) -> EngineResult<(Domain, Fact)> {
        let domain = self
            .store
            .domain(domain_id)?
            .ok_or_else(|| EngineError::NotFound(format!("domain {domain_id}")))?;
        let fact = self
            .store
            .facts(domain_id)?
            .into_iter()
            .find(|f| f.id == fact_id)
            .ok_or_else(|| {
                EngineError::NotFound(format!("fact {fact_id} in domain {domain_id}"))
            })?;
        Ok((domain, fact))
    }
}

fn lookup(snapshot: &DomainSnapshot, fact_id: FactId) -> EngineResult<&Fact> {
    snapshot
        .fact(fact_id)
        .ok_or_else(|| EngineError::NotFound(format!("fact {fact_id}")))
}
