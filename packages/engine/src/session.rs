//! Caller-managed practice session state.
//!
//! `SessionState` is a plain value: the engine reads one and hands back the
//! next one, it never keeps sessions itself. Callers usually keep it in their
//! request session (it is serde-serializable).
//!
//! Phases of a turn:
//!
//! ```text
//!  start ──> ShowUnlearnedFact ──> AwaitLearnedAck ──ack──> AskQuestion
//!    │                                    ^                   │    ^
//!    └────────────────────────────────────┼───────────────────┘    │
//!                                         │                        v
//!                                         └──────────── ShowAnswerFeedback
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::recovery::RecoveryStatus;
use crate::types::{DomainId, FactId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TurnPhase {
    ShowUnlearnedFact,
    AwaitLearnedAck,
    AskQuestion,
    ShowAnswerFeedback,
}

impl TurnPhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            TurnPhase::ShowUnlearnedFact => "SHOW_UNLEARNED_FACT",
            TurnPhase::AwaitLearnedAck => "AWAIT_LEARNED_ACK",
            TurnPhase::AskQuestion => "ASK_QUESTION",
            TurnPhase::ShowAnswerFeedback => "SHOW_ANSWER_FEEDBACK",
        }
    }

    /// Allowed moves; `from == None` is a fresh session.
    pub fn can_transition(from: Option<TurnPhase>, to: TurnPhase) -> bool {
        use TurnPhase::*;
        matches!(
            (from, to),
            (None, ShowUnlearnedFact)
                | (None, AskQuestion)
                | (Some(ShowUnlearnedFact), AwaitLearnedAck)
                | (Some(AwaitLearnedAck), AskQuestion)
                | (Some(AwaitLearnedAck), ShowUnlearnedFact)
                | (Some(AskQuestion), ShowAnswerFeedback)
                | (Some(AskQuestion), AskQuestion)
                | (Some(AskQuestion), ShowUnlearnedFact)
                | (Some(ShowAnswerFeedback), AskQuestion)
                | (Some(ShowAnswerFeedback), ShowUnlearnedFact)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// Opaque token shared by every attempt of the session.
    pub session_id: String,
    pub domain_id: DomainId,
    pub phase: Option<TurnPhase>,
    /// Fact of the current card or question.
    pub current_fact: Option<FactId>,
    /// Fact to quiz (or re-show) before anything else.
    pub pending_fact: Option<FactId>,
    /// Field asked by the previous question.
    pub last_field: Option<String>,
    /// Recently asked facts, oldest first.
    pub recent_facts: VecDeque<FactId>,
    /// Questions asked so far in this session.
    pub question_count: u32,
    /// Latest answers of the session, oldest first.
    pub recent_outcomes: VecDeque<bool>,
    /// Trailing consecutive correct answers in the session.
    pub correct_run: u32,
    pub recovery: RecoveryStatus,
}

impl SessionState {
    pub fn new(domain_id: DomainId, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            domain_id,
            phase: None,
            current_fact: None,
            pending_fact: None,
            last_field: None,
            recent_facts: VecDeque::new(),
            question_count: 0,
            recent_outcomes: VecDeque::new(),
            correct_run: 0,
            recovery: RecoveryStatus::default(),
        }
    }

    pub fn is_recently_asked(&self, fact_id: FactId) -> bool {
        self.recent_facts.contains(&fact_id)
    }

    pub fn awaiting_ack_for(&self) -> Option<FactId> {
        match self.phase {
            Some(TurnPhase::AwaitLearnedAck) => self.current_fact,
            _ => None,
        }
    }

    pub fn asking(&self) -> Option<FactId> {
        match self.phase {
            Some(TurnPhase::AskQuestion) => self.current_fact,
            _ => None,
        }
    }

    /// Moves to `to`, rejecting moves the turn protocol does not allow.
    pub(crate) fn enter(&mut self, to: TurnPhase) -> EngineResult<()> {
        if !TurnPhase::can_transition(self.phase, to) {
            return Err(EngineError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        self.phase = Some(to);
        Ok(())
    }

    pub(crate) fn remember_fact(&mut self, fact_id: FactId, window: usize) {
        self.recent_facts.push_back(fact_id);
        while self.recent_facts.len() > window {
            self.recent_facts.pop_front();
        }
    }

    pub(crate) fn remember_outcome(&mut self, correct: bool, window: usize) {
        self.recent_outcomes.push_back(correct);
        while self.recent_outcomes.len() > window {
            self.recent_outcomes.pop_front();
        }
        self.correct_run = if correct { self.correct_run + 1 } else { 0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_session_can_show_or_ask() {
        assert!(TurnPhase::can_transition(None, TurnPhase::ShowUnlearnedFact));
        assert!(TurnPhase::can_transition(None, TurnPhase::AskQuestion));
        assert!(!TurnPhase::can_transition(None, TurnPhase::ShowAnswerFeedback));
        assert!(!TurnPhase::can_transition(None, TurnPhase::AwaitLearnedAck));
    }

    #[test]
    fn test_feedback_only_after_question() {
        assert!(TurnPhase::can_transition(
            Some(TurnPhase::AskQuestion),
            TurnPhase::ShowAnswerFeedback
        ));
        assert!(!TurnPhase::can_transition(
            Some(TurnPhase::AwaitLearnedAck),
            TurnPhase::ShowAnswerFeedback
        ));
    }

    #[test]
    fn test_enter_rejects_invalid_move() {
        let mut session = SessionState::new(1, "s-1");
        let err = session.enter(TurnPhase::ShowAnswerFeedback).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition {
                from: None,
                to: TurnPhase::ShowAnswerFeedback
            }
        ));
        assert!(session.phase.is_none());
    }

    #[test]
    fn test_windows_are_bounded() {
        let mut session = SessionState::new(1, "s-1");
        for fact_id in 1..=5 {
            session.remember_fact(fact_id, 3);
        }
        assert_eq!(session.recent_facts, VecDeque::from(vec![3, 4, 5]));

        session.remember_outcome(true, 2);
        session.remember_outcome(true, 2);
        session.remember_outcome(false, 2);
        assert_eq!(session.recent_outcomes, VecDeque::from(vec![true, false]));
        assert_eq!(session.correct_run, 0);
    }

    #[test]
    fn test_session_serializes() {
        let session = SessionState::new(3, "s-9");
        let json = serde_json::to_string(&session).expect("serialize");
        let back: SessionState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, session);
    }
}
