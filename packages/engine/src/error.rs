use thiserror::Error;

use crate::session::TurnPhase;
use crate::store::StoreError;
use crate::types::FactId;

/// Errors surfaced by engine operations.
///
/// Running out of facts to ask is not an error; see
/// [`TurnDirective::NoEligibleFact`](crate::TurnDirective::NoEligibleFact).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The domain cannot be practiced (too few facts or distractor values),
    /// or the engine configuration is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Another request changed the fact state between read and write.
    #[error("concurrent update of fact {fact_id} for user {user_id}")]
    Conflict { fact_id: FactId, user_id: String },

    #[error("invalid session transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: Option<TurnPhase>,
        to: TurnPhase,
    },

    #[error("invalid answer: {0}")]
    InvalidAnswer(String),
}

impl EngineError {
    /// Conflicts and storage failures. The engine never retries these.
    pub fn is_storage_related(&self) -> bool {
        matches!(self, EngineError::Storage(_) | EngineError::Conflict { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
