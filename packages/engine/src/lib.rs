//! # Rememberizer engine
//!
//! Per-user adaptive fact learning: which fact to present next, in what form,
//! how to grade the answer and how the fact's memorization state evolves.
//!
//! Components, leaf first:
//!
//! - attempt ledger: append-only, behind [`LearningStore`]
//! - [`FactStateStore`]: learned flag and consecutive-answer counters
//! - [`MasteryEvaluator`]: mastery derived from the ledger, never stored
//! - [`build_question`]: multiple-choice questions with sibling distractors
//! - [`FactSelector`]: priority rules for the next fact
//! - [`RecoveryModeDetector`]: backlog consolidation ("doom loop")
//! - [`ProgressTracker`]: per-domain counts and progress symbols
//!
//! [`LearningEngine`] ties them together. Storage is a collaborator:
//! [`InMemoryStore`] here, SQLite in `rememberizer-storage`.
//!
//! ```
//! use rememberizer_engine::{EngineConfig, InMemoryStore, LearningEngine, TurnDirective};
//!
//! let store = InMemoryStore::new();
//! let domain_id = store.add_domain_with_rows(
//!     "Planets",
//!     &["name", "order"],
//!     &[&["Mercury", "1"], &["Venus", "2"], &["Earth", "3"], &["Mars", "4"]],
//! );
//! let engine = LearningEngine::with_seed(store, EngineConfig::default(), 7).unwrap();
//! let session = engine.start_session(domain_id, "user-1").unwrap();
//! let turn = engine.next_turn(domain_id, "user-1", &session).unwrap();
//! assert!(matches!(turn.directive, TurnDirective::ShowFact { .. }));
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fact_state;
pub mod mastery;
pub mod memory;
pub mod progress;
pub mod question;
pub mod recovery;
pub mod selector;
pub mod session;
pub mod snapshot;
pub mod store;
pub mod types;

pub use config::{
    ConfigError, EngineConfig, MasteryConfig, RecoveryConfig, ReinforcementConfig,
    TransitionConfig,
};
pub use engine::{AnswerOutcome, LearningEngine, Turn, TurnDirective};
pub use error::{EngineError, EngineResult};
pub use fact_state::{apply_outcome, FactStateStore, Outcome};
pub use mastery::MasteryEvaluator;
pub use memory::InMemoryStore;
pub use progress::{ActivitySummary, FactProgress, ProgressSnapshot, ProgressTracker};
pub use question::{build_question, Cue, Question, MIN_DOMAIN_FACTS, OPTION_COUNT};
pub use recovery::{BacklogCounts, RecoveryModeDetector, RecoveryStatus};
pub use selector::{FactSelector, Selection, SelectionReason};
pub use session::{SessionState, TurnPhase};
pub use snapshot::{DomainSnapshot, FactView};
pub use store::{LearningStore, StoreError, StoreResult};
pub use types::{
    Attempt, AttemptStats, Domain, DomainId, Fact, FactId, FactState, LearningState, NewAttempt,
    ResetSummary,
};
