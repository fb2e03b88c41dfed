//! Shared record types.
//!
//! `Domain` and `Fact` are read-only catalog data. `FactState` and `Attempt`
//! are the per-user records the engine writes; every one of them carries the
//! user id it belongs to.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type DomainId = i64;
pub type FactId = i64;

// ==================== Catalog ====================

/// A named collection of facts sharing one field schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: DomainId,
    pub name: String,
    /// Field names in display order. The first one identifies a fact.
    pub fields: Vec<String>,
}

impl Domain {
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// The field used to name a fact (usually "name").
    pub fn identifying_field(&self) -> Option<&str> {
        self.fields.first().map(String::as_str)
    }
}

/// One record of a domain: field name -> value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub id: FactId,
    pub domain_id: DomainId,
    pub values: BTreeMap<String, String>,
}

impl Fact {
    pub fn value(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

// ==================== Per-user records ====================

/// Learning progress of one user on one fact.
///
/// `learned_at == None` means unlearned, and then both counters are zero.
/// `version` increases on every write and backs the optimistic check done
/// by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactState {
    pub fact_id: FactId,
    pub user_id: String,
    pub learned_at: Option<DateTime<Utc>>,
    pub last_shown_at: Option<DateTime<Utc>>,
    pub consecutive_correct: u32,
    pub consecutive_wrong: u32,
    pub version: i64,
}

impl FactState {
    /// A fresh, zeroed record (never shown, unlearned).
    pub fn new(fact_id: FactId, user_id: impl Into<String>) -> Self {
        Self {
            fact_id,
            user_id: user_id.into(),
            learned_at: None,
            last_shown_at: None,
            consecutive_correct: 0,
            consecutive_wrong: 0,
            version: 0,
        }
    }

    pub fn is_learned(&self) -> bool {
        self.learned_at.is_some()
    }

    pub fn was_shown(&self) -> bool {
        self.last_shown_at.is_some()
    }
}

/// One answered question, as stored in the ledger.
///
/// `id` is the insertion sequence and breaks timestamp ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub fact_id: FactId,
    pub user_id: String,
    pub field_name: String,
    pub correct: bool,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

/// An attempt about to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttempt {
    pub fact_id: FactId,
    pub user_id: String,
    pub field_name: String,
    pub correct: bool,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
}

impl NewAttempt {
    pub fn into_attempt(self, id: i64) -> Attempt {
        Attempt {
            id,
            fact_id: self.fact_id,
            user_id: self.user_id,
            field_name: self.field_name,
            correct: self.correct,
            timestamp: self.timestamp,
            session_id: self.session_id,
        }
    }
}

/// Derived learning state of a fact for a user. Computed, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningState {
    Unlearned,
    Learned,
    Mastered,
}

impl LearningState {
    pub const fn as_str(self) -> &'static str {
        match self {
            LearningState::Unlearned => "unlearned",
            LearningState::Learned => "learned",
            LearningState::Mastered => "mastered",
        }
    }
}

/// Ledger aggregates for one fact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStats {
    pub total: u32,
    pub correct: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Rows removed by a (domain, user) reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    pub fact_states_deleted: usize,
    pub attempts_deleted: usize,
}
