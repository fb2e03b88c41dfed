//! Per-domain progress aggregates.

use std::collections::{BTreeSet, HashSet};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::snapshot::{DomainSnapshot, FactView};
use crate::types::{Attempt, DomainId, FactId, LearningState};

pub const SYMBOL_NEVER_SHOWN: char = '·';
pub const SYMBOL_SHOWN: char = '-';
pub const SYMBOL_LEARNED: char = '+';
pub const SYMBOL_MASTERED: char = '*';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactProgress {
    pub fact_id: FactId,
    pub state: LearningState,
    pub seen: bool,
}

impl FactProgress {
    pub fn symbol(&self) -> char {
        match self.state {
            LearningState::Mastered => SYMBOL_MASTERED,
            LearningState::Learned => SYMBOL_LEARNED,
            LearningState::Unlearned if self.seen => SYMBOL_SHOWN,
            LearningState::Unlearned => SYMBOL_NEVER_SHOWN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub domain_id: DomainId,
    pub total: usize,
    /// Learned facts, mastered ones included.
    pub learned: usize,
    pub mastered: usize,
    pub unlearned: usize,
    /// One symbol per fact in fact id order.
    pub symbols: String,
    pub facts: Vec<FactProgress>,
}

impl ProgressSnapshot {
    pub fn empty(domain_id: DomainId) -> Self {
        Self {
            domain_id,
            total: 0,
            learned: 0,
            mastered: 0,
            unlearned: 0,
            symbols: String::new(),
            facts: Vec::new(),
        }
    }
}

pub struct ProgressTracker;

impl ProgressTracker {
    pub fn summarize(snapshot: &DomainSnapshot) -> ProgressSnapshot {
        let facts: Vec<FactProgress> = snapshot.views.iter().map(fact_progress).collect();
        let count = |state: LearningState| facts.iter().filter(|f| f.state == state).count();
        let mastered = count(LearningState::Mastered);
        let learned = count(LearningState::Learned) + mastered;

        ProgressSnapshot {
            domain_id: snapshot.domain.id,
            total: facts.len(),
            learned,
            mastered,
            unlearned: facts.len() - learned,
            symbols: facts.iter().map(FactProgress::symbol).collect(),
            facts,
        }
    }
}

fn fact_progress(view: &FactView) -> FactProgress {
    FactProgress {
        fact_id: view.fact_id,
        state: view.state(),
        seen: view.was_shown(),
    }
}

/// Practice activity derived from the attempt ledger of one (domain, user).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub total_attempts: usize,
    pub correct_attempts: usize,
    pub sessions: usize,
    /// First to last attempt, whole minutes.
    pub minutes_spent: i64,
    pub attempts_today: usize,
    /// Consecutive practice days ending today, or yesterday when today has
    /// no practice yet.
    pub current_streak: u32,
    pub longest_streak: u32,
    /// Practiced yesterday, not yet today.
    pub streak_at_risk: bool,
}

impl ActivitySummary {
    /// `attempts` may come in any order. Days are UTC calendar days.
    pub fn from_attempts(attempts: &[Attempt], today: NaiveDate) -> Self {
        if attempts.is_empty() {
            return Self::default();
        }

        let sessions: HashSet<&str> = attempts.iter().map(|a| a.session_id.as_str()).collect();
        let days: BTreeSet<NaiveDate> = attempts.iter().map(|a| a.timestamp.date_naive()).collect();
        let first = attempts.iter().map(|a| a.timestamp).min();
        let last = attempts.iter().map(|a| a.timestamp).max();
        let minutes_spent = match (first, last) {
            (Some(first), Some(last)) => (last - first).num_minutes(),
            _ => 0,
        };

        let mut longest = 0u32;
        let mut run = 0u32;
        let mut previous: Option<NaiveDate> = None;
        for day in &days {
            run = match previous {
                Some(p) if *day - p == Duration::days(1) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            previous = Some(*day);
        }

        let yesterday = today - Duration::days(1);
        let anchor = if days.contains(&today) {
            Some(today)
        } else if days.contains(&yesterday) {
            Some(yesterday)
        } else {
            None
        };
        let mut current = 0u32;
        if let Some(mut day) = anchor {
            while days.contains(&day) {
                current += 1;
                day -= Duration::days(1);
            }
        }

        Self {
            total_attempts: attempts.len(),
            correct_attempts: attempts.iter().filter(|a| a.correct).count(),
            sessions: sessions.len(),
            minutes_spent,
            attempts_today: attempts
                .iter()
                .filter(|a| a.timestamp.date_naive() == today)
                .count(),
            current_streak: current,
            longest_streak: longest,
            streak_at_risk: anchor == Some(yesterday),
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.correct_attempts as f64 / self.total_attempts as f64
    }
}
