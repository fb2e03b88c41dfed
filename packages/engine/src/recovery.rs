//! Recovery mode ("doom loop") detection.
//!
//! Two independent triggers, each with hysteresis:
//!
//! - **backlog**: too many facts are learned but not mastered relative to the
//!   domain size. Turns on above `activate_ratio`, off below
//!   `deactivate_ratio`, keeps its previous value in between.
//! - **streak**: the session is failing (`streak_wrong` of the last
//!   `streak_window` answers wrong). Turns off after `exit_correct_run`
//!   consecutive correct answers.
//!
//! Recovery is active while either trigger is on.

use serde::{Deserialize, Serialize};

use crate::config::RecoveryConfig;

/// Fact counts of one domain for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogCounts {
    pub domain_size: usize,
    /// Learned facts, mastered ones included.
    pub learned: usize,
    pub mastered: usize,
}

impl BacklogCounts {
    /// Learned but not mastered.
    pub fn backlog(&self) -> usize {
        self.learned.saturating_sub(self.mastered)
    }

    pub fn backlog_ratio(&self) -> f64 {
        if self.domain_size == 0 {
            return 0.0;
        }
        self.backlog() as f64 / self.domain_size as f64
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryStatus {
    pub backlog: bool,
    pub streak: bool,
}

impl RecoveryStatus {
    pub fn is_active(&self) -> bool {
        self.backlog || self.streak
    }
}

pub struct RecoveryModeDetector<'a> {
    config: &'a RecoveryConfig,
}

impl<'a> RecoveryModeDetector<'a> {
    pub fn new(config: &'a RecoveryConfig) -> Self {
        Self { config }
    }

    pub fn backlog_active(&self, counts: &BacklogCounts, was_active: bool) -> bool {
        if counts.domain_size == 0 {
            return false;
        }
        let ratio = counts.backlog_ratio();
        if was_active {
            ratio >= self.config.deactivate_ratio
        } else {
            counts.backlog() >= self.config.min_backlog && ratio > self.config.activate_ratio
        }
    }

    /// `recent_outcomes` holds the session's latest answers, oldest first;
    /// `correct_run` counts the trailing consecutive correct answers.
    pub fn streak_active(&self, recent_outcomes: &[bool], correct_run: u32, was_active: bool) -> bool {
        if !self.config.streak_trigger_enabled {
            return false;
        }
        if was_active {
            return correct_run < self.config.exit_correct_run;
        }
        if recent_outcomes.len() < self.config.streak_window {
            return false;
        }
        let start = recent_outcomes.len() - self.config.streak_window;
        let wrong = recent_outcomes[start..].iter().filter(|c| !**c).count();
        wrong >= self.config.streak_wrong
    }

    pub fn evaluate(
        &self,
        counts: &BacklogCounts,
        previous: &RecoveryStatus,
        recent_outcomes: &[bool],
        correct_run: u32,
    ) -> RecoveryStatus {
        RecoveryStatus {
            backlog: self.backlog_active(counts, previous.backlog),
            streak: self.streak_active(recent_outcomes, correct_run, previous.streak),
        }
    }

    pub fn reinforcement_allowed(&self, status: &RecoveryStatus) -> bool {
        !(status.is_active() && self.config.suppress_reinforcement)
    }

    pub fn new_facts_allowed(&self, status: &RecoveryStatus) -> bool {
        !(status.is_active() && self.config.defer_new_facts)
    }
}
