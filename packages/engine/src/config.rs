use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EngineError;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("mastery.required_correct ({required}) exceeds mastery.window ({window})")]
    MasteryThreshold { required: usize, window: usize },
    #[error("{field} must be within [0, 1], got {value}")]
    Ratio { field: &'static str, value: f64 },
    #[error("recovery.deactivate_ratio ({deactivate}) exceeds recovery.activate_ratio ({activate})")]
    Watermarks { activate: f64, deactivate: f64 },
    #[error("recovery.streak_wrong ({wrong}) exceeds recovery.streak_window ({window})")]
    StreakThreshold { wrong: usize, window: usize },
    #[error("invalid engine config JSON: {0}")]
    Parse(String),
}

impl From<ConfigError> for EngineError {
    fn from(err: ConfigError) -> Self {
        EngineError::Configuration(err.to_string())
    }
}

/// Mastery: at least `required_correct` of the newest `window` attempts
/// correct, newest attempt correct.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MasteryConfig {
    pub window: usize,
    pub required_correct: usize,
}

impl Default for MasteryConfig {
    fn default() -> Self {
        Self {
            window: 7,
            required_correct: 6,
        }
    }
}

/// Consecutive-answer thresholds of the FactState transition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransitionConfig {
    pub advance_after_correct: u32,
    pub demote_after_wrong: u32,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            advance_after_correct: 2,
            demote_after_wrong: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReinforcementConfig {
    /// Every `interval`-th question is drawn from mastered facts.
    pub interval: u32,
    /// Number of recently asked facts kept out of the selection pools.
    pub exclusion_window: usize,
}

impl Default for ReinforcementConfig {
    fn default() -> Self {
        Self {
            interval: 3,
            exclusion_window: 3,
        }
    }
}

/// Recovery mode ("doom loop") tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Backlog share of the domain above which recovery activates.
    pub activate_ratio: f64,
    /// Backlog share below which recovery deactivates.
    pub deactivate_ratio: f64,
    /// Backlog never triggers recovery below this absolute size.
    pub min_backlog: usize,

    pub streak_trigger_enabled: bool,
    /// Number of recent session answers inspected by the streak trigger.
    pub streak_window: usize,
    /// Wrong answers within `streak_window` that activate recovery.
    pub streak_wrong: usize,
    /// Consecutive correct answers that end a streak-triggered recovery.
    pub exit_correct_run: u32,

    /// Skip reinforcement questions while recovery is active.
    pub suppress_reinforcement: bool,
    /// Withhold never-shown facts while recovery is active.
    pub defer_new_facts: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            activate_ratio: 0.5,
            deactivate_ratio: 0.25,
            min_backlog: 3,
            streak_trigger_enabled: true,
            streak_window: 4,
            streak_wrong: 3,
            exit_correct_run: 3,
            suppress_reinforcement: true,
            defer_new_facts: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub mastery: MasteryConfig,
    pub transitions: TransitionConfig,
    pub reinforcement: ReinforcementConfig,
    pub recovery: RecoveryConfig,
}

impl EngineConfig {
    /// Parses a (possibly partial) JSON document; missing keys keep their
    /// defaults. The result is validated.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mastery.window == 0 {
            return Err(ConfigError::Zero {
                field: "mastery.window",
            });
        }
        if self.mastery.required_correct == 0 {
            return Err(ConfigError::Zero {
                field: "mastery.required_correct",
            });
        }
        if self.mastery.required_correct > self.mastery.window {
            return Err(ConfigError::MasteryThreshold {
                required: self.mastery.required_correct,
                window: self.mastery.window,
            });
        }
        if self.transitions.advance_after_correct == 0 {
            return Err(ConfigError::Zero {
                field: "transitions.advance_after_correct",
            });
        }
        if self.transitions.demote_after_wrong == 0 {
            return Err(ConfigError::Zero {
                field: "transitions.demote_after_wrong",
            });
        }
        if self.reinforcement.interval == 0 {
            return Err(ConfigError::Zero {
                field: "reinforcement.interval",
            });
        }

        let recovery = &self.recovery;
        for (field, value) in [
            ("recovery.activate_ratio", recovery.activate_ratio),
            ("recovery.deactivate_ratio", recovery.deactivate_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Ratio { field, value });
            }
        }
        if recovery.deactivate_ratio > recovery.activate_ratio {
            return Err(ConfigError::Watermarks {
                activate: recovery.activate_ratio,
                deactivate: recovery.deactivate_ratio,
            });
        }
        if recovery.streak_trigger_enabled {
            if recovery.streak_window == 0 {
                return Err(ConfigError::Zero {
                    field: "recovery.streak_window",
                });
            }
            if recovery.streak_wrong == 0 {
                return Err(ConfigError::Zero {
                    field: "recovery.streak_wrong",
                });
            }
            if recovery.streak_wrong > recovery.streak_window {
                return Err(ConfigError::StreakThreshold {
                    wrong: recovery.streak_wrong,
                    window: recovery.streak_window,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mastery.window, 7);
        assert_eq!(config.mastery.required_correct, 6);
        assert_eq!(config.reinforcement.interval, 3);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "recovery": { "activate_ratio": 0.6, "deactivate_ratio": 0.2 } }"#,
        )
        .expect("partial config should parse");

        assert_eq!(config.recovery.activate_ratio, 0.6);
        assert_eq!(config.recovery.deactivate_ratio, 0.2);
        assert_eq!(config.recovery.min_backlog, 3);
        assert_eq!(config.mastery, MasteryConfig::default());
    }

    #[test]
    fn test_inverted_watermarks_rejected() {
        let mut config = EngineConfig::default();
        config.recovery.activate_ratio = 0.2;
        config.recovery.deactivate_ratio = 0.4;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Watermarks { .. })
        ));
    }

    #[test]
    fn test_mastery_threshold_above_window_rejected() {
        let mut config = EngineConfig::default();
        config.mastery.required_correct = 8;
        assert_eq!(
            config.validate(),
            Err(ConfigError::MasteryThreshold {
                required: 8,
                window: 7
            })
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = EngineConfig::default();
        config.reinforcement.interval = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "reinforcement.interval"
            })
        );
    }

    #[test]
    fn test_bad_json_reports_parse_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
