use std::path::PathBuf;

use anyhow::{Context, Result};

use rememberizer_engine::EngineConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub log_level: String,
    /// Set when ENABLE_FILE_LOGS is on; LOG_DIR or `./logs`.
    pub log_dir: Option<PathBuf>,
    /// Optional JSON file with a (partial) `EngineConfig`.
    pub engine_config_path: Option<PathBuf>,
    pub recovery_activate_ratio: Option<f64>,
    pub recovery_deactivate_ratio: Option<f64>,
    pub reinforcement_interval: Option<u32>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup("DATABASE_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./rememberizer.db"));

        let log_level = lookup("RUST_LOG").unwrap_or_else(|| "info".to_string());

        let file_logs = lookup("ENABLE_FILE_LOGS")
            .map(|value| value == "true" || value == "1")
            .unwrap_or(false);
        let log_dir = file_logs.then(|| {
            lookup("LOG_DIR")
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./logs"))
        });

        let engine_config_path = lookup("ENGINE_CONFIG")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Self {
            database_path,
            log_level,
            log_dir,
            engine_config_path,
            recovery_activate_ratio: lookup("RECOVERY_ACTIVATE_RATIO")
                .and_then(|value| value.parse::<f64>().ok()),
            recovery_deactivate_ratio: lookup("RECOVERY_DEACTIVATE_RATIO")
                .and_then(|value| value.parse::<f64>().ok()),
            reinforcement_interval: lookup("REINFORCEMENT_INTERVAL")
                .and_then(|value| value.parse::<u32>().ok()),
        }
    }

    /// Engine tunables: defaults, then the JSON file, then single-value
    /// overrides. The result is validated.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.engine_config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading engine config {}", path.display()))?;
                EngineConfig::from_json_str(&raw)
                    .with_context(|| format!("parsing engine config {}", path.display()))?
            }
            None => EngineConfig::default(),
        };

        if let Some(ratio) = self.recovery_activate_ratio {
            config.recovery.activate_ratio = ratio;
        }
        if let Some(ratio) = self.recovery_deactivate_ratio {
            config.recovery.deactivate_ratio = ratio;
        }
        if let Some(interval) = self.reinforcement_interval {
            config.reinforcement.interval = interval;
        }

        config.validate().context("invalid engine config")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.database_path, PathBuf::from("./rememberizer.db"));
        assert_eq!(config.log_level, "info");
        assert!(config.engine_config_path.is_none());
        assert!(config.log_dir.is_none());
        assert_eq!(
            config.engine_config().expect("Failed to build engine config"),
            EngineConfig::default()
        );
    }

    #[test]
    fn test_overrides_applied() {
        let config = config_from(&[
            ("DATABASE_PATH", "/tmp/facts.db"),
            ("RECOVERY_ACTIVATE_RATIO", "0.6"),
            ("RECOVERY_DEACTIVATE_RATIO", "0.3"),
            ("REINFORCEMENT_INTERVAL", "4"),
        ]);
        assert_eq!(config.database_path, PathBuf::from("/tmp/facts.db"));

        let engine = config.engine_config().expect("Failed to build engine config");
        assert_eq!(engine.recovery.activate_ratio, 0.6);
        assert_eq!(engine.recovery.deactivate_ratio, 0.3);
        assert_eq!(engine.reinforcement.interval, 4);
    }

    #[test]
    fn test_file_logs_directory() {
        let config = config_from(&[("ENABLE_FILE_LOGS", "1")]);
        assert_eq!(config.log_dir, Some(PathBuf::from("./logs")));

        let config = config_from(&[("ENABLE_FILE_LOGS", "true"), ("LOG_DIR", "/var/log/facts")]);
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/facts")));

        let config = config_from(&[("LOG_DIR", "/var/log/facts")]);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_unparsable_override_ignored() {
        let config = config_from(&[("REINFORCEMENT_INTERVAL", "often")]);
        assert!(config.reinforcement_interval.is_none());
    }

    #[test]
    fn test_invalid_override_rejected() {
        let config = config_from(&[("REINFORCEMENT_INTERVAL", "0")]);
        assert!(config.engine_config().is_err());
    }

    #[test]
    fn test_engine_config_file_then_overrides() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        write!(file, r#"{{ "mastery": {{ "window": 5, "required_correct": 4 }} }}"#)
            .expect("Failed to write config");
        let path = file.path().to_string_lossy().to_string();

        let config = config_from(&[("ENGINE_CONFIG", path.as_str()), ("REINFORCEMENT_INTERVAL", "5")]);
        let engine = config.engine_config().expect("Failed to build engine config");
        assert_eq!(engine.mastery.window, 5);
        assert_eq!(engine.mastery.required_correct, 4);
        assert_eq!(engine.reinforcement.interval, 5);
    }
}
