//! Pipeline configuration.
//!
//! Loaded from a TOML file (every field optional) and then overridden by
//! `FLUFF_*` environment variables.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::record::TaskIndex;

/// Errors from loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Records submitted at or before this instant are discarded (beta period).
    pub excluded_before: DateTime<Utc>,
    /// Task every valid record must answer; tallied and used for kappa.
    pub primary_task: TaskIndex,
    /// Follow-up task, tallied only among records matching `secondary_condition`.
    pub secondary_task: TaskIndex,
    /// Primary answer required before the secondary task is tallied.
    pub secondary_condition: String,
    /// Answers reported per object for the primary task.
    pub primary_answers: Vec<String>,
    /// Answers reported per object for the secondary task (plus `None`).
    pub secondary_answers: Vec<String>,
    /// If set, only records from users with at least this many valid
    /// records are aggregated.
    pub power_user_threshold: Option<usize>,
    /// If set, only objects with strictly more primary votes are reported,
    /// in both the primary and the secondary tallies.
    pub min_votes: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            excluded_before: end_of_beta(),
            primary_task: TaskIndex::PRIMARY,
            secondary_task: TaskIndex::SECONDARY,
            secondary_condition: "Galaxy".to_string(),
            primary_answers: vec![
                "Galaxy".to_string(),
                "Group of objects (Cluster)".to_string(),
                "Something else/empty center".to_string(),
            ],
            secondary_answers: vec!["Fluffy".to_string(), "Bright".to_string()],
            power_user_threshold: None,
            min_votes: None,
        }
    }
}

/// Start of the public launch; earlier classifications came from beta testers.
fn end_of_beta() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 10, 20, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

impl PipelineConfig {
    /// Parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `FLUFF_EXCLUDED_BEFORE`, `FLUFF_POWER_USER_THRESHOLD` and
    /// `FLUFF_MIN_VOTES` on top of the current values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|var| std::env::var(var).ok())
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        const EXCLUDED_BEFORE: &str = "FLUFF_EXCLUDED_BEFORE";
        const THRESHOLD: &str = "FLUFF_POWER_USER_THRESHOLD";
        const MIN_VOTES: &str = "FLUFF_MIN_VOTES";

        if let Some(value) = lookup(EXCLUDED_BEFORE) {
            self.excluded_before = DateTime::parse_from_rfc3339(&value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| ConfigError::InvalidEnv {
                    var: EXCLUDED_BEFORE,
                    value,
                })?;
        }
        if let Some(value) = lookup(THRESHOLD) {
            self.power_user_threshold = Some(parse_count(THRESHOLD, value)?);
        }
        if let Some(value) = lookup(MIN_VOTES) {
            self.min_votes = Some(parse_count(MIN_VOTES, value)?);
        }
        Ok(())
    }
}

fn parse_count(var: &'static str, value: String) -> Result<usize, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.excluded_before.to_rfc3339(), "2020-10-20T00:00:00+00:00");
        assert_eq!(config.primary_task, TaskIndex(0));
        assert_eq!(config.secondary_condition, "Galaxy");
        assert_eq!(config.primary_answers.len(), 3);
        assert!(config.power_user_threshold.is_none());
    }

    #[test]
    fn test_load_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
excluded_before = "2021-01-01T00:00:00Z"
secondary_task = "T2"
power_user_threshold = 10
"#
        )
        .unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.excluded_before.to_rfc3339(), "2021-01-01T00:00:00+00:00");
        assert_eq!(config.secondary_task, TaskIndex(2));
        assert_eq!(config.power_user_threshold, Some(10));
        assert_eq!(config.secondary_answers, vec!["Fluffy", "Bright"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PipelineConfig::load("/nonexistent/fluff.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FLUFF_POWER_USER_THRESHOLD", "5"),
            ("FLUFF_EXCLUDED_BEFORE", "2020-12-01T00:00:00Z"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_vars(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.power_user_threshold, Some(5));
        assert_eq!(config.excluded_before.to_rfc3339(), "2020-12-01T00:00:00+00:00");
        assert_eq!(config.min_votes, None);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut config = PipelineConfig::default();
        let err = config
            .apply_vars(|k| (k == "FLUFF_MIN_VOTES").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { var: "FLUFF_MIN_VOTES", .. }));
    }
}
