//! Engine configuration.
//!
//! All tunables live in one [`CoreConfig`] persisted as pretty-printed JSON.
//! Every section is `#[serde(default)]`, so a config file only needs the
//! keys it overrides and a missing file means "all defaults".
//!
//! ```json
//! {
//!   "planner": { "epsilon": 1e-9, "level": "aggressive" },
//!   "sessions": { "idle_timeout_secs": 600 }
//! }
//! ```

use crate::advisor::AdvisorConfig;
use crate::error::{Error, Result, ResultExt as _};
use crate::planner::PlannerConfig;
use crate::profiler::ProfilerConfig;
use crate::session::SessionConfig;
use crate::workflow::{WorkflowConfig, WorkflowSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub profiler: ProfilerConfig,
    pub planner: PlannerConfig,
    pub advisor: AdvisorConfig,
    pub workflow: WorkflowConfig,
    pub sessions: SessionConfig,
}

impl CoreConfig {
    /// Default location: `<config_dir>/tabsmith/config.json`.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            Error::DataAccess("Failed to determine config directory".to_owned())
        })?;
        Ok(config_dir.join("tabsmith").join("config.json"))
    }

    /// Load from `path`, or from [`Self::default_path`] when none is given.
    ///
    /// A file that does not exist yields the defaults; a file that exists
    /// but does not parse or validate is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };

        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;

        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.profiler.validate()?;
        self.planner.validate()?;
        self.advisor.validate()?;
        self.workflow.validate()?;
        self.sessions.validate()
    }

    pub fn workflow_settings(&self) -> WorkflowSettings<'_> {
        WorkflowSettings {
            workflow: &self.workflow,
            profiler: &self.profiler,
            planner: &self.planner,
            advisor: &self.advisor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::OptimizationLevel;

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = CoreConfig::load(Some(&dir.path().join("absent.json")))?;
        assert_eq!(config.profiler.distinct_exact_threshold, 1_000_000);
        assert_eq!(config.sessions.idle_timeout_secs, 1800);
        Ok(())
    }

    #[test]
    fn test_save_and_load_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("config.json");

        let mut config = CoreConfig::default();
        config.planner.epsilon = 1e-9;
        config.planner.level = OptimizationLevel::Aggressive;
        config.workflow.phase_timeout_secs = 5;
        config.save(&path)?;

        let loaded = CoreConfig::load(Some(&path))?;
        assert!((loaded.planner.epsilon - 1e-9).abs() < f64::EPSILON);
        assert_eq!(loaded.planner.level, OptimizationLevel::Aggressive);
        assert_eq!(loaded.workflow.phase_timeout_secs, 5);
        Ok(())
    }

    #[test]
    fn test_partial_file_fills_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "sessions": { "idle_timeout_secs": 60 } }"#)?;

        let config = CoreConfig::load(Some(&path))?;
        assert_eq!(config.sessions.idle_timeout_secs, 60);
        assert_eq!(config.advisor.sample_rows, 10_000);
        assert_eq!(config.planner.level, OptimizationLevel::Production);
        Ok(())
    }

    #[test]
    fn test_invalid_values_rejected_on_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "planner": { "epsilon": -1.0 } }"#)?;

        let err = CoreConfig::load(Some(&path)).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        Ok(())
    }

    #[test]
    fn test_malformed_json_is_validation_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json")?;

        let err = CoreConfig::load(Some(&path)).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        assert!(err.to_string().contains("Failed to parse config"));
        Ok(())
    }
}
