//! Planner configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreResult;
use crate::exports::exports_path;

/// Default directory holding the export table and run logs.
pub const DEFAULT_STATE_DIR: &str = ".stratus";

/// Configuration for provisioning runs.
///
/// Can be loaded from a TOML file:
///
/// ```toml
/// state_dir = ".stratus"
/// persist = true
/// run_label = "skillshift-dev"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Directory holding the export table and run logs
    pub state_dir: PathBuf,
    /// Whether exports and run logs are written to disk
    pub persist: bool,
    /// Optional label recorded in run logs
    pub run_label: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(DEFAULT_STATE_DIR),
            persist: true,
            run_label: None,
        }
    }
}

impl PlannerConfig {
    /// In-memory configuration that never touches disk.
    pub fn ephemeral() -> Self {
        Self {
            persist: false,
            ..Self::default()
        }
    }

    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    pub fn with_run_label(mut self, label: impl Into<String>) -> Self {
        self.run_label = Some(label.into());
        self
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        debug!("Reading planner config from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> CoreResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn exports_path(&self) -> PathBuf {
        exports_path(&self.state_dir)
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.state_dir.join("runs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn test_config_defaults() {
        let config = PlannerConfig::default();
        assert!(config.persist);
        assert_eq!(config.exports_path(), PathBuf::from(".stratus/exports.json"));
        assert_eq!(config.runs_dir(), PathBuf::from(".stratus/runs"));
        assert!(!PlannerConfig::ephemeral().persist);
    }

    #[test]
    fn test_config_from_toml() {
        let config = PlannerConfig::from_toml(
            r#"
state_dir = "/tmp/stratus"
run_label = "skillshift-dev"
"#,
        )
        .unwrap();

        assert_eq!(config.state_dir, PathBuf::from("/tmp/stratus"));
        assert!(config.persist);
        assert_eq!(config.run_label.as_deref(), Some("skillshift-dev"));
    }

    #[test]
    fn test_config_invalid_toml() {
        let err = PlannerConfig::from_toml("persist = \"maybe\"").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }
}
