//! Runner configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use casepilot_common::Error;

use crate::error::RunnerResult;

/// Runner configuration, usually read from `casepilot.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// External generation/execution engine
    pub engine: EngineConfig,

    /// Marker file created on stop requests. Relative paths resolve against
    /// the engine working directory.
    pub stop_sentinel: PathBuf,

    /// Grace period between terminate and kill
    pub stop_timeout_secs: u64,

    /// Status polling cadence for interactive callers
    pub poll_interval_ms: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            stop_sentinel: PathBuf::from("stop.txt"),
            stop_timeout_secs: 5,
            poll_interval_ms: 500,
        }
    }
}

/// How to launch the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable to run
    pub program: String,

    /// Arguments passed to the executable
    pub args: Vec<String>,

    /// Working directory (defaults to the current directory)
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables, e.g. model API keys
    pub env: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "node".to_string(),
            args: vec!["generate_and_runall.js".to_string()],
            working_dir: None,
            env: BTreeMap::new(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from file, falling back to defaults when the file
    /// does not exist
    pub fn load(path: &Path) -> RunnerResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject settings the runner cannot work with
    pub fn validate(&self) -> RunnerResult<()> {
        let invalid = |reason: &str| -> RunnerResult<()> {
            Err(Error::InvalidConfig(reason.to_string()).into())
        };

        if self.engine.program.trim().is_empty() {
            return invalid("engine.program must not be empty");
        }
        if self.stop_timeout_secs == 0 {
            return invalid("stop_timeout_secs must be at least 1");
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be at least 1");
        }
        Ok(())
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Absolute location of the stop sentinel
    pub fn sentinel_path(&self) -> PathBuf {
        if self.stop_sentinel.is_absolute() {
            return self.stop_sentinel.clone();
        }
        match &self.engine.working_dir {
            Some(dir) => dir.join(&self.stop_sentinel),
            None => self.stop_sentinel.clone(),
        }
    }
}
