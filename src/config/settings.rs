//! Executor tuning knobs: retry bound, backoff base, short-class deadline.
//!
//! Read from the environment (`MAX_RETRIES`, `BASE_BACKOFF_DELAY_MS`,
//! `TASK_TIMEOUT_MS`, `MAX_BACKOFF_DELAY_MS`) or from the `[executor]` table
//! of a TOML settings file.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use super::numeric_var;

pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_BASE_BACKOFF_DELAY_MS: u64 = 1000;
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Maximum external calls per dispatch. Must be >= 1.
    pub max_retries: u32,
    /// First backoff delay; doubles after every failed attempt.
    pub base_backoff_delay: Duration,
    /// Deadline for the whole retry sequence of a short task.
    pub task_timeout: Duration,
    /// Optional ceiling on a single backoff delay. `None` keeps strict doubling.
    pub max_backoff_delay: Option<Duration>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff_delay: Duration::from_millis(DEFAULT_BASE_BACKOFF_DELAY_MS),
            task_timeout: Duration::from_millis(DEFAULT_TASK_TIMEOUT_MS),
            max_backoff_delay: None,
        }
    }
}

/// Top-level TOML wrapper.
#[derive(Debug, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    executor: RawSettings,
}

#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    max_retries: Option<u32>,
    base_backoff_delay_ms: Option<u64>,
    task_timeout_ms: Option<u64>,
    max_backoff_delay_ms: Option<u64>,
}

impl RawSettings {
    fn into_settings(self) -> Result<ExecutorSettings> {
        let defaults = ExecutorSettings::default();
        let settings = ExecutorSettings {
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            base_backoff_delay: self
                .base_backoff_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_backoff_delay),
            task_timeout: self
                .task_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.task_timeout),
            max_backoff_delay: self.max_backoff_delay_ms.map(Duration::from_millis),
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl ExecutorSettings {
    /// Load from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let max_retries = numeric_var("MAX_RETRIES")?
            .map(|n| {
                u32::try_from(n).map_err(|_| Error::Config(format!("MAX_RETRIES too large: {n}")))
            })
            .transpose()?;

        RawSettings {
            max_retries,
            base_backoff_delay_ms: numeric_var("BASE_BACKOFF_DELAY_MS")?,
            task_timeout_ms: numeric_var("TASK_TIMEOUT_MS")?,
            max_backoff_delay_ms: numeric_var("MAX_BACKOFF_DELAY_MS")?,
        }
        .into_settings()
    }

    /// Load from the `[executor]` table of a TOML file. Missing keys take defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: SettingsFile = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("bad settings file {}: {e}", path.display())))?;
        file.executor.into_settings()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: SettingsFile =
            toml::from_str(content).map_err(|e| Error::Config(format!("bad settings: {e}")))?;
        file.executor.into_settings()
    }

    /// Reject values the executor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::Config("max_retries must be at least 1".to_string()));
        }
        if self.task_timeout.is_zero() {
            return Err(Error::Config("task_timeout must be non-zero".to_string()));
        }
        if let Some(cap) = self.max_backoff_delay
            && cap < self.base_backoff_delay
        {
            return Err(Error::Config(format!(
                "max_backoff_delay ({}ms) is below base_backoff_delay ({}ms)",
                cap.as_millis(),
                self.base_backoff_delay.as_millis()
            )));
        }
        Ok(())
    }
}
