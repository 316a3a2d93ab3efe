//! Runner configuration
//!
//! Settings that shape how stages invoke the runtime, independent of any
//! single pipeline run.

use std::path::{Component, PathBuf};
use std::time::Duration;

/// Default interpreter location inside a freshly created environment
pub const DEFAULT_INTERPRETER: &str = "bin/python";

/// Runner configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Interpreter path relative to the environment root
    pub interpreter: PathBuf,

    /// Maximum time a single process stage may run before it is killed.
    /// `None` waits indefinitely.
    pub stage_timeout: Option<Duration>,
}

impl RunnerConfig {
    /// Creates a configuration with defaults
    pub fn new() -> Self {
        Self {
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            stage_timeout: None,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Recognized environment variables:
    /// - ISORUN_INTERPRETER (optional, default: bin/python)
    /// - ISORUN_STAGE_TIMEOUT (optional, seconds, default: none)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let interpreter = lookup("ISORUN_INTERPRETER")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INTERPRETER));

        let stage_timeout = match lookup("ISORUN_STAGE_TIMEOUT") {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|_| {
                    anyhow::anyhow!("ISORUN_STAGE_TIMEOUT must be a number of seconds, got '{}'", raw)
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let config = Self {
            interpreter,
            stage_timeout,
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the per-stage timeout
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.interpreter.as_os_str().is_empty() {
            anyhow::bail!("interpreter cannot be empty");
        }

        if self.interpreter.is_absolute() {
            anyhow::bail!("interpreter must be relative to the environment root");
        }

        if self
            .interpreter
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            anyhow::bail!("interpreter must stay inside the environment root");
        }

        if self.stage_timeout.is_some_and(|t| t.is_zero()) {
            anyhow::bail!("stage_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}
