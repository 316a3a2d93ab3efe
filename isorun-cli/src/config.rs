//! Configuration module
//!
//! Turns global CLI flags into runner settings.

use isorun_runner::RunnerConfig;
use std::path::PathBuf;
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings passed to every pipeline the CLI runs
    pub runner: RunnerConfig,
}

impl Config {
    /// Builds and validates the configuration
    pub fn new(interpreter: &str, stage_timeout: Option<u64>) -> anyhow::Result<Self> {
        let mut runner = RunnerConfig::new();
        runner.interpreter = PathBuf::from(interpreter);
        if let Some(secs) = stage_timeout {
            runner = runner.with_stage_timeout(Duration::from_secs(secs));
        }
        runner.validate()?;

        Ok(Self { runner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::new("bin/python", None).unwrap();
        assert_eq!(config.runner.interpreter, PathBuf::from("bin/python"));
        assert!(config.runner.stage_timeout.is_none());
    }

    #[test]
    fn test_config_rejects_invalid_settings() {
        assert!(Config::new("/usr/bin/python3", None).is_err());
        assert!(Config::new("bin/python", Some(0)).is_err());
        assert!(Config::new("bin/python", Some(60)).is_ok());
    }
}
