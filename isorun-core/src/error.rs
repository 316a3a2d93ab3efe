//! Error types for pipeline definitions

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a pipeline definition
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Definition file could not be read
    #[error("Failed to read pipeline definition {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Definition file is not valid JSON for a pipeline
    #[error("Failed to parse pipeline definition {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required field is empty
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Run id cannot be used as a single directory name
    #[error("run_id '{0}' must be a single directory name")]
    InvalidRunId(String),

    /// Environment root that teardown must never remove
    #[error("env_root {0} must not be a filesystem root or contain '..'")]
    UnsafeEnvRoot(PathBuf),

    /// Two fields point at the same location
    #[error("{first} and {second} must be distinct paths ({path})")]
    Overlap {
        first: &'static str,
        second: &'static str,
        path: PathBuf,
    },
}

impl ConfigError {
    /// Check if this error came from reading or parsing a file rather than validation
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Read { .. } | Self::Parse { .. })
    }
}
