//! Error types for the isorun runner

use isorun_core::StageFailure;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Errors that can occur while running a stage
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The executable could not be started at all
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Waiting on a running child failed
    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A line could not be appended to the captured output log
    #[error("Failed to capture output to {path}: {source}")]
    Capture {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file could not be materialized
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The child outlived the stage timeout and was killed
    #[error("{program} timed out after {limit:?}")]
    TimedOut { program: PathBuf, limit: Duration },
}

impl RunnerError {
    /// Check if the child never started
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::Launch { .. })
    }

    /// Converts the error into the failure recorded on the stage result
    pub fn to_stage_failure(&self) -> StageFailure {
        match self {
            Self::Launch { source, .. } => StageFailure::LaunchFailed(source.to_string()),
            Self::TimedOut { limit, .. } => StageFailure::TimedOut(*limit),
            Self::Wait { .. } | Self::Capture { .. } | Self::Write { .. } => {
                StageFailure::Io(self.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_launch_failure_maps_to_launch_failed() {
        let err = RunnerError::Launch {
            program: PathBuf::from("/missing/python"),
            source: io::Error::new(io::ErrorKind::NotFound, "No such file or directory"),
        };

        assert!(err.is_launch_failure());
        assert!(matches!(err.to_stage_failure(), StageFailure::LaunchFailed(_)));
        assert!(err.to_string().contains("/missing/python"));
    }

    #[test]
    fn test_io_errors_map_to_io() {
        let err = RunnerError::Capture {
            path: PathBuf::from("/readonly/output.txt"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };

        assert!(!err.is_launch_failure());
        match err.to_stage_failure() {
            StageFailure::Io(message) => assert!(message.contains("output.txt")),
            other => panic!("expected I/O failure, got {:?}", other),
        }
    }

    #[test]
    fn test_timeout_maps_to_timed_out() {
        let err = RunnerError::TimedOut {
            program: PathBuf::from("python"),
            limit: Duration::from_millis(1500),
        };
        assert_eq!(
            err.to_stage_failure(),
            StageFailure::TimedOut(Duration::from_millis(1500))
        );
        assert_eq!(err.to_string(), "python timed out after 1.5s");
    }
}
