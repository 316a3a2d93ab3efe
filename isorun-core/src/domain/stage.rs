//! Stage domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One step of the fixed pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stage {
    CreateEnvironment,
    WriteScript,
    WriteManifest,
    InstallDependencies,
    RunScript,
}

impl Stage {
    /// All stages in the order the pipeline runs them
    pub const ALL: [Stage; 5] = [
        Stage::CreateEnvironment,
        Stage::WriteScript,
        Stage::WriteManifest,
        Stage::InstallDependencies,
        Stage::RunScript,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::CreateEnvironment => "create-environment",
            Stage::WriteScript => "write-script",
            Stage::WriteManifest => "write-manifest",
            Stage::InstallDependencies => "install-dependencies",
            Stage::RunScript => "run-script",
        }
    }

    /// Whether the stage launches a child process (and so writes to the log)
    pub fn spawns_process(&self) -> bool {
        matches!(
            self,
            Stage::CreateEnvironment | Stage::InstallDependencies | Stage::RunScript
        )
    }

    /// 1-based position in the pipeline
    pub fn position(&self) -> usize {
        Stage::ALL
            .iter()
            .position(|s| s == self)
            .map(|i| i + 1)
            .unwrap_or_default()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Why a stage did not succeed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageFailure {
    /// Process ran and exited with a non-zero status
    NonZeroExit(i32),
    /// Process was killed by a signal
    Terminated(Option<i32>),
    /// Process could not be started at all
    LaunchFailed(String),
    /// Process exceeded the stage timeout and was killed
    TimedOut(Duration),
    /// File write/read failed while materializing or capturing output
    Io(String),
    /// Any other error or panic caught at the pipeline boundary
    Unexpected(String),
}

impl StageFailure {
    /// Whether the failing stage actually ran a child process to completion
    pub fn process_ran(&self) -> bool {
        matches!(
            self,
            StageFailure::NonZeroExit(_) | StageFailure::Terminated(_) | StageFailure::TimedOut(_)
        )
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageFailure::NonZeroExit(code) => write!(f, "exited with status {}", code),
            StageFailure::Terminated(Some(signal)) => {
                write!(f, "terminated by signal {}", signal)
            }
            StageFailure::Terminated(None) => write!(f, "terminated without exit status"),
            StageFailure::LaunchFailed(reason) => write!(f, "failed to launch: {}", reason),
            StageFailure::TimedOut(limit) => write!(f, "timed out after {:?}", limit),
            StageFailure::Io(reason) => write!(f, "I/O error: {}", reason),
            StageFailure::Unexpected(reason) => write!(f, "unexpected error: {}", reason),
        }
    }
}

/// Outcome of a single stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    pub success: bool,
    /// Exit status of the child, for process stages that exited normally
    pub exit_code: Option<i32>,
    pub failure: Option<StageFailure>,
    /// Number of output lines appended to the log by this stage
    pub lines_captured: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl StageResult {
    /// Successful stage that did not run a process
    pub fn succeeded(stage: Stage, started_at: DateTime<Utc>) -> Self {
        Self {
            stage,
            success: true,
            exit_code: None,
            failure: None,
            lines_captured: 0,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(stage: Stage, failure: StageFailure, started_at: DateTime<Utc>) -> Self {
        Self {
            stage,
            success: false,
            exit_code: None,
            failure: Some(failure),
            lines_captured: 0,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Result of a process that exited normally; zero is success
    pub fn from_exit_code(
        stage: Stage,
        exit_code: i32,
        lines_captured: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            stage,
            success: exit_code == 0,
            exit_code: Some(exit_code),
            failure: (exit_code != 0).then_some(StageFailure::NonZeroExit(exit_code)),
            lines_captured,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn with_lines_captured(mut self, lines: usize) -> Self {
        self.lines_captured = lines;
        self
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Outcome of a whole pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: String,
    /// True iff every stage ran and succeeded
    pub success: bool,
    /// Results of the stages that were executed, in order
    pub stages: Vec<StageResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// Why the run was refused before any stage started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineReport {
    /// Builds a report from executed stage results
    pub fn new(run_id: impl Into<String>, stages: Vec<StageResult>, started_at: DateTime<Utc>) -> Self {
        let success =
            stages.len() == Stage::ALL.len() && stages.iter().all(|result| result.success);

        Self {
            run_id: run_id.into(),
            success,
            stages,
            started_at,
            completed_at: Utc::now(),
            error: None,
        }
    }

    /// Failed report for a run that never started
    pub fn rejected(
        run_id: impl Into<String>,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(run_id, Vec::new(), started_at)
        }
    }

    /// The stage that stopped the pipeline, if any
    pub fn failed_stage(&self) -> Option<Stage> {
        self.stages
            .iter()
            .find(|result| !result.success)
            .map(|result| result.stage)
    }

    pub fn last_failure(&self) -> Option<&StageFailure> {
        self.stages
            .iter()
            .rev()
            .find_map(|result| result.failure.as_ref())
    }

    /// Diagnostic text for a failed run, if it has one
    pub fn diagnostic(&self) -> Option<String> {
        self.error
            .clone()
            .or_else(|| self.last_failure().map(ToString::to_string))
    }

    pub fn executed_stages(&self) -> Vec<Stage> {
        self.stages.iter().map(|result| result.stage).collect()
    }

    /// Total number of lines the run appended to the captured log
    pub fn lines_captured(&self) -> usize {
        self.stages.iter().map(|result| result.lines_captured).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(Stage::ALL.first(), Some(&Stage::CreateEnvironment));
        assert_eq!(Stage::ALL.last(), Some(&Stage::RunScript));
        assert_eq!(Stage::CreateEnvironment.position(), 1);
        assert_eq!(Stage::RunScript.position(), 5);

        let mut sorted = Stage::ALL;
        sorted.sort();
        assert_eq!(sorted, Stage::ALL);
    }

    #[test]
    fn test_spawns_process() {
        let spawning: Vec<Stage> = Stage::ALL
            .into_iter()
            .filter(Stage::spawns_process)
            .collect();
        assert_eq!(
            spawning,
            vec![
                Stage::CreateEnvironment,
                Stage::InstallDependencies,
                Stage::RunScript
            ]
        );
    }

    #[test]
    fn test_from_exit_code() {
        let ok = StageResult::from_exit_code(Stage::RunScript, 0, 3, Utc::now());
        assert!(ok.success);
        assert!(ok.failure.is_none());
        assert_eq!(ok.lines_captured, 3);

        let bad = StageResult::from_exit_code(Stage::RunScript, 2, 0, Utc::now());
        assert!(!bad.success);
        assert_eq!(bad.exit_code, Some(2));
        assert_eq!(bad.failure, Some(StageFailure::NonZeroExit(2)));
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            StageFailure::NonZeroExit(1).to_string(),
            "exited with status 1"
        );
        assert!(
            StageFailure::LaunchFailed("No such file or directory".to_string())
                .to_string()
                .starts_with("failed to launch")
        );
        assert_eq!(
            StageFailure::TimedOut(Duration::from_millis(250)).to_string(),
            "timed out after 250ms"
        );
        assert!(!StageFailure::LaunchFailed(String::new()).process_ran());
        assert!(StageFailure::NonZeroExit(1).process_ran());
        assert!(StageFailure::TimedOut(Duration::from_secs(2)).process_ran());
    }

    #[test]
    fn test_report_success_requires_all_stages() {
        let started = Utc::now();
        let partial = PipelineReport::new(
            "run",
            vec![StageResult::succeeded(Stage::WriteScript, started)],
            started,
        );
        assert!(!partial.success);
        assert_eq!(partial.failed_stage(), None);

        let all: Vec<StageResult> = Stage::ALL
            .into_iter()
            .map(|stage| StageResult::succeeded(stage, started))
            .collect();
        let report = PipelineReport::new("run", all, started);
        assert!(report.success);
        assert_eq!(report.executed_stages(), Stage::ALL.to_vec());
    }

    #[test]
    fn test_report_failed_stage() {
        let started = Utc::now();
        let report = PipelineReport::new(
            "run",
            vec![StageResult::failed(
                Stage::CreateEnvironment,
                StageFailure::NonZeroExit(1),
                started,
            )],
            started,
        );

        assert!(!report.success);
        assert_eq!(report.failed_stage(), Some(Stage::CreateEnvironment));
        assert_eq!(report.last_failure(), Some(&StageFailure::NonZeroExit(1)));
        assert_eq!(report.diagnostic().as_deref(), Some("exited with status 1"));
        assert!(report.error.is_none());
    }

    #[test]
    fn test_rejected_report_carries_error() {
        let report = PipelineReport::rejected(
            "run",
            "run_id '..' must be a single directory name",
            Utc::now(),
        );

        assert!(!report.success);
        assert!(report.stages.is_empty());
        assert_eq!(report.failed_stage(), None);
        assert!(report.diagnostic().unwrap().contains("run_id"));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["error"].as_str().unwrap().contains("single directory name"));
    }

    #[test]
    fn test_timed_out_keeps_sub_second_limit() {
        let failure = StageFailure::TimedOut(Duration::from_millis(200));
        let json = serde_json::to_string(&failure).unwrap();
        let back: StageFailure = serde_json::from_str(&json).unwrap();
        assert_eq!(back, failure);
        assert_ne!(back, StageFailure::TimedOut(Duration::ZERO));
    }
}
