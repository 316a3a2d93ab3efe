//! Stage functions
//!
//! Three stages invoke a runtime through the process runner:
//! - create the environment with the base runtime (`-m venv <root>`)
//! - install the manifest with the environment's own interpreter
//!   (`-m pip install -r <manifest>`)
//! - run the script unbuffered (`-u <script>`)
//!
//! Two stages materialize in-memory text to disk (script, manifest).
//! Every failure is folded into the returned `StageResult`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use isorun_core::{PipelineConfig, Stage, StageFailure, StageResult};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::process::ProcessRunner;
use crate::sink::{FileSink, OutputSink};

/// Service trait for executing a single pipeline stage
#[async_trait]
pub trait StageExecutor: Send + Sync {
    /// Executes one stage
    ///
    /// # Returns
    /// The stage result. `Err` is reserved for unclassified failures, which
    /// the pipeline treats as a failed stage.
    async fn execute(&self, stage: Stage) -> anyhow::Result<StageResult>;
}

/// Standard implementation of StageExecutor backed by real processes
pub struct StandardStageExecutor {
    config: Arc<PipelineConfig>,
    runner: ProcessRunner,
    interpreter: PathBuf,
}

impl StandardStageExecutor {
    /// Creates an executor writing child output to the configured log
    pub fn new(config: Arc<PipelineConfig>, runner_config: &RunnerConfig) -> Self {
        let sink: Arc<dyn OutputSink> = Arc::new(FileSink::new(&config.log_path));
        Self::with_sink(config, runner_config, sink)
    }

    /// Creates an executor writing child output to an arbitrary sink
    pub fn with_sink(
        config: Arc<PipelineConfig>,
        runner_config: &RunnerConfig,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        Self {
            config,
            runner: ProcessRunner::new(sink).with_timeout(runner_config.stage_timeout),
            interpreter: runner_config.interpreter.clone(),
        }
    }

    /// Interpreter inside the environment root
    pub fn env_interpreter(&self) -> PathBuf {
        self.config.env_root.join(&self.interpreter)
    }

    /// Creates the isolated environment with the base runtime
    pub async fn create_environment(&self) -> StageResult {
        let args = vec![
            OsString::from("-m"),
            OsString::from("venv"),
            self.config.env_root.clone().into_os_string(),
        ];

        self.run_process(Stage::CreateEnvironment, &self.config.base_runtime, args)
            .await
    }

    /// Writes the script text to its destination, truncating it
    pub async fn write_script(&self) -> StageResult {
        materialize(Stage::WriteScript, &self.config.script_path, &self.config.script).await
    }

    /// Writes the manifest text to its destination, truncating it
    pub async fn write_manifest(&self) -> StageResult {
        materialize(
            Stage::WriteManifest,
            &self.config.manifest_path,
            &self.config.manifest,
        )
        .await
    }

    /// Installs the manifest with the environment's interpreter
    pub async fn install_dependencies(&self) -> StageResult {
        let args = vec![
            OsString::from("-m"),
            OsString::from("pip"),
            OsString::from("install"),
            OsString::from("-r"),
            self.config.manifest_path.clone().into_os_string(),
        ];

        self.run_in_environment(Stage::InstallDependencies, args).await
    }

    /// Runs the script with unbuffered output
    pub async fn run_script(&self) -> StageResult {
        let args = vec![
            OsString::from("-u"),
            self.config.script_path.clone().into_os_string(),
        ];

        self.run_in_environment(Stage::RunScript, args).await
    }

    async fn run_in_environment(&self, stage: Stage, args: Vec<OsString>) -> StageResult {
        let interpreter = self.env_interpreter();

        if !interpreter.is_file() {
            error!(
                "Stage '{}' cannot start: no interpreter at {}",
                stage,
                interpreter.display()
            );
            return StageResult::failed(
                stage,
                StageFailure::LaunchFailed(format!(
                    "environment interpreter not found at {}",
                    interpreter.display()
                )),
                Utc::now(),
            );
        }

        self.run_process(stage, &interpreter, args).await
    }

    async fn run_process(&self, stage: Stage, program: &Path, args: Vec<OsString>) -> StageResult {
        let started_at = Utc::now();
        debug!("Stage '{}' running {} {:?}", stage, program.display(), args);

        match self.runner.run(program, &args).await {
            Ok(exit) => match exit.code {
                Some(code) => {
                    StageResult::from_exit_code(stage, code, exit.lines_captured, started_at)
                }
                None => StageResult::failed(stage, StageFailure::Terminated(exit.signal), started_at)
                    .with_lines_captured(exit.lines_captured),
            },
            Err(e) => {
                error!("Stage '{}' failed: {}", stage, e);
                StageResult::failed(stage, e.to_stage_failure(), started_at)
            }
        }
    }
}

#[async_trait]
impl StageExecutor for StandardStageExecutor {
    async fn execute(&self, stage: Stage) -> anyhow::Result<StageResult> {
        let result = match stage {
            Stage::CreateEnvironment => self.create_environment().await,
            Stage::WriteScript => self.write_script().await,
            Stage::WriteManifest => self.write_manifest().await,
            Stage::InstallDependencies => self.install_dependencies().await,
            Stage::RunScript => self.run_script().await,
        };

        Ok(result)
    }
}

/// Overwrites `path` with `content`, creating missing parent directories
async fn materialize(stage: Stage, path: &Path, content: &str) -> StageResult {
    let started_at: DateTime<Utc> = Utc::now();

    match write_file(path, content).await {
        Ok(()) => {
            info!("Wrote {} byte(s) to {}", content.len(), path.display());
            StageResult::succeeded(stage, started_at)
        }
        Err(e) => {
            error!("Stage '{}' failed: {}", stage, e);
            StageResult::failed(stage, e.to_stage_failure(), started_at)
        }
    }
}

async fn write_file(path: &Path, content: &str) -> Result<(), RunnerError> {
    let to_error = |source| RunnerError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(to_error)?;
        }
    }

    tokio::fs::write(path, content).await.map_err(to_error)
}
