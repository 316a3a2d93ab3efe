//! Pipeline orchestrator
//!
//! Runs the five stages strictly in order:
//! create environment -> write script -> write manifest -> install
//! dependencies -> run script. The first stage that does not succeed ends
//! the run; later stages are never started. Errors and panics raised by a
//! stage are caught here and count as that stage failing, so callers only
//! ever see a report or a boolean.

use chrono::Utc;
use isorun_core::{PipelineConfig, PipelineReport, Stage, StageFailure, StageResult};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::RunnerConfig;
use crate::service::{StageExecutor, StandardStageExecutor, lifecycle};

/// One pipeline run bound to its configuration
///
/// Supports a single in-flight run; the environment root is owned by this
/// pipeline until `teardown` removes it.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    executor: Arc<dyn StageExecutor>,
}

impl Pipeline {
    /// Creates a pipeline with default runner settings
    pub fn new(config: PipelineConfig) -> Self {
        Self::with_runner_config(config, &RunnerConfig::default())
    }

    /// Creates a pipeline running real processes with the given settings
    pub fn with_runner_config(config: PipelineConfig, runner_config: &RunnerConfig) -> Self {
        let config = Arc::new(config);
        let executor = StandardStageExecutor::new(Arc::clone(&config), runner_config);

        Self {
            config,
            executor: Arc::new(executor),
        }
    }

    /// Creates a pipeline driven by a custom stage executor
    pub fn with_executor(config: PipelineConfig, executor: Arc<dyn StageExecutor>) -> Self {
        Self {
            config: Arc::new(config),
            executor,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs the pipeline
    ///
    /// # Returns
    /// `true` iff all five stages completed successfully
    pub async fn run(&self) -> bool {
        self.execute().await.success
    }

    /// Runs the pipeline and returns the per-stage report
    pub async fn execute(&self) -> PipelineReport {
        let run_id = self.config.run_id.clone();
        let started_at = Utc::now();

        if let Err(e) = self.config.validate() {
            error!("Pipeline '{}' has an invalid configuration: {}", run_id, e);
            return PipelineReport::rejected(
                run_id,
                format!("invalid configuration: {}", e),
                started_at,
            );
        }

        info!("Starting pipeline '{}'", run_id);

        let mut results = Vec::with_capacity(Stage::ALL.len());

        for stage in Stage::ALL {
            info!(
                "Executing stage {}/{}: {}",
                stage.position(),
                Stage::ALL.len(),
                stage
            );

            let result = self.execute_stage(stage).await;
            let success = result.success;

            if success {
                info!("Stage '{}' completed", stage);
            } else {
                let reason = result
                    .failure
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown failure".to_string());
                error!("Stage '{}' failed: {}", stage, reason);
            }

            results.push(result);

            if !success {
                break;
            }
        }

        let report = PipelineReport::new(run_id, results, started_at);

        if report.success {
            info!("Pipeline '{}' completed successfully", report.run_id);
        } else {
            warn!(
                "Pipeline '{}' stopped at stage '{}'",
                report.run_id,
                report
                    .failed_stage()
                    .map(|stage| stage.name())
                    .unwrap_or("none")
            );
        }

        report
    }

    /// Executes a stage on its own task so a panic is contained
    async fn execute_stage(&self, stage: Stage) -> StageResult {
        let executor = Arc::clone(&self.executor);
        let started_at = Utc::now();

        match tokio::spawn(async move { executor.execute(stage).await }).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => StageResult::failed(
                stage,
                StageFailure::Unexpected(format!("{:#}", e)),
                started_at,
            ),
            Err(e) => StageResult::failed(
                stage,
                StageFailure::Unexpected(format!("stage task failed: {}", e)),
                started_at,
            ),
        }
    }

    /// Reads back the captured output log
    ///
    /// # Returns
    /// The whole log, or `None` if it could not be read
    pub fn read_captured_output(&self) -> Option<String> {
        lifecycle::read_captured_output(&self.config.log_path)
    }

    /// Removes the environment root and everything inside it
    ///
    /// Call only after the output has been read: when the log lives inside
    /// the environment root it is removed too. Errors are logged. Nothing is
    /// removed for a configuration that does not validate.
    pub fn teardown(&self) {
        if let Err(e) = self.config.validate() {
            warn!(
                "Refusing to tear down pipeline '{}': {}",
                self.config.run_id, e
            );
            return;
        }

        if self.config.log_inside_env() {
            info!(
                "Captured output {} is removed with the environment",
                self.config.log_path.display()
            );
        }
        lifecycle::teardown(&self.config.env_root);
    }
}
