//! Run command handler
//!
//! Builds a pipeline configuration from a JSON definition or from flags,
//! runs it, prints the captured output and removes the environment.

use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use isorun_core::{PipelineConfig, PipelineReport, StageResult};
use isorun_runner::Pipeline;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use super::lifecycle::load_definition;
use crate::config::Config;

/// Arguments of `isorun run`
#[derive(Args, Debug)]
pub struct RunArgs {
    /// JSON pipeline definition (replaces the script and layout flags)
    #[arg(
        short,
        long,
        conflicts_with_all = ["script", "requirements", "run_id"]
    )]
    definition: Option<PathBuf>,

    /// Script file to run
    #[arg(short, long, required_unless_present = "definition")]
    script: Option<PathBuf>,

    /// Dependency manifest, one package per line
    #[arg(short, long)]
    requirements: Option<PathBuf>,

    /// Base runtime used to create the environment
    #[arg(long, env = "ISORUN_PYTHON", default_value = "python3")]
    python: PathBuf,

    /// Directory holding run environments
    #[arg(short, long, env = "ISORUN_WORKSPACE", default_value = ".isorun")]
    workspace: PathBuf,

    /// Run identifier (generated when omitted)
    #[arg(long)]
    run_id: Option<String>,

    /// Keep the environment after a successful run
    #[arg(short, long)]
    keep: bool,

    /// Print the per-stage report as JSON
    #[arg(long)]
    report: bool,
}

impl RunArgs {
    /// Resolves the pipeline configuration these arguments describe
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        if let Some(definition) = &self.definition {
            return load_definition(definition);
        }

        let script_file = self
            .script
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("either --definition or --script is required"))?;
        let script = read_text(script_file)?;

        let manifest = match &self.requirements {
            Some(path) => read_text(path)?,
            None => String::new(),
        };

        let run_id = self
            .run_id
            .clone()
            .unwrap_or_else(PipelineConfig::generate_run_id);

        let config =
            PipelineConfig::in_workspace(run_id, &self.python, &self.workspace, script, manifest);
        config.validate()?;
        Ok(config)
    }
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Run a pipeline end to end
pub async fn handle_run(args: RunArgs, config: &Config) -> Result<ExitCode> {
    let pipeline_config = args.pipeline_config()?;
    info!(
        "Running '{}' in {}",
        pipeline_config.run_id,
        pipeline_config.env_root.display()
    );

    let pipeline = Pipeline::with_runner_config(pipeline_config, &config.runner);
    let report = pipeline.execute().await;

    print_report(&report);

    if args.report {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if !report.success {
        if let Some(diagnostic) = report.diagnostic() {
            eprintln!("{} {}", "Error:".red().bold(), diagnostic);
        }
        if let Some(hint) = partial_output_hint(&report, &pipeline.config().log_path) {
            eprintln!("{}", hint.yellow());
        }
        return Ok(ExitCode::FAILURE);
    }

    match pipeline.read_captured_output() {
        Some(output) => {
            println!("{}", "Captured output:".bold());
            print!("{}", output);
        }
        None => eprintln!("{}", "Captured output could not be read".yellow()),
    }

    if args.keep {
        println!(
            "{} {}",
            "Environment kept at".dimmed(),
            pipeline.config().env_root.display()
        );
    } else {
        pipeline.teardown();
    }

    Ok(ExitCode::SUCCESS)
}

/// Print one status line per executed stage
fn print_report(report: &PipelineReport) {
    for result in &report.stages {
        println!("{}", stage_line(result));
    }

    let status = if report.success {
        "SUCCEEDED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    println!(
        "{} {} ({} line(s) captured)",
        "Pipeline".bold(),
        status,
        report.lines_captured()
    );
}

/// Points at the log when the failing stage ran a process that may have
/// left partial output behind
fn partial_output_hint(report: &PipelineReport, log_path: &Path) -> Option<String> {
    report
        .last_failure()
        .filter(|failure| failure.process_ran())
        .map(|_| format!("Partial output kept in {}", log_path.display()))
}

fn stage_line(result: &StageResult) -> String {
    let elapsed = result.duration().num_milliseconds();

    if result.success {
        let detail = if result.stage.spawns_process() {
            format!("({} line(s), {} ms)", result.lines_captured, elapsed)
        } else {
            format!("({} ms)", elapsed)
        };
        format!(
            "  {} {} {}",
            "✓".green(),
            result.stage.name(),
            detail.dimmed()
        )
    } else {
        let reason = result
            .failure
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_else(|| "failed".to_string());
        format!(
            "  {} {} {}",
            "✗".red(),
            result.stage.name(),
            reason.red()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use isorun_core::{Stage, StageFailure};
    use std::ffi::OsStr;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_pipeline_config_from_flags() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("job.py");
        let requirements = dir.path().join("requirements.txt");
        std::fs::write(&script, "print('hi')\n").unwrap();
        std::fs::write(&requirements, "pandas\n").unwrap();

        let cli = TestCli::parse_from([
            OsStr::new("isorun"),
            OsStr::new("--script"),
            script.as_os_str(),
            OsStr::new("--requirements"),
            requirements.as_os_str(),
            OsStr::new("--workspace"),
            dir.path().as_os_str(),
            OsStr::new("--run-id"),
            OsStr::new("calc"),
            OsStr::new("--python"),
            OsStr::new("/usr/bin/python3"),
        ]);

        let config = cli.run.pipeline_config().unwrap();
        assert_eq!(config.run_id, "calc");
        assert_eq!(config.script, "print('hi')\n");
        assert_eq!(config.manifest, "pandas\n");
        assert_eq!(config.env_root, dir.path().join("calc"));
        assert_eq!(config.base_runtime, PathBuf::from("/usr/bin/python3"));
    }

    #[test]
    fn test_pipeline_config_from_definition() {
        let dir = tempfile::tempdir().unwrap();
        let expected = PipelineConfig::in_workspace(
            "from-file",
            "/usr/bin/python3",
            dir.path(),
            "print(1)\n",
            "",
        );
        let definition = dir.path().join("pipeline.json");
        std::fs::write(&definition, serde_json::to_string(&expected).unwrap()).unwrap();

        let cli = TestCli::parse_from([
            OsStr::new("isorun"),
            OsStr::new("--definition"),
            definition.as_os_str(),
        ]);

        assert_eq!(cli.run.pipeline_config().unwrap(), expected);
    }

    #[test]
    fn test_definition_conflicts_with_script() {
        let result = TestCli::try_parse_from([
            "isorun",
            "--definition",
            "pipeline.json",
            "--script",
            "job.py",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_script_or_definition_required() {
        assert!(TestCli::try_parse_from(["isorun"]).is_err());
    }

    #[test]
    fn test_invalid_run_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("job.py");
        std::fs::write(&script, "print('hi')\n").unwrap();

        let cli = TestCli::parse_from([
            OsStr::new("isorun"),
            OsStr::new("--script"),
            script.as_os_str(),
            OsStr::new("--workspace"),
            dir.path().as_os_str(),
            OsStr::new("--run-id"),
            OsStr::new(".."),
        ]);

        assert!(cli.run.pipeline_config().is_err());
    }

    #[test]
    fn test_stage_line_counts_lines_for_process_stages() {
        colored::control::set_override(false);
        let started = chrono::Utc::now();

        let installed = StageResult::from_exit_code(Stage::InstallDependencies, 0, 7, started);
        assert!(stage_line(&installed).contains("7 line(s)"));

        let written = StageResult::succeeded(Stage::WriteScript, started);
        assert!(!stage_line(&written).contains("line(s)"));
    }

    #[test]
    fn test_partial_output_hint_only_after_process_ran() {
        let started = chrono::Utc::now();
        let log = Path::new("/tmp/runs/calc/output.txt");

        let exited = PipelineReport::new(
            "calc",
            vec![StageResult::from_exit_code(Stage::RunScript, 1, 2, started)],
            started,
        );
        let hint = partial_output_hint(&exited, log).unwrap();
        assert!(hint.contains("output.txt"));

        let not_launched = PipelineReport::new(
            "calc",
            vec![StageResult::failed(
                Stage::CreateEnvironment,
                StageFailure::LaunchFailed("not found".to_string()),
                started,
            )],
            started,
        );
        assert!(partial_output_hint(&not_launched, log).is_none());

        let rejected = PipelineReport::rejected("..", "invalid configuration", started);
        assert!(partial_output_hint(&rejected, log).is_none());
    }

    #[test]
    fn test_missing_script_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.py");

        let cli = TestCli::parse_from([
            OsStr::new("isorun"),
            OsStr::new("--script"),
            missing.as_os_str(),
        ]);

        assert!(cli.run.pipeline_config().is_err());
    }
}
