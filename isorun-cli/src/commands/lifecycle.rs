//! Output and cleanup command handlers

use anyhow::{Context, Result};
use colored::*;
use isorun_core::PipelineConfig;
use isorun_runner::service::lifecycle;
use std::path::Path;
use std::process::ExitCode;

/// Load and validate a JSON pipeline definition
pub(crate) fn load_definition(definition: &Path) -> Result<PipelineConfig> {
    PipelineConfig::from_json_file(definition).map_err(|e| {
        let action = if e.is_load_error() {
            "Failed to load"
        } else {
            "Invalid"
        };
        anyhow::Error::new(e).context(format!(
            "{} pipeline definition {}",
            action,
            definition.display()
        ))
    })
}

/// Print the captured output log of a run
pub fn print_output(definition: &Path) -> Result<ExitCode> {
    let config = load_definition(definition)?;

    match lifecycle::read_captured_output(&config.log_path) {
        Some(output) => {
            print!("{}", output);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            eprintln!(
                "{}",
                format!("No captured output at {}", config.log_path.display()).yellow()
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Remove the environment root of a run
pub fn clean(definition: &Path) -> Result<ExitCode> {
    let config = load_definition(definition)?;

    let removed = lifecycle::remove_environment(&config.env_root)
        .with_context(|| format!("Failed to remove {}", config.env_root.display()))?;

    if removed {
        println!(
            "{} {}",
            "Removed".green().bold(),
            config.env_root.display()
        );
    } else {
        println!(
            "{}",
            format!("Nothing to remove at {}", config.env_root.display()).yellow()
        );
    }

    Ok(ExitCode::SUCCESS)
}
