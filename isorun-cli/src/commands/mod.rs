//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod lifecycle;
mod run;

use run::RunArgs;

use anyhow::Result;
use clap::Subcommand;
use std::path::PathBuf;
use std::process::ExitCode;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Provision an environment, install dependencies and run a script
    Run(RunArgs),
    /// Print the captured output of a run
    Output {
        /// Path to the JSON pipeline definition
        definition: PathBuf,
    },
    /// Remove the environment of a run
    Clean {
        /// Path to the JSON pipeline definition
        definition: PathBuf,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Returns
/// The process exit code: failure when the pipeline or the lookup failed
pub async fn handle_command(command: Commands, config: &Config) -> Result<ExitCode> {
    match command {
        Commands::Run(args) => run::handle_run(args, config).await,
        Commands::Output { definition } => lifecycle::print_output(&definition),
        Commands::Clean { definition } => lifecycle::clean(&definition),
    }
}
