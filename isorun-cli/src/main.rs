//! Isorun CLI
//!
//! Command-line entry point: provisions an isolated environment, installs
//! dependencies, runs a script in it and prints the captured output.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;
use isorun_runner::config::DEFAULT_INTERPRETER;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "isorun")]
#[command(about = "Run scripts inside disposable isolated environments", long_about = None)]
struct Cli {
    /// Interpreter location relative to the environment root
    #[arg(long, env = "ISORUN_INTERPRETER", default_value = DEFAULT_INTERPRETER)]
    interpreter: String,

    /// Kill a stage that runs longer than this many seconds
    #[arg(long, env = "ISORUN_STAGE_TIMEOUT")]
    stage_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Diagnostics go to stderr; stdout carries the captured output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "isorun=info,isorun_runner=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::new(&cli.interpreter, cli.stage_timeout)?;

    handle_command(cli.command, &config).await
}
