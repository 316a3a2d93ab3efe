//! Isorun Core
//!
//! Core types for the isorun script pipeline.
//!
//! This crate contains:
//! - Domain types: pipeline configuration, stages, stage and run results
//! - Error types for loading and validating pipeline definitions
//!
//! Process execution and file handling live in `isorun-runner`.

pub mod domain;
pub mod error;

pub use domain::config::PipelineConfig;
pub use domain::log::{OutputLine, StreamKind};
pub use domain::stage::{PipelineReport, Stage, StageFailure, StageResult};
pub use error::ConfigError;
