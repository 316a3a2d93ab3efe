//! Isorun Runner
//!
//! Provisions an isolated runtime environment, installs the declared
//! dependencies, runs a script inside it and captures every line of child
//! output into one append-only log.
//!
//! Architecture:
//! - Sink: serialized, append-only log writer
//! - Process: launches one child and drains both output streams into the sink
//! - Services: stage functions and post-run lifecycle (output, teardown)
//! - Pipeline: runs the stages in order and stops at the first failure

pub mod config;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod service;
pub mod sink;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::RunnerConfig;
pub use error::RunnerError;
pub use pipeline::Pipeline;
pub use process::{ProcessExit, ProcessRunner};
pub use service::{StageExecutor, StandardStageExecutor};
pub use sink::{FileSink, MemorySink, OutputSink, SinkSummary, SinkWriter};
