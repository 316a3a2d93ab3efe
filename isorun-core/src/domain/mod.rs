//! Core domain types
//!
//! These types describe one pipeline run: what to run and where
//! (`config`), the fixed sequence of steps (`stage`), and the lines
//! captured from child processes (`log`). They carry no behavior beyond
//! validation and are shared between the runner and the CLI.

pub mod config;
pub mod log;
pub mod stage;
