//! Service layer
//!
//! Stage functions used by the pipeline, and the post-run lifecycle
//! operations (reading captured output, tearing the environment down).
//!
//! Stage execution is trait-based so the pipeline can be driven by fakes.

pub mod lifecycle;
mod stages;

// Re-export traits
pub use stages::StageExecutor;

// Re-export implementations
pub use stages::StandardStageExecutor;
