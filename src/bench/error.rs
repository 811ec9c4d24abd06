//! Benchmark configuration errors.

use thiserror::Error;

/// Invalid benchmark options. Raised before any sample is taken.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BenchError {
    #[error("Invalid benchmark configuration: iterations must be greater than 0")]
    ZeroIterations,

    #[error("Invalid benchmark configuration: confidence must be in (0, 1), got {0}")]
    InvalidConfidence(f64),
}
