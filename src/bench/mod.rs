//! Micro-benchmark engine.
//!
//! Runs a candidate repeatedly and reduces the timing samples to latency
//! and throughput metrics. A run that exhausts its time budget still
//! returns metrics over whatever samples were collected.

mod engine;
mod error;
pub mod stats;

pub use engine::{BenchEngine, BenchOptions, BenchmarkMetrics, ConfidenceInterval};
pub use error::BenchError;
