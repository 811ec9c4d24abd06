//! Quiver test execution engine
//!
//! Runs many test files concurrently, each in its own sandbox, and turns
//! what they register into structured reports with statistics and optional
//! micro-benchmarks.
//!
//! # Components
//!
//! - **Pool**: dispatches one execution unit per file, owns the results map
//!   and decides the exit code.
//! - **ExecutionUnit**: compiles a file, builds a fresh sandbox, evaluates
//!   registration and awaits the suite under a hard bound.
//! - **SuiteRuntime**: resolves one file's tests and hooks into an ordered
//!   plan (exclusivity, hooks, parallel batch, sequential tests, retries,
//!   soft failures, timeouts, benchmark mode).
//! - **BenchEngine**: timed sampling loop and statistical reduction.
//!
//! # Boundaries
//!
//! - Compilation is an external service behind [`execution::Compiler`].
//! - Reporting is an external sink behind [`pool::Reporter`].
//! - Assertion and mock DSLs are injected through [`sandbox::Extensions`].
//! - Isolation is for fault containment, not a security boundary.

pub mod bench;
pub mod config;
pub mod execution;
pub mod pool;
pub mod sandbox;
pub mod suite;
pub mod telemetry;

use std::sync::Arc;

use config::EnvConfig;
use execution::{Compiler, ExecutionUnit};
use pool::{Pool, Reporter};
use sandbox::{Extensions, ProcessSnapshot};

pub use bench::{BenchEngine, BenchOptions, BenchmarkMetrics};
pub use execution::{ExecutionError, PoolResult};
pub use pool::{exit_code, ResultsMap, WatchEvent};
pub use sandbox::Sandbox;
pub use suite::{SuiteRuntime, TestFailure, TestReport};

/// A configured pool plus the configuration it was built from.
pub struct Engine {
    pub config: EnvConfig,
    pub pool: Pool,
}

impl Engine {
    /// Build an engine from explicit configuration.
    pub fn new(
        config: EnvConfig,
        compiler: Arc<dyn Compiler>,
        reporter: Arc<dyn Reporter>,
        extensions: Extensions,
    ) -> Self {
        let unit = ExecutionUnit::new(compiler, config.run.clone())
            .with_process(ProcessSnapshot::capture())
            .with_extensions(extensions);
        let pool = Pool::with_unit(unit, config.pool_config(), reporter);
        Self { config, pool }
    }

    /// Build an engine from `QUIVER_*` environment variables.
    pub fn from_env(compiler: Arc<dyn Compiler>, reporter: Arc<dyn Reporter>) -> Self {
        Self::new(config::load(), compiler, reporter, Extensions::new())
    }
}
