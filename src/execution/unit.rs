//! One file's isolated execution.
//!
//! Compile, build a fresh sandbox, evaluate registration, then await the
//! suite under the file-level bound. Any failure outside a test body
//! becomes an [`ExecutionError`]; the report is validated before it is
//! trusted.

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::Instrument;
use uuid::Uuid;

use super::compile::{CompiledFile, Compiler};
use super::error::ExecutionError;
use super::result::PoolResult;
use super::state::{ExecutionState, Lifecycle};
use crate::bench::BenchOptions;
use crate::sandbox::{Extensions, LogSink, ProcessSnapshot, Sandbox, SandboxParts};
use crate::suite::{SuiteConfig, TestFailure, TestReport, DEFAULT_TEST_TIMEOUT};
use crate::telemetry::{self, FileSpan, SpanExt};

/// Default hard bound for a whole file.
pub const DEFAULT_FILE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Bounds and defaults applied to every file.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub file_timeout: Duration,
    /// Default bound for tests and hooks without their own.
    pub test_timeout: Duration,
    pub bench: BenchOptions,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            file_timeout: DEFAULT_FILE_TIMEOUT,
            test_timeout: DEFAULT_TEST_TIMEOUT,
            bench: BenchOptions::default(),
        }
    }
}

/// Executes single files. Holds no per-file state and can be shared.
pub struct ExecutionUnit {
    compiler: Arc<dyn Compiler>,
    options: RunOptions,
    process: ProcessSnapshot,
    extensions: Extensions,
}

impl ExecutionUnit {
    pub fn new(compiler: Arc<dyn Compiler>, options: RunOptions) -> Self {
        Self {
            compiler,
            options,
            process: ProcessSnapshot::capture(),
            extensions: Extensions::new(),
        }
    }

    pub fn with_process(mut self, process: ProcessSnapshot) -> Self {
        self.process = process;
        self
    }

    pub fn with_extensions(mut self, extensions: Extensions) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Run one file to a terminal state. Never fails; errors are captured
    /// in the returned result.
    pub async fn execute(&self, path: &Path) -> PoolResult {
        let sandbox_id = Uuid::new_v4();
        let span = FileSpan::new(path, sandbox_id);
        let result = self
            .execute_inner(path, sandbox_id)
            .instrument(span.clone())
            .await;

        span.record_result(&result.as_result());
        span.record("state", result.state.as_str());
        span.record("duration_ms", result.duration_ms);
        span.record("compile_ms", result.compile_duration_ms);
        telemetry::record_file_result(&result);
        result
    }

    async fn execute_inner(&self, path: &Path, sandbox_id: Uuid) -> PoolResult {
        let started = Instant::now();
        let mut life = Lifecycle::new();
        advance(&mut life, ExecutionState::Compiling);

        let compiled = self.compiler.compile(path).await;
        let compile_ms = elapsed_ms(started);
        let file = match compiled {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(error = %e, "compile failed");
                let err = ExecutionError::from(e);
                advance(&mut life, err.state());
                return PoolResult::from_outcome(Err(err), elapsed_ms(started), compile_ms, Vec::new(), None);
            }
        };

        advance(&mut life, ExecutionState::Running);
        let source_map = file.source_map.clone();
        let (outcome, console) = self.run_sandbox(path, sandbox_id, file).await;
        advance(
            &mut life,
            match &outcome {
                Ok(_) => ExecutionState::Completed,
                Err(e) => e.state(),
            },
        );

        if let Err(e) = &outcome {
            tracing::warn!(error = %e, "file produced no report");
        }
        PoolResult::from_outcome(outcome, elapsed_ms(started), compile_ms, console.drain(), source_map)
    }

    async fn run_sandbox(
        &self,
        path: &Path,
        sandbox_id: Uuid,
        file: CompiledFile,
    ) -> (Result<TestReport, ExecutionError>, LogSink) {
        let deadline = tokio::time::Instant::now() + self.options.file_timeout;
        let mut sandbox = Sandbox::with_id(
            sandbox_id,
            path,
            self.process.clone(),
            self.extensions.clone(),
            SuiteConfig {
                description: path.display().to_string(),
                default_timeout: self.options.test_timeout,
                bench: self.options.bench.clone(),
            },
        );
        let evaluated = std::panic::catch_unwind(AssertUnwindSafe(|| file.program.evaluate(&mut sandbox)));
        let crash = match evaluated {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.message),
            Err(payload) => Some(TestFailure::panicked(payload).message),
        };
        let SandboxParts {
            suite,
            run_requested,
            console,
            timers,
        } = sandbox.into_parts();
        if let Some(message) = crash {
            timers.cancel_all();
            return (Err(ExecutionError::SandboxCrash { message }), console);
        }
        if !run_requested {
            timers.cancel_all();
            let reason = "run() was never called, the suite produced no report".to_string();
            return (Err(ExecutionError::MalformedReport { reason }), console);
        }

        let run = AssertUnwindSafe(suite.run()).catch_unwind();
        let outcome = match tokio::time::timeout_at(deadline, run).await {
            Err(_) => Err(ExecutionError::timeout(self.options.file_timeout)),
            Ok(Err(payload)) => Err(ExecutionError::SandboxCrash {
                message: format!("suite runtime {}", TestFailure::panicked(payload).message),
            }),
            Ok(Ok(report)) => report
                .validate()
                .map(|()| report)
                .map_err(|reason| ExecutionError::MalformedReport { reason }),
        };
        // Abandon whatever the file left running.
        timers.cancel_all();
        (outcome, console)
    }
}

fn advance(life: &mut Lifecycle, next: ExecutionState) {
    if let Err(e) = life.advance(next) {
        tracing::error!(error = %e, "execution state machine violated");
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
#[path = "unit_tests.rs"]
mod tests;
