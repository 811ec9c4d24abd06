//! Metrics emitted through the `metrics` facade.
//!
//! Nothing is recorded unless the embedder installs a recorder.

use metrics::{counter, histogram};

use crate::execution::{ExecutionState, PoolResult};
use crate::suite::TestStatus;

/// Record one finished file and the status of every test it reported.
pub fn record_file_result(result: &PoolResult) {
    counter!("quiver_files_executed_total").increment(1);
    histogram!("quiver_file_duration_ms").record(result.duration_ms);
    histogram!("quiver_compile_duration_ms").record(result.compile_duration_ms);

    match result.state {
        ExecutionState::TimedOut => counter!("quiver_files_timed_out_total").increment(1),
        ExecutionState::Crashed => counter!("quiver_files_crashed_total").increment(1),
        _ => {}
    }
    if !result.passed() {
        counter!("quiver_files_failed_total").increment(1);
    }

    if let Some(report) = result.report() {
        for test in &report.tests {
            record_test_status(test.status);
        }
    }
}

pub fn record_test_status(status: TestStatus) {
    counter!("quiver_tests_total", "status" => status.as_str()).increment(1);
}

/// Record a completed pool invocation.
pub fn record_pool_run(files: usize, exit_code: i32) {
    counter!("quiver_pool_runs_total").increment(1);
    histogram!("quiver_pool_files").record(files as f64);
    if exit_code != 0 {
        counter!("quiver_pool_failed_runs_total").increment(1);
    }
}
