//! Per-file suite runtime.
//!
//! Resolves one file's registered tests and hooks into an ordered execution
//! plan and produces a [`TestReport`]. Runs inside the file's sandbox.

mod descriptor;
mod each;
mod executor;
mod outcome;
mod runtime;

pub use descriptor::{
    body, BodyFuture, Condition, HookDescriptor, HookKind, Hooks, TestBody, TestDescriptor, TestOptions,
};
pub use each::format_title;
pub use outcome::{
    HookOutcome, HookStatus, ReportStatus, Stats, TestFailure, TestOutcome, TestReport, TestStatus,
};
pub use runtime::{SuiteConfig, SuiteRuntime, DEFAULT_TEST_TIMEOUT};
