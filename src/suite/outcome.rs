//! Outcomes, aggregate statistics and the per-file report.

use std::any::Any;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::descriptor::HookKind;
use crate::bench::BenchmarkMetrics;

/// Recorded failure of a test or hook body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl TestFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Convert any displayable error, keeping its source chain as the stack.
    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(s) = source {
            chain.push(format!("caused by: {}", s));
            source = s.source();
        }
        Self {
            message: err.to_string(),
            stack: (!chain.is_empty()).then(|| chain.join("\n")),
        }
    }

    /// Failure for a body that outlived its bound.
    pub fn timed_out(what: &str, bound: Duration) -> Self {
        Self::new(format!("{} timed out: exceeded {} ms", what, bound.as_millis()))
    }

    /// Failure for a body that panicked.
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let detail = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new(format!("panicked: {}", detail))
    }
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TestFailure {}

impl From<String> for TestFailure {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for TestFailure {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Final status of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Softfailed,
    Skipped,
    Todo,
    Benched,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Softfailed => "softfailed",
            Self::Skipped => "skipped",
            Self::Todo => "todo",
            Self::Benched => "benched",
        }
    }
}

/// Result of one test after all retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOutcome {
    pub description: String,
    pub status: TestStatus,
    pub retries: u32,
    /// Wall-clock milliseconds, including bracketing hooks.
    #[serde(rename = "duration")]
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<BenchmarkMetrics>,
}

impl TestOutcome {
    /// Outcome for a test that never ran its body.
    pub fn not_run(description: impl Into<String>, status: TestStatus) -> Self {
        Self {
            description: description.into(),
            status,
            retries: 0,
            duration_ms: 0.0,
            error: None,
            benchmark: None,
        }
    }
}

/// Status of one hook run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookStatus {
    Passed,
    Failed,
}

/// Result of one hook run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutcome {
    pub kind: HookKind,
    pub status: HookStatus,
    #[serde(rename = "duration")]
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestFailure>,
    /// Test bracketed by a `beforeEach`/`afterEach` run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
}

/// Aggregate counts for one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub softfailed: usize,
    pub todo: usize,
    /// Failed hook runs. Informational; not part of `total`.
    #[serde(default)]
    pub hooks_failed: usize,
}

impl Stats {
    /// Pure fold over test and hook outcomes.
    pub fn fold(tests: &[TestOutcome], hooks: &[HookOutcome]) -> Self {
        let mut stats = tests.iter().fold(Stats::default(), |mut acc, t| {
            acc.total += 1;
            match t.status {
                TestStatus::Passed | TestStatus::Benched => acc.passed += 1,
                TestStatus::Failed => acc.failed += 1,
                TestStatus::Softfailed => acc.softfailed += 1,
                TestStatus::Skipped => acc.skipped += 1,
                TestStatus::Todo => acc.todo += 1,
            }
            acc
        });
        stats.hooks_failed = hooks
            .iter()
            .filter(|h| h.status == HookStatus::Failed)
            .count();
        stats
    }

    /// Sum of all per-status buckets.
    pub fn accounted(&self) -> usize {
        self.passed + self.failed + self.skipped + self.softfailed + self.todo
    }
}

/// Overall status of one file's report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Passed,
    Failed,
}

/// Everything one file's suite produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub description: String,
    pub status: ReportStatus,
    pub stats: Stats,
    pub tests: Vec<TestOutcome>,
    pub hooks: Vec<HookOutcome>,
}

impl TestReport {
    /// Build a report; stats and status are derived, never supplied.
    pub fn new(description: impl Into<String>, tests: Vec<TestOutcome>, hooks: Vec<HookOutcome>) -> Self {
        let stats = Stats::fold(&tests, &hooks);
        let status = if stats.failed > 0 {
            ReportStatus::Failed
        } else {
            ReportStatus::Passed
        };
        Self {
            description: description.into(),
            status,
            stats,
            tests,
            hooks,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ReportStatus::Passed
    }

    /// Check the structural invariants a report must satisfy before it is
    /// trusted. Returns a description of the first violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.stats.total != self.tests.len() {
            return Err(format!(
                "stats.total is {} but the report lists {} tests",
                self.stats.total,
                self.tests.len()
            ));
        }
        if self.stats.accounted() != self.stats.total {
            return Err(format!(
                "status buckets sum to {} but stats.total is {}",
                self.stats.accounted(),
                self.stats.total
            ));
        }
        let expected = if self.stats.failed > 0 {
            ReportStatus::Failed
        } else {
            ReportStatus::Passed
        };
        if self.status != expected {
            return Err(format!(
                "status {:?} disagrees with {} failed tests",
                self.status, self.stats.failed
            ));
        }
        if self.stats != Stats::fold(&self.tests, &self.hooks) {
            return Err("stats do not match the listed outcomes".to_string());
        }
        Ok(())
    }
}
