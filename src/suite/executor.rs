//! Execution plan for one suite.
//!
//! Order: exclusivity filter, `beforeAll`, the parallel batch, the
//! sequential tests in registration order, `afterAll`. `beforeEach` and
//! `afterEach` bracket every test whose body runs.

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::future::{join_all, FutureExt};
use parking_lot::Mutex;

use super::descriptor::{invoke, BodyFuture, HookDescriptor, HookKind, Hooks, TestBody, TestDescriptor};
use super::outcome::{HookOutcome, HookStatus, TestFailure, TestOutcome, TestReport, TestStatus};
use super::runtime::SuiteConfig;
use crate::bench::{BenchEngine, BenchOptions, BenchmarkMetrics};

type HookFailure = (HookKind, TestFailure);

pub(crate) struct Executor<'a> {
    config: &'a SuiteConfig,
    hooks: &'a Hooks,
    hook_outcomes: Mutex<Vec<HookOutcome>>,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(config: &'a SuiteConfig, hooks: &'a Hooks) -> Self {
        Self {
            config,
            hooks,
            hook_outcomes: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn run(self, tests: &[TestDescriptor]) -> TestReport {
        let exclusive = tests.iter().any(|t| t.options.only);
        let mut outcomes: Vec<Option<TestOutcome>> = vec![None; tests.len()];
        let mut parallel = Vec::new();
        let mut sequential = Vec::new();

        for (i, test) in tests.iter().enumerate() {
            if exclusive && !test.options.only {
                outcomes[i] = Some(TestOutcome::not_run(&test.description, TestStatus::Skipped));
            } else if test.options.sequential {
                sequential.push(i);
            } else {
                parallel.push(i);
            }
        }

        let before_all = match &self.hooks.before_all {
            Some(hook) => self
                .run_hook(hook, None)
                .await
                .err()
                .map(|f| (HookKind::BeforeAll, f)),
            None => None,
        };

        let batch = join_all(
            parallel
                .iter()
                .map(|&i| self.run_test(&tests[i], before_all.as_ref())),
        )
        .await;
        for (&i, outcome) in parallel.iter().zip(batch) {
            outcomes[i] = Some(outcome);
        }

        for &i in &sequential {
            outcomes[i] = Some(self.run_test(&tests[i], before_all.as_ref()).await);
        }

        if let Some(hook) = &self.hooks.after_all {
            let _ = self.run_hook(hook, None).await;
        }

        let tests: Vec<TestOutcome> = outcomes.into_iter().flatten().collect();
        let report = TestReport::new(&self.config.description, tests, self.hook_outcomes.into_inner());
        tracing::debug!(
            suite = %report.description,
            total = report.stats.total,
            failed = report.stats.failed,
            "suite finished"
        );
        report
    }

    async fn run_test(&self, test: &TestDescriptor, before_all: Option<&HookFailure>) -> TestOutcome {
        let opts = &test.options;

        if opts.skip {
            return TestOutcome::not_run(&test.description, TestStatus::Skipped);
        }
        let bound = opts.timeout.unwrap_or(self.config.default_timeout);
        if let Some(condition) = &opts.condition {
            match condition.evaluate(bound).await {
                Ok(true) => {}
                Ok(false) => return TestOutcome::not_run(&test.description, TestStatus::Skipped),
                Err(failure) => return settle(test, Some(failure), 0, None, 0.0),
            }
        }
        let body = match (&test.body, opts.todo) {
            (Some(body), false) => body,
            _ => return TestOutcome::not_run(&test.description, TestStatus::Todo),
        };

        let started = Instant::now();
        let mut hook_failure = before_all.cloned();

        if let Some(hook) = &self.hooks.before_each {
            if let Err(f) = self.run_hook(hook, Some(&test.description)).await {
                hook_failure.get_or_insert((HookKind::BeforeEach, f));
            }
        }

        let (result, retries, benchmark) = if opts.bench {
            let options = opts.bench_options.as_ref().unwrap_or(&self.config.bench);
            let (result, metrics) = run_bench(body, bound, options).await;
            (result, 0, metrics)
        } else {
            let (result, retries) = run_with_retry(body, bound, opts.retry, &test.description).await;
            (result, retries, None)
        };

        if let Some(hook) = &self.hooks.after_each {
            if let Err(f) = self.run_hook(hook, Some(&test.description)).await {
                hook_failure.get_or_insert((HookKind::AfterEach, f));
            }
        }

        let error = attribute(result, hook_failure);
        settle(test, error, retries, benchmark, elapsed_ms(started))
    }

    async fn run_hook(&self, hook: &HookDescriptor, test: Option<&str>) -> Result<(), TestFailure> {
        let bound = hook.timeout.unwrap_or(self.config.default_timeout);
        let started = Instant::now();
        let result = guarded(invoke(&hook.body), bound, "Hook").await;

        if let Err(e) = &result {
            tracing::warn!(
                suite = %self.config.description,
                hook = %hook.kind,
                error = %e,
                "hook failed"
            );
        }
        self.hook_outcomes.lock().push(HookOutcome {
            kind: hook.kind,
            status: if result.is_ok() { HookStatus::Passed } else { HookStatus::Failed },
            duration_ms: elapsed_ms(started),
            error: result.as_ref().err().cloned(),
            test: test.map(str::to_string),
        });
        result
    }
}

/// Race one body invocation against its bound, containing panics.
async fn guarded(fut: BodyFuture, bound: Duration, what: &str) -> Result<(), TestFailure> {
    match tokio::time::timeout(bound, AssertUnwindSafe(fut).catch_unwind()).await {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(TestFailure::panicked(payload)),
        Err(_) => Err(TestFailure::timed_out(what, bound)),
    }
}

/// Invoke, then re-invoke immediately up to `retry` more times.
/// Returns the last attempt's result and the re-attempts made.
async fn run_with_retry(
    body: &TestBody,
    bound: Duration,
    retry: u32,
    description: &str,
) -> (Result<(), TestFailure>, u32) {
    let mut retries = 0;
    loop {
        match guarded(invoke(body), bound, "Test").await {
            Ok(()) => return (Ok(()), retries),
            Err(e) if retries < retry => {
                tracing::debug!(test = description, attempt = retries + 1, error = %e, "retrying test");
                retries += 1;
            }
            Err(e) => return (Err(e), retries),
        }
    }
}

/// Why the bench engine stopped invoking the body early.
enum BenchStop {
    Failed(TestFailure),
    Deadline,
}

/// Hand the body to the bench engine under the test bound. The bench budget
/// is clamped to the bound and every invocation races the same deadline, so
/// samples taken before the bound are kept. The first body error stops
/// further invocations and fails the test.
async fn run_bench(
    body: &TestBody,
    bound: Duration,
    options: &BenchOptions,
) -> (Result<(), TestFailure>, Option<BenchmarkMetrics>) {
    let deadline = tokio::time::Instant::now() + bound;
    let budget = BenchOptions {
        timeout: options.timeout.min(bound),
        ..options.clone()
    };

    let candidate = || {
        let fut = invoke(body);
        async move {
            match tokio::time::timeout_at(deadline, AssertUnwindSafe(fut).catch_unwind()).await {
                Ok(Ok(Ok(()))) => Ok(()),
                Ok(Ok(Err(e))) => Err(BenchStop::Failed(e)),
                Ok(Err(payload)) => Err(BenchStop::Failed(TestFailure::panicked(payload))),
                Err(_) => Err(BenchStop::Deadline),
            }
        }
    };

    match BenchEngine::try_run(candidate, &budget).await {
        Err(config) => (Err(TestFailure::from_error(config)), None),
        Ok((metrics, None)) => (Ok(()), Some(metrics)),
        Ok((metrics, Some(BenchStop::Failed(e)))) => (Err(e), Some(metrics)),
        Ok((mut metrics, Some(BenchStop::Deadline))) => {
            metrics.timed_out = true;
            if metrics.samples == 0 {
                (Err(TestFailure::timed_out("Benchmark", bound)), Some(metrics))
            } else {
                (Ok(()), Some(metrics))
            }
        }
    }
}

/// Merge the body result with a failed bracketing hook.
fn attribute(result: Result<(), TestFailure>, hook: Option<HookFailure>) -> Option<TestFailure> {
    match (result, hook) {
        (Ok(()), None) => None,
        (Err(e), None) => Some(e),
        (Ok(()), Some((kind, f))) => Some(TestFailure {
            message: format!("{} hook failed: {}", kind, f.message),
            stack: f.stack,
        }),
        (Err(e), Some((kind, f))) => {
            let note = format!("{} hook failed: {}", kind, f.message);
            let stack = match e.stack {
                Some(s) => format!("{}\n{}", s, note),
                None => note,
            };
            Some(TestFailure {
                message: e.message,
                stack: Some(stack),
            })
        }
    }
}

fn settle(
    test: &TestDescriptor,
    error: Option<TestFailure>,
    retries: u32,
    benchmark: Option<BenchmarkMetrics>,
    duration_ms: f64,
) -> TestOutcome {
    let status = match (&error, test.options.soft_fail) {
        (None, _) if test.options.bench => TestStatus::Benched,
        (None, _) => TestStatus::Passed,
        (Some(_), true) => TestStatus::Softfailed,
        (Some(_), false) => TestStatus::Failed,
    };
    TestOutcome {
        description: test.description.clone(),
        status,
        retries,
        duration_ms,
        error,
        benchmark,
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_names_hook_when_body_passed() {
        let err = attribute(Ok(()), Some((HookKind::BeforeAll, TestFailure::new("db down")))).unwrap();
        assert_eq!(err.message, "beforeAll hook failed: db down");
    }

    #[test]
    fn test_attribute_keeps_body_error_and_notes_hook() {
        let err = attribute(
            Err(TestFailure::new("assertion")),
            Some((HookKind::BeforeEach, TestFailure::new("setup"))),
        )
        .unwrap();
        assert_eq!(err.message, "assertion");
        assert_eq!(err.stack.as_deref(), Some("beforeEach hook failed: setup"));
    }

    #[test]
    fn test_attribute_clean_run() {
        assert!(attribute(Ok(()), None).is_none());
    }

    #[tokio::test]
    async fn test_guarded_converts_panic() {
        let fut: BodyFuture = async {
            if true {
                panic!("kaboom");
            }
            Ok::<(), TestFailure>(())
        }
        .boxed();
        let err = guarded(fut, Duration::from_secs(1), "Test").await.unwrap_err();
        assert_eq!(err.message, "panicked: kaboom");
    }

    #[tokio::test]
    async fn test_guarded_times_out() {
        let fut: BodyFuture = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), TestFailure>(())
        }
        .boxed();
        let err = guarded(fut, Duration::from_millis(20), "Test").await.unwrap_err();
        assert_eq!(err.message, "Test timed out: exceeded 20 ms");
    }
}
