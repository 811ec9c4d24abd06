//! Registered tests and hooks.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use super::outcome::TestFailure;
use crate::bench::BenchOptions;

/// Future returned by one invocation of a test or hook body.
pub type BodyFuture = BoxFuture<'static, Result<(), TestFailure>>;

/// Re-invocable test or hook body.
pub type TestBody = Arc<dyn Fn() -> BodyFuture + Send + Sync>;

/// Wrap an async closure into a [`TestBody`].
pub fn body<F, Fut>(f: F) -> TestBody
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Call a body, turning a panic raised before the first poll into a failed future.
pub(crate) fn invoke(body: &TestBody) -> BodyFuture {
    match std::panic::catch_unwind(AssertUnwindSafe(|| body())) {
        Ok(fut) => fut,
        Err(payload) => futures::future::ready(Err(TestFailure::panicked(payload))).boxed(),
    }
}

/// Run-time gate for a test.
#[derive(Clone)]
pub enum Condition {
    Value(bool),
    Predicate(Arc<dyn Fn() -> bool + Send + Sync>),
    Async(Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>),
}

impl Condition {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        Self::Async(Arc::new(move || f().boxed()))
    }

    /// Evaluate the gate. A panicking predicate is reported as a failure,
    /// and an async gate still pending after `bound` as a timeout.
    pub async fn evaluate(&self, bound: Duration) -> Result<bool, TestFailure> {
        match self {
            Self::Value(v) => Ok(*v),
            Self::Predicate(f) => std::panic::catch_unwind(AssertUnwindSafe(|| f()))
                .map_err(|p| condition_panic(TestFailure::panicked(p))),
            Self::Async(f) => {
                let fut = std::panic::catch_unwind(AssertUnwindSafe(|| f()))
                    .map_err(|p| condition_panic(TestFailure::panicked(p)))?;
                match tokio::time::timeout(bound, AssertUnwindSafe(fut).catch_unwind()).await {
                    Ok(gate) => gate.map_err(|p| condition_panic(TestFailure::panicked(p))),
                    Err(_) => Err(TestFailure::timed_out("Condition", bound)),
                }
            }
        }
    }
}

fn condition_panic(failure: TestFailure) -> TestFailure {
    TestFailure::new(format!("condition {}", failure.message))
}

impl From<bool> for Condition {
    fn from(v: bool) -> Self {
        Self::Value(v)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
            Self::Async(_) => f.write_str("Async(..)"),
        }
    }
}

/// Per-test options. Built fluently: `TestOptions::new().retry(2).soft_fail()`.
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    pub timeout: Option<Duration>,
    pub skip: bool,
    pub condition: Option<Condition>,
    pub soft_fail: bool,
    pub retry: u32,
    pub sequential: bool,
    pub bench: bool,
    /// Overrides the suite's default benchmark options.
    pub bench_options: Option<BenchOptions>,
    pub todo: bool,
    pub only: bool,
}

impl TestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    pub fn when(mut self, condition: impl Into<Condition>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn soft_fail(mut self) -> Self {
        self.soft_fail = true;
        self
    }

    pub fn retry(mut self, count: u32) -> Self {
        self.retry = count;
        self
    }

    pub fn sequential(mut self) -> Self {
        self.sequential = true;
        self
    }

    pub fn bench(mut self) -> Self {
        self.bench = true;
        self
    }

    pub fn bench_with(mut self, options: BenchOptions) -> Self {
        self.bench = true;
        self.bench_options = Some(options);
        self
    }

    pub fn todo(mut self) -> Self {
        self.todo = true;
        self
    }

    pub fn only(mut self) -> Self {
        self.only = true;
        self
    }
}

/// A registered test.
#[derive(Clone)]
pub struct TestDescriptor {
    pub description: String,
    /// `None` only for `todo` placeholders.
    pub body: Option<TestBody>,
    pub options: TestOptions,
}

impl fmt::Debug for TestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestDescriptor")
            .field("description", &self.description)
            .field("options", &self.options)
            .finish()
    }
}

/// Lifecycle hook kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HookKind {
    BeforeAll,
    BeforeEach,
    AfterAll,
    AfterEach,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BeforeAll => "beforeAll",
            Self::BeforeEach => "beforeEach",
            Self::AfterAll => "afterAll",
            Self::AfterEach => "afterEach",
        })
    }
}

/// A registered hook.
#[derive(Clone)]
pub struct HookDescriptor {
    pub kind: HookKind,
    pub body: TestBody,
    pub timeout: Option<Duration>,
}

impl fmt::Debug for HookDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDescriptor")
            .field("kind", &self.kind)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// At most one hook of each kind.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    pub before_all: Option<HookDescriptor>,
    pub before_each: Option<HookDescriptor>,
    pub after_all: Option<HookDescriptor>,
    pub after_each: Option<HookDescriptor>,
}

impl Hooks {
    /// Store a hook, replacing any earlier one of the same kind.
    /// Returns `true` when a previous registration was replaced.
    pub fn set(&mut self, hook: HookDescriptor) -> bool {
        let slot = match hook.kind {
            HookKind::BeforeAll => &mut self.before_all,
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterAll => &mut self.after_all,
            HookKind::AfterEach => &mut self.after_each,
        };
        slot.replace(hook).is_some()
    }
}
