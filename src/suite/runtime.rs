//! Registration surface of the per-file suite.
//!
//! Registration is synchronous and happens while the file's program is
//! evaluated. [`SuiteRuntime::run`] consumes the registrations exactly once.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;

use super::descriptor::{body, Condition, HookDescriptor, HookKind, Hooks, TestDescriptor, TestOptions};
use super::each::format_title;
use super::executor::Executor;
use super::outcome::{TestFailure, TestReport};
use crate::bench::BenchOptions;

/// Default bound for a single test or hook body.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Suite-wide defaults.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    /// Report description, usually the file path.
    pub description: String,
    /// Bound for bodies that do not set their own timeout.
    pub default_timeout: Duration,
    /// Options for `bench` tests without an override.
    pub bench: BenchOptions,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            description: String::new(),
            default_timeout: DEFAULT_TEST_TIMEOUT,
            bench: BenchOptions::default(),
        }
    }
}

/// One file's registered tests and hooks.
#[derive(Debug)]
pub struct SuiteRuntime {
    config: SuiteConfig,
    tests: Vec<TestDescriptor>,
    hooks: Hooks,
}

impl SuiteRuntime {
    pub fn new(config: SuiteConfig) -> Self {
        Self {
            config,
            tests: Vec::new(),
            hooks: Hooks::default(),
        }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn tests(&self) -> &[TestDescriptor] {
        &self.tests
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Register a test with explicit options.
    pub fn test<F, Fut>(&mut self, description: impl Into<String>, options: TestOptions, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.tests.push(TestDescriptor {
            description: description.into(),
            body: Some(body(f)),
            options,
        });
        self
    }

    pub fn it<F, Fut>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.test(description, TestOptions::new(), f)
    }

    /// Register a test that runs in the exclusive set.
    pub fn only<F, Fut>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.test(description, TestOptions::new().only(), f)
    }

    pub fn skip<F, Fut>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.test(description, TestOptions::new().skip(), f)
    }

    /// Register a placeholder with no body.
    pub fn todo(&mut self, description: impl Into<String>) -> &mut Self {
        self.tests.push(TestDescriptor {
            description: description.into(),
            body: None,
            options: TestOptions::new().todo(),
        });
        self
    }

    pub fn retry<F, Fut>(&mut self, count: u32, description: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.test(description, TestOptions::new().retry(count), f)
    }

    /// Register a test gated on `condition`.
    pub fn it_if<F, Fut>(&mut self, condition: impl Into<Condition>, description: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.test(description, TestOptions::new().when(condition), f)
    }

    /// Register a soft-fail test: a failure is recorded but never fails the file.
    pub fn should<F, Fut>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.test(description, TestOptions::new().soft_fail(), f)
    }

    /// Register a test that runs after the parallel batch, in order.
    pub fn sequence<F, Fut>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.test(description, TestOptions::new().sequential(), f)
    }

    pub fn sequence_only<F, Fut>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.test(description, TestOptions::new().sequential().only(), f)
    }

    /// Register a benchmark with the suite's default bench options.
    pub fn bench<F, Fut>(&mut self, description: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.test(description, TestOptions::new().bench(), f)
    }

    pub fn bench_with<F, Fut>(&mut self, description: impl Into<String>, options: BenchOptions, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.test(description, TestOptions::new().bench_with(options), f)
    }

    /// Register one test per table row. See [`format_title`] for placeholders.
    pub fn each<T, I, F, Fut>(&mut self, table: I, title: &str, f: F) -> &mut Self
    where
        I: IntoIterator<Item = T>,
        T: Serialize + Clone + Send + Sync + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        let f = std::sync::Arc::new(f);
        for (index, row) in table.into_iter().enumerate() {
            let description = format_title(title, &row, index);
            let f = std::sync::Arc::clone(&f);
            self.test(description, TestOptions::new(), move || (*f)(row.clone()));
        }
        self
    }

    pub fn before_all<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.hook(HookKind::BeforeAll, None, f)
    }

    pub fn before_each<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.hook(HookKind::BeforeEach, None, f)
    }

    pub fn after_all<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.hook(HookKind::AfterAll, None, f)
    }

    pub fn after_each<F, Fut>(&mut self, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        self.hook(HookKind::AfterEach, None, f)
    }

    /// Register a hook of any kind with an optional timeout.
    /// A later hook of the same kind replaces the earlier one.
    pub fn hook<F, Fut>(&mut self, kind: HookKind, timeout: Option<Duration>, f: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TestFailure>> + Send + 'static,
    {
        let replaced = self.hooks.set(HookDescriptor {
            kind,
            body: body(f),
            timeout,
        });
        if replaced {
            tracing::warn!(suite = %self.config.description, hook = %kind, "hook registered twice; keeping the last one");
        }
        self
    }

    /// Execute the plan and produce the report.
    pub async fn run(self) -> TestReport {
        let Self { config, tests, hooks } = self;
        Executor::new(&config, &hooks).run(&tests).await
    }
}
