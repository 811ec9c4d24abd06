//! Per-file execution context.
//!
//! A [`Sandbox`] is the explicit injection table handed to one compiled
//! test file: a process snapshot, a log sink, timers, the embedder's
//! capability table, and the suite registration surface. It is built fresh
//! for every execution and discarded afterwards.

mod console;
mod extensions;
mod mock;
mod process;
mod timers;

pub use console::{replay, LogEntry, LogLevel, LogSink};
pub use extensions::Extensions;
pub use mock::MockFn;
pub use process::ProcessSnapshot;
pub use timers::{TimerHandle, Timers};

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::suite::{SuiteConfig, SuiteRuntime};

/// Isolated context for one test file.
#[derive(Debug)]
pub struct Sandbox {
    id: Uuid,
    path: PathBuf,
    process: ProcessSnapshot,
    console: LogSink,
    timers: Timers,
    extensions: Extensions,
    suite: SuiteRuntime,
    run_requested: bool,
}

impl Sandbox {
    pub fn new(
        path: impl Into<PathBuf>,
        process: ProcessSnapshot,
        extensions: Extensions,
        suite: SuiteConfig,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), path, process, extensions, suite)
    }

    pub(crate) fn with_id(
        id: Uuid,
        path: impl Into<PathBuf>,
        process: ProcessSnapshot,
        extensions: Extensions,
        suite: SuiteConfig,
    ) -> Self {
        Self {
            id,
            path: path.into(),
            process,
            console: LogSink::new(),
            timers: Timers::new(),
            extensions,
            suite: SuiteRuntime::new(suite),
            run_requested: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Path of the file this sandbox executes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn process(&self) -> &ProcessSnapshot {
        &self.process
    }

    /// Console substitute. Clones share the sandbox's buffer.
    pub fn console(&self) -> &LogSink {
        &self.console
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Token cancelled when the file completes or is abandoned.
    pub fn cancellation(&self) -> CancellationToken {
        self.timers.cancellation()
    }

    /// Registration surface: `it`, `bench`, `each`, hooks and the rest.
    pub fn suite(&mut self) -> &mut SuiteRuntime {
        &mut self.suite
    }

    /// Fresh mock function for this file.
    pub fn mock<A, R>(&self) -> MockFn<A, R>
    where
        A: Clone,
        R: Clone + Default,
    {
        MockFn::new()
    }

    /// Request execution of everything registered so far.
    pub fn run(&mut self) {
        if self.run_requested {
            tracing::warn!(path = %self.path.display(), "run() called more than once; ignoring");
        }
        self.run_requested = true;
    }

    pub fn run_requested(&self) -> bool {
        self.run_requested
    }

    pub(crate) fn into_parts(self) -> SandboxParts {
        SandboxParts {
            suite: self.suite,
            run_requested: self.run_requested,
            console: self.console,
            timers: self.timers,
        }
    }
}

/// What the execution unit keeps after evaluation.
pub(crate) struct SandboxParts {
    pub suite: SuiteRuntime,
    pub run_requested: bool,
    pub console: LogSink,
    pub timers: Timers,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Sandbox {
        Sandbox::new("math.test", ProcessSnapshot::empty(), Extensions::new(), SuiteConfig::default())
    }

    #[test]
    fn test_fresh_sandboxes_are_distinct() {
        let a = sandbox();
        let b = sandbox();
        assert_ne!(a.id(), b.id());
        a.console().log("only in a");
        assert!(b.console().is_empty());
    }

    #[test]
    fn test_registration_and_run_request() {
        let mut sb = sandbox();
        sb.suite().it("adds", || async { Ok(()) });
        sb.suite().todo("later");
        assert!(!sb.run_requested());
        sb.run();
        sb.run();

        let parts = sb.into_parts();
        assert!(parts.run_requested);
        assert_eq!(parts.suite.tests().len(), 2);
    }

    #[test]
    fn test_mock_factory_records_calls() {
        let sb = sandbox();
        let f = sb.mock::<u8, u8>();
        f.returns(1);
        assert_eq!(f.call(9).unwrap(), 1);
        assert_eq!(f.calls(), vec![9]);
    }
}
