//! Concurrent file pool.
//!
//! Dispatches one [`ExecutionUnit`] per file, each on its own task so a
//! crash or panic stays inside that file. Results land in a map keyed by
//! path. The pool alone decides the exit code, after every file is
//! accounted for.

mod reporter;
mod watch;

pub use reporter::{JsonReporter, NullReporter, Reporter, SnapshotReporter};
pub use watch::WatchEvent;

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::execution::{Compiler, ExecutionUnit, PoolResult, RunOptions};
use crate::sandbox::replay;
use crate::telemetry;

/// Results of one invocation, keyed by file path.
pub type ResultsMap = BTreeMap<PathBuf, PoolResult>;

/// Pool configuration.
#[derive(Debug, Clone, Default)]
pub struct PoolConfig {
    pub run: RunOptions,
    /// Files executing at once. `None` runs every file concurrently.
    pub max_concurrency: Option<NonZeroUsize>,
    /// Replay each file's captured logs to stderr once it completes.
    pub replay_logs: bool,
}

/// 0 iff every file produced a passing report.
pub fn exit_code(results: &ResultsMap) -> i32 {
    if results.values().all(PoolResult::passed) {
        0
    } else {
        1
    }
}

pub struct Pool {
    unit: Arc<ExecutionUnit>,
    reporter: Arc<dyn Reporter>,
    limiter: Option<Arc<Semaphore>>,
    replay_logs: bool,
    results: RwLock<ResultsMap>,
}

impl Pool {
    pub fn new(compiler: Arc<dyn Compiler>, config: PoolConfig, reporter: Arc<dyn Reporter>) -> Self {
        let unit = ExecutionUnit::new(compiler, config.run.clone());
        Self::with_unit(unit, config, reporter)
    }

    /// Build around a preconfigured unit (custom process snapshot or
    /// extension table). `config.run` is ignored in favour of the unit's.
    pub fn with_unit(unit: ExecutionUnit, config: PoolConfig, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            unit: Arc::new(unit),
            reporter,
            limiter: config
                .max_concurrency
                .map(|n| Arc::new(Semaphore::new(n.get()))),
            replay_logs: config.replay_logs,
            results: RwLock::new(ResultsMap::new()),
        }
    }

    /// Run every file, report the full map once, and return the exit code.
    /// The map is reset at the start of each batch.
    pub async fn run(&self, files: &[PathBuf]) -> i32 {
        let mut seen = BTreeSet::new();
        let files: Vec<&PathBuf> = files.iter().filter(|f| seen.insert(*f)).collect();
        tracing::info!(files = files.len(), "starting test run");

        self.results.write().await.clear();

        let mut pending: FuturesUnordered<_> = files
            .into_iter()
            .map(|path| {
                let path = path.clone();
                let task = self.spawn_file(path.clone());
                async move { (path, task.await) }
            })
            .collect();

        while let Some((path, joined)) = pending.next().await {
            let result = settle_join(&path, joined);
            self.replay(&path, &result);
            self.results.write().await.insert(path, result);
        }

        let results = self.results.read().await;
        self.reporter.report(&results);
        let code = exit_code(&results);
        telemetry::record_pool_run(results.len(), code);
        tracing::info!(
            files = results.len(),
            failed = results.values().filter(|r| !r.passed()).count(),
            exit_code = code,
            "test run finished"
        );
        code
    }

    /// Re-execute one file, replace its entry and report the full map.
    pub async fn exec_incremental(&self, path: &Path) -> PoolResult {
        let result = self.execute_one(path).await;
        let mut results = self.results.write().await;
        results.insert(path.to_path_buf(), result.clone());
        self.reporter.report(&results);
        result
    }

    /// Drop a deleted file's entry and report the remaining map.
    pub async fn remove(&self, path: &Path) -> Option<PoolResult> {
        let mut results = self.results.write().await;
        let removed = results.remove(path);
        self.reporter.report(&results);
        removed
    }

    /// Apply one watch event. A changed file the compiler can no longer
    /// find is treated as deleted. Returns the file's new result, if any.
    pub async fn apply(&self, event: WatchEvent) -> Option<PoolResult> {
        match event {
            WatchEvent::Removed(path) => {
                self.remove(&path).await;
                None
            }
            WatchEvent::Changed(path) => {
                let result = self.execute_one(&path).await;
                let not_found = result.execution_error().is_some_and(|e| e.is_not_found());
                let mut results = self.results.write().await;
                if not_found {
                    tracing::debug!(path = %path.display(), "changed file is gone; removing");
                    results.remove(&path);
                    self.reporter.report(&results);
                    None
                } else {
                    results.insert(path, result.clone());
                    self.reporter.report(&results);
                    Some(result)
                }
            }
        }
    }

    /// Consume watch events until the channel closes or `shutdown` fires.
    pub async fn watch(&self, mut events: mpsc::Receiver<WatchEvent>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    tracing::info!("watch: shutdown signal received");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.apply(event).await;
                    }
                    None => break,
                },
            }
        }
    }

    pub async fn results(&self) -> ResultsMap {
        self.results.read().await.clone()
    }

    pub async fn result(&self, path: &Path) -> Option<PoolResult> {
        self.results.read().await.get(path).cloned()
    }

    pub async fn exit_code(&self) -> i32 {
        exit_code(&*self.results.read().await)
    }

    fn spawn_file(&self, path: PathBuf) -> tokio::task::JoinHandle<PoolResult> {
        let unit = Arc::clone(&self.unit);
        let limiter = self.limiter.clone();
        tokio::spawn(async move {
            // A closed semaphore would only mean the pool is gone.
            let _permit = match &limiter {
                Some(sem) => sem.clone().acquire_owned().await.ok(),
                None => None,
            };
            unit.execute(&path).await
        })
    }

    async fn execute_one(&self, path: &Path) -> PoolResult {
        let joined = self.spawn_file(path.to_path_buf()).await;
        let result = settle_join(path, joined);
        self.replay(path, &result);
        result
    }

    fn replay(&self, path: &Path, result: &PoolResult) {
        if !self.replay_logs || result.logs.is_empty() {
            return;
        }
        let stderr = std::io::stderr();
        let mut out = stderr.lock();
        if let Err(e) = replay(path, &result.logs, &mut out) {
            tracing::warn!(path = %path.display(), error = %e, "failed to replay logs");
        }
    }
}

fn settle_join(path: &Path, joined: Result<PoolResult, tokio::task::JoinError>) -> PoolResult {
    joined.unwrap_or_else(|e| {
        tracing::error!(path = %path.display(), error = %e, "execution task aborted");
        let result = PoolResult::aborted(e.to_string());
        telemetry::record_file_result(&result);
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{ExecutionError, ExecutionState};

    #[test]
    fn test_exit_code_requires_every_report_to_pass() {
        let mut map = ResultsMap::new();
        assert_eq!(exit_code(&map), 0);

        map.insert(PathBuf::from("x.test"), PoolResult::aborted("boom"));
        assert_eq!(exit_code(&map), 1);
        assert_eq!(map[Path::new("x.test")].state, ExecutionState::Crashed);
        assert!(matches!(
            map[Path::new("x.test")].execution_error(),
            Some(ExecutionError::Aborted { .. })
        ));
    }
}
