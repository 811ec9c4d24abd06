//! Integration tests for watch-mode incremental execution.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use quiver::execution::{program, StaticCompiler};
use quiver::pool::{Pool, PoolConfig, SnapshotReporter, WatchEvent};
use quiver::suite::{TestFailure, TestReport};
use tokio_util::sync::CancellationToken;

fn deterministic(passing: bool) -> Arc<dyn quiver::execution::TestProgram> {
    program(move |sb| {
        sb.suite().it("adds", || async { Ok(()) });
        sb.suite().it("toggles", move || async move {
            if passing {
                Ok(())
            } else {
                Err(TestFailure::new("expected true"))
            }
        });
        sb.suite().todo("later");
        sb.run();
        Ok(())
    })
}

/// Report with timing fields zeroed, for structural comparison.
fn shape(report: &TestReport) -> TestReport {
    let mut report = report.clone();
    for t in &mut report.tests {
        t.duration_ms = 0.0;
    }
    for h in &mut report.hooks {
        h.duration_ms = 0.0;
    }
    report
}

fn setup() -> (Arc<StaticCompiler>, Pool, Arc<SnapshotReporter>) {
    let compiler = Arc::new(StaticCompiler::new());
    let reporter = Arc::new(SnapshotReporter::new());
    let pool = Pool::new(compiler.clone(), PoolConfig::default(), reporter.clone());
    (compiler, pool, reporter)
}

#[tokio::test]
async fn test_exec_incremental_is_idempotent() {
    let (compiler, pool, _) = setup();
    compiler.register("a.test", deterministic(true));

    let first = pool.exec_incremental(Path::new("a.test")).await;
    let second = pool.exec_incremental(Path::new("a.test")).await;
    assert_eq!(shape(first.report().unwrap()), shape(second.report().unwrap()));
    assert_eq!(pool.results().await.len(), 1);
}

#[tokio::test]
async fn test_incremental_update_reports_full_map() {
    let (compiler, pool, reporter) = setup();
    compiler.register("a.test", deterministic(true));
    compiler.register("b.test", deterministic(true));
    let files = vec![PathBuf::from("a.test"), PathBuf::from("b.test")];
    assert_eq!(pool.run(&files).await, 0);

    compiler.register("b.test", deterministic(false));
    let updated = pool.exec_incremental(Path::new("b.test")).await;
    assert!(!updated.passed());

    let latest = reporter.latest().unwrap();
    assert_eq!(latest.len(), 2, "reporter must see every file, not just the changed one");
    assert!(latest[Path::new("a.test")].passed());
    assert_eq!(reporter.report_count(), 2);
    assert_eq!(pool.exit_code().await, 1);
}

#[tokio::test]
async fn test_incremental_inserts_new_file() {
    let (compiler, pool, _) = setup();
    compiler.register("new.test", deterministic(true));
    assert!(pool.result(Path::new("new.test")).await.is_none());
    pool.exec_incremental(Path::new("new.test")).await;
    assert!(pool.result(Path::new("new.test")).await.is_some());
}

#[tokio::test]
async fn test_removed_event_drops_entry() {
    let (compiler, pool, reporter) = setup();
    compiler.register("a.test", deterministic(true));
    compiler.register("b.test", deterministic(false));
    pool.run(&[PathBuf::from("a.test"), PathBuf::from("b.test")]).await;
    assert_eq!(pool.exit_code().await, 1);

    assert!(pool.apply(WatchEvent::Removed(PathBuf::from("b.test"))).await.is_none());
    let latest = reporter.latest().unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(pool.exit_code().await, 0);
}

#[tokio::test]
async fn test_changed_event_for_deleted_file_removes_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("disk.test");
    std::fs::write(&path, "// test file").unwrap();

    let compiler = Arc::new(StaticCompiler::new().require_on_disk(true));
    compiler.register(&path, deterministic(true));
    let reporter = Arc::new(SnapshotReporter::new());
    let pool = Pool::new(compiler.clone(), PoolConfig::default(), reporter.clone());

    let result = pool.apply(WatchEvent::Changed(path.clone())).await;
    assert!(result.unwrap().passed());
    assert_eq!(pool.results().await.len(), 1);

    std::fs::remove_file(&path).unwrap();
    assert!(pool.apply(WatchEvent::Changed(path.clone())).await.is_none());
    assert!(pool.results().await.is_empty());
    assert!(reporter.latest().unwrap().is_empty());
}

#[tokio::test]
async fn test_watch_loop_applies_events_until_shutdown() {
    let (compiler, pool, reporter) = setup();
    compiler.register("a.test", deterministic(true));
    let pool = Arc::new(pool);
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let shutdown = CancellationToken::new();

    let watcher = {
        let pool = Arc::clone(&pool);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { pool.watch(rx, shutdown).await })
    };

    tx.send(WatchEvent::Changed(PathBuf::from("a.test"))).await.unwrap();
    for _ in 0..100 {
        if reporter.report_count() > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(pool.result(Path::new("a.test")).await.is_some());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), watcher)
        .await
        .expect("watch loop stops on shutdown")
        .unwrap();
}
