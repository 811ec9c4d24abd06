//! Reporting boundary.
//!
//! The pool hands the full results map to a [`Reporter`] once per batch
//! run and once after every incremental update.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use super::ResultsMap;

pub trait Reporter: Send + Sync {
    fn report(&self, results: &ResultsMap);
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&self, _results: &ResultsMap) {}
}

/// Writes each map as one JSON document per line.
pub struct JsonReporter<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W: Write + Send> Reporter for JsonReporter<W> {
    fn report(&self, results: &ResultsMap) {
        let mut out = self.out.lock();
        let written = serde_json::to_writer(&mut *out, results)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(out))
            .and_then(|()| out.flush());
        if let Err(e) = written {
            tracing::error!(error = %e, "failed to write JSON report");
        }
    }
}

/// Keeps the most recent map. Useful for watch loops and tests.
#[derive(Debug, Default)]
pub struct SnapshotReporter {
    latest: Mutex<Option<ResultsMap>>,
    count: AtomicUsize,
}

impl SnapshotReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<ResultsMap> {
        self.latest.lock().clone()
    }

    /// Number of times the pool has reported.
    pub fn report_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Reporter for SnapshotReporter {
    fn report(&self, results: &ResultsMap) {
        *self.latest.lock() = Some(results.clone());
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}
