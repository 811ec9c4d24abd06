//! Span utilities and extension traits.

use std::path::Path;

use tracing::{info_span, Span};
use uuid::Uuid;

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for the per-file execution span.
pub struct FileSpan;

impl FileSpan {
    /// Fields filled in later:
    /// - `status` and `error.message` by `SpanExt::record_result`
    /// - `state`: terminal execution state
    /// - `duration_ms` and `compile_ms` after completion
    pub fn new(path: &Path, sandbox_id: Uuid) -> Span {
        info_span!(
            "file_execution",
            path = %path.display(),
            sandbox_id = %sandbox_id,
            status = tracing::field::Empty,
            state = tracing::field::Empty,
            error.message = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
            compile_ms = tracing::field::Empty,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_result_on_disabled_span_is_noop() {
        let span = FileSpan::new(Path::new("a.test"), Uuid::new_v4());
        span.record_result::<(), _>(&Err("boom"));
        span.record("state", "crashed");
    }
}
