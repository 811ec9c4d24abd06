//! Telemetry: structured logging, spans and metrics.
//!
//! Output goes to stderr, a log file, or an embedder-installed metrics
//! recorder. There are no network dependencies.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{record_file_result, record_pool_run, record_test_status};
pub use spans::{FileSpan, SpanExt};
