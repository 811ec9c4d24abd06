//! Per-sandbox log capture.
//!
//! Sandboxed code writes through a [`LogSink`] instead of the process
//! stdout, so concurrently running files never interleave their output.

use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Console call level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Log,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "debug",
            Self::Log => "log",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        })
    }
}

/// One captured console call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Shared, append-only log buffer handed to one sandbox.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, level: LogLevel, message: impl Into<String>) {
        self.entries.lock().push(LogEntry {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn log(&self, message: impl Into<String>) {
        self.push(LogLevel::Log, message);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.push(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Take every captured entry, leaving the sink empty.
    pub fn drain(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.lock())
    }
}

/// Write one file's captured logs, prefixed with the file path.
pub fn replay<W: Write>(path: &Path, entries: &[LogEntry], out: &mut W) -> io::Result<()> {
    for entry in entries {
        writeln!(out, "[{}] {}: {}", path.display(), entry.level, entry.message)?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_one_buffer() {
        let sink = LogSink::new();
        let handle = sink.clone();
        handle.log("from test body");
        sink.warn("from hook");
        assert_eq!(sink.len(), 2);

        let drained = sink.drain();
        assert_eq!(drained[0].level, LogLevel::Log);
        assert_eq!(drained[1].message, "from hook");
        assert!(handle.is_empty());
    }

    #[test]
    fn test_replay_prefixes_path() {
        let sink = LogSink::new();
        sink.info("hello");
        sink.error("bad");
        let mut out = Vec::new();
        replay(Path::new("a.test"), &sink.drain(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "[a.test] info: hello\n[a.test] error: bad\n");
    }
}
