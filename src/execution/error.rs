//! File-level error types.
//!
//! These populate `PoolResult::execution_error` and never coexist with a
//! report. Test failures inside a healthy file are recorded in the report.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state::ExecutionState;

/// Error surfaced by the compile service.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompileError {
    #[error("test file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to compile {}: {message}{}", path.display(), location_suffix(location))]
    Build {
        path: PathBuf,
        message: String,
        location: Option<String>,
    },
}

fn location_suffix(location: &Option<String>) -> String {
    location
        .as_deref()
        .map(|l| format!(" ({})", l))
        .unwrap_or_default()
}

/// Error raised by a file's top-level code during registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for ScriptError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for ScriptError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Why a file produced no report.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("{error}")]
    Compile { error: CompileError },

    #[error("sandbox crashed during evaluation: {message}")]
    SandboxCrash { message: String },

    #[error("file timed out: exceeded {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("malformed report: {reason}")]
    MalformedReport { reason: String },

    #[error("execution aborted: {message}")]
    Aborted { message: String },
}

impl ExecutionError {
    pub fn timeout(bound: Duration) -> Self {
        Self::Timeout {
            timeout_ms: bound.as_millis() as u64,
        }
    }

    /// Terminal state a file ends in after this error.
    pub fn state(&self) -> ExecutionState {
        match self {
            Self::Timeout { .. } => ExecutionState::TimedOut,
            _ => ExecutionState::Crashed,
        }
    }

    /// Compile service reported the file missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Compile { error: CompileError::NotFound { .. } })
    }
}

impl From<CompileError> for ExecutionError {
    fn from(error: CompileError) -> Self {
        Self::Compile { error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message_names_bound() {
        let err = ExecutionError::timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "file timed out: exceeded 250 ms");
        assert_eq!(err.state(), ExecutionState::TimedOut);
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let err = ExecutionError::SandboxCrash {
            message: "boom".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "sandbox_crash");
        assert_eq!(json["message"], "boom");
        assert_eq!(err.state(), ExecutionState::Crashed);
    }

    #[test]
    fn test_compile_error_wraps_and_detects_missing_file() {
        let err: ExecutionError = CompileError::NotFound {
            path: PathBuf::from("gone.test"),
        }
        .into();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "test file not found: gone.test");
    }
}
