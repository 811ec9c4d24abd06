//! Per-file result envelope handed to reporters.

use serde::{Deserialize, Serialize};

use super::compile::SourceMap;
use super::error::ExecutionError;
use super::state::ExecutionState;
use crate::sandbox::LogEntry;
use crate::suite::TestReport;

/// Exactly one of a report or an execution error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileOutcome {
    Report(TestReport),
    ExecutionError(ExecutionError),
}

/// What one file produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolResult {
    #[serde(flatten)]
    pub outcome: FileOutcome,
    /// Wall time of the whole unit, compile included.
    #[serde(rename = "duration")]
    pub duration_ms: f64,
    #[serde(rename = "compileDuration")]
    pub compile_duration_ms: f64,
    pub logs: Vec<LogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_map: Option<SourceMap>,
    pub state: ExecutionState,
}

impl PoolResult {
    pub(crate) fn from_outcome(
        outcome: Result<TestReport, ExecutionError>,
        duration_ms: f64,
        compile_duration_ms: f64,
        logs: Vec<LogEntry>,
        source_map: Option<SourceMap>,
    ) -> Self {
        let (outcome, state) = match outcome {
            Ok(report) => (FileOutcome::Report(report), ExecutionState::Completed),
            Err(e) => {
                let state = e.state();
                (FileOutcome::ExecutionError(e), state)
            }
        };
        Self {
            outcome,
            duration_ms,
            compile_duration_ms,
            logs,
            source_map,
            state,
        }
    }

    /// Result for a unit whose task died before producing anything.
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::from_outcome(
            Err(ExecutionError::Aborted {
                message: message.into(),
            }),
            0.0,
            0.0,
            Vec::new(),
            None,
        )
    }

    pub fn report(&self) -> Option<&TestReport> {
        match &self.outcome {
            FileOutcome::Report(r) => Some(r),
            FileOutcome::ExecutionError(_) => None,
        }
    }

    pub fn execution_error(&self) -> Option<&ExecutionError> {
        match &self.outcome {
            FileOutcome::ExecutionError(e) => Some(e),
            FileOutcome::Report(_) => None,
        }
    }

    pub fn as_result(&self) -> Result<&TestReport, &ExecutionError> {
        match &self.outcome {
            FileOutcome::Report(r) => Ok(r),
            FileOutcome::ExecutionError(e) => Err(e),
        }
    }

    /// A file passes only with a report whose status is passed.
    pub fn passed(&self) -> bool {
        self.report().is_some_and(TestReport::passed)
    }
}
