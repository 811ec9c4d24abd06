//! Per-file execution state machine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of one file: Pending -> Compiling -> Running -> terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExecutionState {
    Pending,
    Compiling,
    Running,
    Completed,
    TimedOut,
    Crashed,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Crashed)
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        use ExecutionState::*;
        matches!(
            (self, next),
            (Pending, Compiling)
                | (Compiling, Running)
                | (Compiling, Crashed)
                | (Running, Completed)
                | (Running, TimedOut)
                | (Running, Crashed)
                // The whole unit can be abandoned or crash at any point.
                | (Pending | Compiling, TimedOut)
                | (Pending, Crashed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Compiling => "compiling",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::TimedOut => "timedOut",
            Self::Crashed => "crashed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid execution transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: ExecutionState,
    pub to: ExecutionState,
}

/// Tracks one file's state and rejects out-of-order transitions.
#[derive(Debug, Clone, Copy)]
pub struct Lifecycle {
    state: ExecutionState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: ExecutionState::Pending,
        }
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn advance(&mut self, next: ExecutionState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
