// src/run/outcome.rs

use std::fmt;

use serde::Serialize;

use crate::exec::OperationError;

/// How a run ended.
///
/// The `Display` form is the terminal status line appended to the run's log
/// right before it is marked finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The operation returned normally with an exit code.
    Completed(i32),
    /// The operation observed cooperative cancellation and stopped.
    Cancelled,
    /// The operation reported a user-facing error.
    Failed(String),
    /// The operation failed unexpectedly; carries the full error chain.
    Faulted(String),
    /// The worker task panicked.
    Panicked(String),
    /// The worker task was force-aborted.
    Interrupted,
    /// The sweeper retired the run while it was still running.
    Evicted,
}

impl RunOutcome {
    pub fn from_result(result: &Result<i32, OperationError>) -> Self {
        match result {
            Ok(code) => RunOutcome::Completed(*code),
            Err(OperationError::Cancelled) => RunOutcome::Cancelled,
            Err(OperationError::User(msg)) => RunOutcome::Failed(msg.clone()),
            Err(OperationError::Fault(err)) => RunOutcome::Faulted(format!("{err:?}")),
        }
    }

    /// Process exit code the CLI reports for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed(code) => *code,
            RunOutcome::Cancelled | RunOutcome::Interrupted => 130,
            _ => 1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(0))
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed(code) => write!(f, "Return code: {code}"),
            RunOutcome::Cancelled => f.write_str("Run cancelled"),
            RunOutcome::Failed(msg) => f.write_str(msg),
            RunOutcome::Faulted(detail) => f.write_str(detail),
            RunOutcome::Panicked(msg) => write!(f, "Run panicked: {msg}"),
            RunOutcome::Interrupted => f.write_str("Run interrupted"),
            RunOutcome::Evicted => f.write_str("Run evicted while still running"),
        }
    }
}
