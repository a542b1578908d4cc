//! Task outcomes
//!
//! The replication layer compares outcomes across replicas, so execution
//! must end in a value, never an unwound fault. `TxTaskResult` is the
//! success shape; `TaskOutcome` wraps it together with the error-as-value
//! failure arms.

use quorum_core::{Error, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result of one record operation, positionally aligned with the task's
/// operation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpOutcome {
    /// Create: the assigned identifier and committed version.
    Placeholder {
        /// Identifier the store assigned.
        rid: RecordId,
        /// Committed version (0 unless the batch updated it afterwards).
        version: u64,
    },
    /// Update: the committed version.
    Version(u64),
    /// Update whose committed version is not known yet. Produced only while
    /// the target was created in the same transaction; replaced by reading
    /// the committed version after commit.
    VersionPending,
    /// Delete marker.
    Deleted,
}

/// Outcome container for a successfully executed transaction task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TxTaskResult {
    /// Identifiers locked during this execution. A future fix/undo must
    /// release exactly these.
    pub locks: HashSet<RecordId>,
    /// Per-operation results, same length and order as the operation list.
    pub results: Vec<OpOutcome>,
}

/// What a transaction task execution returns to the replication layer.
///
/// Failures are split by what the caller may do next: `Retryable` covers
/// lock conflicts and optimistic store conditions (the batch may be retried
/// elsewhere), `Fatal` covers everything unexpected.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// The local commit succeeded.
    Success(TxTaskResult),
    /// The attempt failed but the whole task may be retried.
    Retryable(Error),
    /// The attempt failed with an unexpected error.
    Fatal(Error),
}

impl TaskOutcome {
    /// Classify an error into the retryable/fatal arm.
    pub fn from_error(error: Error) -> Self {
        if error.is_retryable() {
            TaskOutcome::Retryable(error)
        } else {
            TaskOutcome::Fatal(error)
        }
    }

    /// True for the success arm.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    /// The transaction result, if this outcome is a success.
    pub fn as_success(&self) -> Option<&TxTaskResult> {
        match self {
            TaskOutcome::Success(result) => Some(result),
            _ => None,
        }
    }

    /// The error, if this outcome is a failure.
    pub fn error(&self) -> Option<&Error> {
        match self {
            TaskOutcome::Success(_) => None,
            TaskOutcome::Retryable(e) | TaskOutcome::Fatal(e) => Some(e),
        }
    }
}

/// Shape contract for the divergent response handed to undo construction.
///
/// The replication layer supplies either one value per original operation
/// (positionally aligned) or a single value that applies to the whole task,
/// e.g. a task-level error.
#[derive(Debug, Clone, PartialEq)]
pub enum BadResponse {
    /// One entry per original operation.
    PerOperation(Vec<OpOutcome>),
    /// A single value applying uniformly to every operation.
    Whole(TaskOutcome),
}
