//! Error types
//!
//! One error enum covers the store and the replication layer. We use
//! `thiserror` for `Display` and `Error` impls. The replication layer never
//! lets these unwind past a task boundary: they are classified with
//! [`Error::is_retryable`] and returned as values.

use crate::rid::RecordId;
use thiserror::Error;

/// Result type alias used throughout QuorumDB.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for transaction execution and repair.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A targeted record is already locked by another requester.
    ///
    /// Fatal to the current attempt; the whole batch may be retried on
    /// another node.
    #[error("record {rid} is locked by another requester")]
    RecordLocked {
        /// The identifier whose lock was denied.
        rid: RecordId,
    },

    /// Optimistic conflict: the record version moved under us.
    #[error("concurrent modification on {rid}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        /// The record that changed.
        rid: RecordId,
        /// Version the operation expected.
        expected: u64,
        /// Version actually found.
        actual: u64,
    },

    /// The local transaction was aborted by the store.
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),

    /// A create targeted an identifier that already exists.
    #[error("duplicate record {0}")]
    DuplicateRecord(RecordId),

    /// An update/delete targeted a record that does not exist.
    #[error("record {0} not found")]
    RecordNotFound(RecordId),

    /// A temporary identifier survived to commit time.
    #[error("unresolved temporary identifier {0}")]
    UnresolvedTemporary(RecordId),

    /// An operation was attempted in the wrong state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Wire encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Store-level failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether the replication layer may retry the whole task elsewhere.
    ///
    /// Lock conflicts and the four optimistic store conditions are
    /// retryable; everything else is unexpected and escalated to the
    /// operator log.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RecordLocked { .. }
                | Error::ConcurrentModification { .. }
                | Error::TransactionAborted(_)
                | Error::DuplicateRecord(_)
                | Error::RecordNotFound(_)
        )
    }
}
