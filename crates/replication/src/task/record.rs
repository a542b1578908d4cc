//! Record operations
//!
//! The closed set of per-record operations a transaction task carries:
//! create, update, delete. Every variant knows how to execute itself against
//! a local store transaction, how to build a fix action when replicas
//! diverge, how to build an undo action from the state it captured while
//! executing, and how to reset speculative state after a failed attempt.
//!
//! Only the declared operation (target, payload, expected version) crosses
//! the wire; everything captured during execution is transient.

use crate::task::fix::CompensatingAction;
use crate::task::result::{OpOutcome, TaskOutcome};
use quorum_core::{Error, RecordId, RecordPayload, Result, VersionedRecord};
use quorum_store::StoreTransaction;
use serde::{Deserialize, Serialize};

/// Create a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRecordTask {
    /// Declared identifier: temporary on the coordinator, or a real one when
    /// a replica re-applies the coordinator's assignment.
    pub rid: RecordId,
    /// Target cluster, resolved at execution time when absent.
    pub cluster: Option<i32>,
    /// Record content.
    pub payload: RecordPayload,
    /// Identifier assigned by the local store; speculative until commit.
    #[serde(skip)]
    pub(crate) assigned: Option<RecordId>,
    #[serde(skip)]
    pub(crate) in_tx: bool,
}

/// Update an existing record, guarded by an expected version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecordTask {
    /// Target identifier (may be temporary when it references a create from
    /// the same batch; resolved at execution time).
    pub rid: RecordId,
    /// New record content.
    pub payload: RecordPayload,
    /// Version the target must still have.
    pub expected_version: u64,
    /// Pre-transaction state captured at execute time, for undo.
    #[serde(skip)]
    pub(crate) previous: Option<VersionedRecord>,
    #[serde(skip)]
    pub(crate) in_tx: bool,
}

/// Delete an existing record, guarded by an expected version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRecordTask {
    /// Target identifier.
    pub rid: RecordId,
    /// Version the target must still have.
    pub expected_version: u64,
    /// Pre-transaction state captured at execute time, for undo.
    #[serde(skip)]
    pub(crate) previous: Option<VersionedRecord>,
    #[serde(skip)]
    pub(crate) in_tx: bool,
}

/// The divergent response value handed to an operation's undo builder.
///
/// Mirrors the [`BadResponse`](crate::task::result::BadResponse) shape
/// contract: either the element aligned with this operation, or the whole
/// response applied uniformly.
#[derive(Debug, Clone, Copy)]
pub enum UndoInput<'a> {
    /// The positionally aligned element of a per-operation response.
    Element(&'a OpOutcome),
    /// The whole divergent response.
    Whole(&'a TaskOutcome),
}

/// One record-level operation of a transaction task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordTask {
    /// Create a record.
    Create(CreateRecordTask),
    /// Update a record.
    Update(UpdateRecordTask),
    /// Delete a record.
    Delete(DeleteRecordTask),
}

impl RecordTask {
    /// Create operation with a temporary (or pre-assigned) identifier.
    pub fn create(rid: RecordId, payload: RecordPayload) -> Self {
        RecordTask::Create(CreateRecordTask {
            rid,
            cluster: None,
            payload,
            assigned: None,
            in_tx: false,
        })
    }

    /// Create operation targeting an explicit cluster.
    pub fn create_in(rid: RecordId, cluster: i32, payload: RecordPayload) -> Self {
        RecordTask::Create(CreateRecordTask {
            rid,
            cluster: Some(cluster),
            payload,
            assigned: None,
            in_tx: false,
        })
    }

    /// Update operation.
    pub fn update(rid: RecordId, expected_version: u64, payload: RecordPayload) -> Self {
        RecordTask::Update(UpdateRecordTask {
            rid,
            payload,
            expected_version,
            previous: None,
            in_tx: false,
        })
    }

    /// Delete operation.
    pub fn delete(rid: RecordId, expected_version: u64) -> Self {
        RecordTask::Delete(DeleteRecordTask {
            rid,
            expected_version,
            previous: None,
            in_tx: false,
        })
    }

    /// Effective target identifier: the assigned one for an executed create,
    /// the declared one otherwise.
    pub fn rid(&self) -> RecordId {
        match self {
            RecordTask::Create(c) => c.assigned.unwrap_or(c.rid),
            RecordTask::Update(u) => u.rid,
            RecordTask::Delete(d) => d.rid,
        }
    }

    /// Declared target cluster, for creates.
    pub fn target_cluster(&self) -> Option<i32> {
        match self {
            RecordTask::Create(c) => c.cluster,
            _ => None,
        }
    }

    /// True for the create variant.
    pub fn is_create(&self) -> bool {
        matches!(self, RecordTask::Create(_))
    }

    /// Mark the operation as running inside a transaction task. In-tx
    /// operations skip operation-local locking: the transaction task locks
    /// eagerly up front instead.
    pub fn set_in_tx(&mut self, in_tx: bool) {
        match self {
            RecordTask::Create(c) => c.in_tx = in_tx,
            RecordTask::Update(u) => u.in_tx = in_tx,
            RecordTask::Delete(d) => d.in_tx = in_tx,
        }
    }

    /// Whether the operation is flagged as running inside a transaction.
    pub fn is_in_tx(&self) -> bool {
        match self {
            RecordTask::Create(c) => c.in_tx,
            RecordTask::Update(u) => u.in_tx,
            RecordTask::Delete(d) => d.in_tx,
        }
    }

    /// Mutable access to the record payload, where the variant has one.
    pub fn payload_mut(&mut self) -> Option<&mut RecordPayload> {
        match self {
            RecordTask::Create(c) => Some(&mut c.payload),
            RecordTask::Update(u) => Some(&mut u.payload),
            RecordTask::Delete(_) => None,
        }
    }

    /// Register a create with the local transaction so later operations can
    /// resolve references to it. Returns the assigned identifier for
    /// creates, `None` for other variants.
    pub fn register_create(&mut self, tx: &mut StoreTransaction<'_>) -> Result<Option<RecordId>> {
        match self {
            RecordTask::Create(c) => {
                let assigned = tx.register_create(c.rid, c.cluster)?;
                c.assigned = Some(assigned);
                Ok(Some(assigned))
            }
            _ => Ok(None),
        }
    }

    /// Execute against the local transaction, returning this operation's
    /// immediate result.
    pub fn execute(&mut self, tx: &mut StoreTransaction<'_>) -> Result<OpOutcome> {
        match self {
            RecordTask::Create(c) => {
                let assigned = c.assigned.ok_or_else(|| {
                    Error::InvalidState(format!("create of {} executed before registration", c.rid))
                })?;
                tx.create(assigned, c.payload.clone())?;
                Ok(OpOutcome::Placeholder {
                    rid: assigned,
                    version: 0,
                })
            }
            RecordTask::Update(u) => {
                u.previous = tx.read_committed(&u.rid);
                u.rid = tx.resolve(u.rid);
                match tx.update(u.rid, u.payload.clone(), u.expected_version)? {
                    Some(version) => Ok(OpOutcome::Version(version)),
                    None => Ok(OpOutcome::VersionPending),
                }
            }
            RecordTask::Delete(d) => {
                d.previous = tx.read_committed(&d.rid);
                d.rid = tx.resolve(d.rid);
                tx.delete(d.rid, d.expected_version)?;
                Ok(OpOutcome::Deleted)
            }
        }
    }

    /// Drop the speculative identifier of a failed create so a caller does
    /// not mistake it for persisted. No-op for other variants.
    pub fn reset_if_create(&mut self) {
        if let RecordTask::Create(c) = self {
            c.assigned = None;
        }
    }

    /// Build the compensating action that rolls a stale replica forward from
    /// its divergent result (`bad`) to the agreed one (`good`).
    pub fn build_fix_action(
        &self,
        bad: &OpOutcome,
        good: &OpOutcome,
    ) -> Option<CompensatingAction> {
        if bad == good {
            return None;
        }

        match (self, good) {
            (RecordTask::Create(c), OpOutcome::Placeholder { rid, version }) => {
                // Re-send the record content under the agreed identifier.
                Some(CompensatingAction::ForceWrite {
                    rid: *rid,
                    payload: c.payload.clone(),
                    version: *version,
                })
            }
            (RecordTask::Update(u), OpOutcome::Version(version)) => {
                Some(CompensatingAction::ForceWrite {
                    rid: u.rid,
                    payload: u.payload.clone(),
                    version: *version,
                })
            }
            (RecordTask::Delete(d), OpOutcome::Deleted) => {
                Some(CompensatingAction::Remove { rid: d.rid })
            }
            _ => {
                tracing::debug!(
                    operation = ?self.rid(),
                    good = ?good,
                    "agreed result does not match operation kind; no fix action"
                );
                None
            }
        }
    }

    /// Build the compensating action that unwinds this operation on a node
    /// where it already committed. Operations that never executed locally
    /// captured no state and contribute nothing.
    pub fn build_undo_action(&self, bad: UndoInput<'_>) -> Option<CompensatingAction> {
        tracing::trace!(rid = %self.rid(), bad = ?bad, "building undo action");
        match self {
            RecordTask::Create(c) => c
                .assigned
                .map(|rid| CompensatingAction::Remove { rid }),
            RecordTask::Update(u) => u.previous.as_ref().map(|prev| CompensatingAction::ForceWrite {
                rid: u.rid,
                payload: prev.payload.clone(),
                version: prev.version,
            }),
            RecordTask::Delete(d) => d.previous.as_ref().map(|prev| CompensatingAction::ForceWrite {
                rid: d.rid,
                payload: prev.payload.clone(),
                version: prev.version,
            }),
        }
    }
}
