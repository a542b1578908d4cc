//! Compensating tasks
//!
//! When replicas diverge after a quorum vote, the replication layer
//! dispatches a `FixTxTask` to repair the divergent node: release the locks
//! that execution left behind, then force the affected records into the
//! agreed state. The same accumulator shape serves both directions of
//! repair: rolling a stale replica forward (fix) and unwinding an applied
//! transaction (undo). A task is built once per repair and never reused.

use crate::config::ReplicationConfig;
use crate::task::{QuorumType, ReplicatedTask, TaskContext};
use quorum_core::{RecordId, RecordPayload, Result};
use quorum_store::LocalStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// One record-level repair step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CompensatingAction {
    /// Write the record to exactly this content and version, bypassing
    /// optimistic checks. Repair re-aligns the replica to the agreed state
    /// rather than negotiating with it.
    ForceWrite {
        /// Target identifier.
        rid: RecordId,
        /// Agreed content.
        payload: RecordPayload,
        /// Agreed version.
        version: u64,
    },
    /// Remove the record, bypassing optimistic checks.
    Remove {
        /// Target identifier.
        rid: RecordId,
    },
}

/// Compensating task: a set of locks to release plus an ordered list of
/// record-level repair actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixTxTask {
    unlock: HashSet<RecordId>,
    actions: Vec<CompensatingAction>,
}

impl FixTxTask {
    /// Create a compensating task that releases the given locks.
    pub fn new(unlock: HashSet<RecordId>) -> Self {
        FixTxTask {
            unlock,
            actions: Vec::new(),
        }
    }

    /// Append one repair action.
    pub fn add(&mut self, action: CompensatingAction) {
        self.actions.push(action);
    }

    /// Append several repair actions, preserving order.
    pub fn add_all(&mut self, actions: impl IntoIterator<Item = CompensatingAction>) {
        self.actions.extend(actions);
    }

    /// Identifiers whose locks this task releases.
    pub fn unlock_set(&self) -> &HashSet<RecordId> {
        &self.unlock
    }

    /// Repair actions, in order.
    pub fn actions(&self) -> &[CompensatingAction] {
        &self.actions
    }

    /// True when the task neither unlocks nor repairs anything.
    pub fn is_empty(&self) -> bool {
        self.unlock.is_empty() && self.actions.is_empty()
    }

    /// Apply the repair on the local node: release every recorded lock
    /// (regardless of per-record outcomes), then apply the actions in order.
    pub fn execute(&self, ctx: &TaskContext, store: &LocalStore) -> Result<()> {
        tracing::debug!(
            node = %ctx.local_node,
            unlocks = self.unlock.len(),
            actions = self.actions.len(),
            "applying compensating task"
        );

        for rid in &self.unlock {
            ctx.lock_manager.unlock(rid, &ctx.source_node);
        }

        for action in &self.actions {
            match action {
                CompensatingAction::ForceWrite {
                    rid,
                    payload,
                    version,
                } => store.force_put(*rid, payload.clone(), *version),
                CompensatingAction::Remove { rid } => {
                    store.force_remove(rid);
                }
            }
        }

        Ok(())
    }
}

impl ReplicatedTask for FixTxTask {
    fn name(&self) -> &'static str {
        "fix_tx"
    }

    fn quorum_type(&self) -> QuorumType {
        // Repair targets one specific replica; no agreement needed.
        QuorumType::None
    }

    fn distributed_timeout(&self, config: &ReplicationConfig) -> Duration {
        config.crud_task_timeout
    }
}
