//! Transaction task
//!
//! `TxTask` applies an ordered batch of record operations atomically on one
//! replica. The execute protocol, in order:
//!
//! 1. Begin a local optimistic transaction.
//! 2. Pass 1: register every create with the transaction (so temporary
//!    identifiers referenced later in the batch resolve), and try-lock the
//!    target of every other operation, recording each acquired lock as it
//!    happens.
//! 3. Pass 2: rewrite temporary identifiers embedded in link fields of every
//!    operation payload to the identifiers assigned in pass 1.
//! 4. Pass 3: execute the operations in declared order, collecting their
//!    immediate results positionally.
//! 5. Commit.
//! 6. Rewrite results that only commit could finalize: pending update
//!    versions are reloaded from the store, create results become
//!    placeholders carrying the final identifier and version.
//!
//! Any failure resets speculative create identifiers, releases every lock
//! recorded so far, rolls the transaction back, and is returned as a
//! [`TaskOutcome`] value: the replication layer compares outcomes across
//! replicas and needs a value, not an unwound fault.

use crate::config::ReplicationConfig;
use crate::task::fix::FixTxTask;
use crate::task::record::{RecordTask, UndoInput};
use crate::task::result::{BadResponse, OpOutcome, TaskOutcome, TxTaskResult};
use crate::task::{QuorumType, ReplicatedTask, TaskContext};
use quorum_core::{Error, Result};
use quorum_store::{LocalStore, StoreTransaction};
use std::time::Duration;

/// Replicated multi-record transaction task.
///
/// Constructed once, populated with [`add`](Self::add), executed at most
/// once per attempt. A retry is a new task instance with the same operation
/// list. The `result` and `lock_records` fields are process-local and never
/// cross the wire.
#[derive(Debug, Default)]
pub struct TxTask {
    pub(crate) ops: Vec<RecordTask>,
    pub(crate) lock_records: bool,
    pub(crate) result: Option<TxTaskResult>,
}

impl TxTask {
    /// Create an empty transaction task with locking enabled.
    pub fn new() -> Self {
        TxTask {
            ops: Vec::new(),
            lock_records: true,
            result: None,
        }
    }

    /// Append an operation, flagging it as running inside this transaction
    /// (operation-local locking is disabled; the task locks eagerly).
    pub fn add(&mut self, mut op: RecordTask) {
        op.set_in_tx(true);
        self.ops.push(op);
    }

    /// The ordered operation list.
    pub fn ops(&self) -> &[RecordTask] {
        &self.ops
    }

    /// Number of operations in the batch.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Whether update/delete targets are pre-locked (default true).
    pub fn is_lock_records(&self) -> bool {
        self.lock_records
    }

    /// Toggle eager locking of update/delete targets.
    pub fn set_lock_records(&mut self, lock_records: bool) {
        self.lock_records = lock_records;
    }

    /// The result of a successful local execution, if one happened.
    pub fn result(&self) -> Option<&TxTaskResult> {
        self.result.as_ref()
    }

    /// Execute the batch atomically against the local store.
    ///
    /// Never panics or unwinds on failure: every outcome, including lock
    /// conflicts and store conflicts, is returned as a value. Retryable
    /// failures are logged at debug level only; unexpected errors reach the
    /// operator log.
    pub fn execute(&mut self, ctx: &TaskContext, store: &LocalStore) -> TaskOutcome {
        tracing::debug!(
            node = %ctx.local_node,
            source = %ctx.source_node,
            operations = self.ops.len(),
            "committing replicated transaction"
        );

        let mut tx = store.begin();
        let mut result = TxTaskResult::default();

        match self.run(ctx, store, &mut tx, &mut result) {
            Ok(()) => {
                self.result = Some(result.clone());
                TaskOutcome::Success(result)
            }
            Err(error) => {
                // Reset any speculatively assigned identifier so callers do
                // not mistake the create for persisted.
                for op in &mut self.ops {
                    op.reset_if_create();
                }
                // Release exactly the locks this attempt acquired.
                for rid in &result.locks {
                    ctx.lock_manager.unlock(rid, &ctx.source_node);
                }
                tx.rollback();

                if error.is_retryable() {
                    tracing::debug!(error = %error, "transaction attempt failed; outcome is retryable");
                    TaskOutcome::Retryable(error)
                } else {
                    tracing::error!(error = %error, "unexpected error on replicated transaction commit");
                    TaskOutcome::Fatal(error)
                }
            }
        }
    }

    fn run(
        &mut self,
        ctx: &TaskContext,
        store: &LocalStore,
        tx: &mut StoreTransaction<'_>,
        result: &mut TxTaskResult,
    ) -> Result<()> {
        // Pass 1: register creates so the transaction can resolve temporary
        // identifiers referenced by later operations; try-lock everything
        // else. Locks are recorded as acquired so a mid-loop failure unwinds
        // precisely what this attempt took.
        for op in &mut self.ops {
            if op.register_create(tx)?.is_some() {
                continue;
            }
            if self.lock_records {
                let rid = op.rid();
                if !ctx.lock_manager.try_lock(rid, &ctx.source_node) {
                    return Err(Error::RecordLocked { rid });
                }
                result.locks.insert(rid);
            }
        }

        // Pass 2: rewrite temporary identifiers inside link fields before
        // anything is serialized, so no temporary identifier can reach
        // committed data.
        for op in &mut self.ops {
            if let Some(payload) = op.payload_mut() {
                payload.resolve_links(|rid| tx.resolve(rid));
            }
        }

        // Pass 3: execute in declared order; results stay positionally
        // aligned with the operation list.
        for op in &mut self.ops {
            let outcome = op.execute(tx)?;
            result.results.push(outcome);
        }

        tx.commit()?;

        // Post-commit rewrite: versions only commit could assign.
        for (i, op) in self.ops.iter().enumerate() {
            if op.is_create() {
                let rid = op.rid();
                let version = store.version_of(&rid).unwrap_or(0);
                result.results[i] = OpOutcome::Placeholder { rid, version };
            } else if result.results[i] == OpOutcome::VersionPending {
                let rid = op.rid();
                result.results[i] = match store.read(&rid) {
                    Some(record) => OpOutcome::Version(record.version),
                    // Updated then deleted within the same batch.
                    None => OpOutcome::Deleted,
                };
            }
        }

        Ok(())
    }

    /// Build the compensating task that rolls a divergent replica forward
    /// from its `bad` outcome to the agreed `good` one.
    ///
    /// Both outcomes must be transaction results; otherwise no automatic
    /// repair is possible and an empty list is returned. The single
    /// aggregate task releases exactly the bad replica's recorded locks and
    /// carries the per-operation fix actions, positionally derived.
    pub fn build_fix_task(&self, bad: &TaskOutcome, good: &TaskOutcome) -> Vec<FixTxTask> {
        let Some(bad_result) = bad.as_success() else {
            tracing::debug!(
                bad = ?bad.error(),
                "cannot build fix task: divergent response is not a transaction result"
            );
            return Vec::new();
        };
        let Some(good_result) = good.as_success() else {
            tracing::debug!(
                good = ?good.error(),
                "cannot build fix task: agreed response is not a transaction result"
            );
            return Vec::new();
        };

        let mut fix = FixTxTask::new(bad_result.locks.clone());
        for (i, op) in self.ops.iter().enumerate() {
            match (bad_result.results.get(i), good_result.results.get(i)) {
                (Some(bad_op), Some(good_op)) => {
                    if let Some(action) = op.build_fix_action(bad_op, good_op) {
                        fix.add(action);
                    }
                }
                _ => {
                    tracing::debug!(
                        index = i,
                        "result list shorter than operation list; skipping fix for operation"
                    );
                }
            }
        }

        vec![fix]
    }

    /// Build the compensating task that unwinds this transaction on the
    /// local node. Returns `None` when the task never executed successfully
    /// here: with no result there is nothing to undo.
    pub fn build_undo_task(&self, bad: &BadResponse) -> Option<FixTxTask> {
        let result = self.result.as_ref()?;

        let mut fix = FixTxTask::new(result.locks.clone());
        for (i, op) in self.ops.iter().enumerate() {
            let input = match bad {
                BadResponse::PerOperation(values) => match values.get(i) {
                    Some(value) => UndoInput::Element(value),
                    None => {
                        tracing::debug!(
                            index = i,
                            "per-operation response shorter than operation list; skipping undo"
                        );
                        continue;
                    }
                },
                BadResponse::Whole(outcome) => UndoInput::Whole(outcome),
            };
            if let Some(action) = op.build_undo_action(input) {
                fix.add(action);
            }
        }

        Some(fix)
    }
}

impl ReplicatedTask for TxTask {
    fn name(&self) -> &'static str {
        "tx"
    }

    fn quorum_type(&self) -> QuorumType {
        // Multi-record transactions always require agreement among
        // write-capable replicas.
        QuorumType::Write
    }

    /// Larger batches take proportionally longer to lock, apply, and
    /// commit: base `T` plus `T/2` per operation.
    fn distributed_timeout(&self, config: &ReplicationConfig) -> Duration {
        let base = config.crud_task_timeout;
        base + (base / 2) * (self.ops.len() as u32)
    }
}
