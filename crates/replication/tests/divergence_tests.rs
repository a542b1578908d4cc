//! Divergence repair: fix tasks rolling a stale replica forward, undo tasks
//! unwinding an applied transaction.

use quorum_core::{Error, FieldValue, NodeId, RecordId, RecordPayload};
use quorum_replication::{
    BadResponse, CompensatingAction, OpOutcome, RecordTask, ReplicationConfig, TaskContext,
    TaskOutcome, TxTask, TxTaskResult,
};
use quorum_store::{LocalStore, RecordLockManager, DEFAULT_CLUSTER};
use std::sync::Arc;

fn payload(name: &str) -> RecordPayload {
    let mut p = RecordPayload::new();
    p.set("name", FieldValue::String(name.into()));
    p
}

fn context(local: &str) -> TaskContext {
    TaskContext {
        local_node: NodeId::new(local),
        source_node: NodeId::new("coordinator"),
        lock_manager: Arc::new(RecordLockManager::new()),
        config: ReplicationConfig::default(),
    }
}

/// Two replicas start identical except the stale one missed one update (it
/// sits at version 2 where the good one reports 3). The fix task advances
/// the stale replica to the agreed state and releases its locks.
#[test]
fn fix_task_advances_stale_replica() {
    let rid = RecordId::new(0, 0);

    let good_store = LocalStore::new();
    assert_eq!(good_store.seed(DEFAULT_CLUSTER, payload("base")).unwrap(), rid);
    let stale_store = LocalStore::new();
    assert_eq!(stale_store.seed(DEFAULT_CLUSTER, payload("base")).unwrap(), rid);

    // The good replica is two commits ahead before the replicated batch.
    for (i, name) in ["step1", "step2"].iter().enumerate() {
        let mut tx = good_store.begin();
        tx.update(rid, payload(name), i as u64).unwrap();
        tx.commit().unwrap();
    }
    {
        let mut tx = stale_store.begin();
        tx.update(rid, payload("step1"), 0).unwrap();
        tx.commit().unwrap();
    }

    // The same logical task executes on both replicas with the expected
    // version each replica actually observed.
    let good_ctx = context("good");
    let mut good_task = TxTask::new();
    good_task.add(RecordTask::update(rid, 2, payload("agreed")));
    let good_outcome = good_task.execute(&good_ctx, &good_store);
    assert_eq!(
        good_outcome.as_success().unwrap().results[0],
        OpOutcome::Version(3)
    );

    let stale_ctx = context("stale");
    let mut stale_task = TxTask::new();
    stale_task.add(RecordTask::update(rid, 1, payload("agreed")));
    let stale_outcome = stale_task.execute(&stale_ctx, &stale_store);
    assert_eq!(
        stale_outcome.as_success().unwrap().results[0],
        OpOutcome::Version(2)
    );
    // The stale replica still holds its lock from the divergent attempt.
    assert!(stale_ctx.lock_manager.is_locked(&rid));

    // Quorum comparison failed: version 2 against agreed version 3.
    let fixes = good_task.build_fix_task(&stale_outcome, &good_outcome);
    assert_eq!(fixes.len(), 1);
    let fix = &fixes[0];

    // Exactly one per-operation action, plus the recorded lock releases.
    assert_eq!(fix.actions().len(), 1);
    assert_eq!(
        fix.actions()[0],
        CompensatingAction::ForceWrite {
            rid,
            payload: payload("agreed"),
            version: 3
        }
    );
    assert_eq!(fix.unlock_set(), &[rid].into_iter().collect());

    fix.execute(&stale_ctx, &stale_store).unwrap();

    // Replicas converge.
    assert_eq!(stale_store.read(&rid), good_store.read(&rid));
    assert!(!stale_ctx.lock_manager.is_locked(&rid));
}

/// The unlock set of a fix task is exactly the bad replica's recorded lock
/// set, independent of per-operation outcomes.
#[test]
fn fix_task_unlock_set_is_bad_replicas_lock_set() {
    let a = RecordId::new(0, 1);
    let b = RecordId::new(0, 2);

    let mut task = TxTask::new();
    task.add(RecordTask::update(a, 0, payload("x")));
    task.add(RecordTask::update(b, 0, payload("y")));

    let locks = [a, b].into_iter().collect::<std::collections::HashSet<_>>();
    let bad = TaskOutcome::Success(TxTaskResult {
        locks: locks.clone(),
        results: vec![OpOutcome::Version(1), OpOutcome::Version(1)],
    });
    let good = TaskOutcome::Success(TxTaskResult {
        locks: [a].into_iter().collect(),
        results: vec![OpOutcome::Version(1), OpOutcome::Version(1)],
    });

    let fixes = task.build_fix_task(&bad, &good);
    assert_eq!(fixes[0].unlock_set(), &locks);
}

/// A non-result response on either side means no automatic repair.
#[test]
fn malformed_comparison_inputs_yield_no_fix() {
    let mut task = TxTask::new();
    task.add(RecordTask::delete(RecordId::new(0, 1), 0));

    let result = TaskOutcome::Success(TxTaskResult::default());
    let error = TaskOutcome::Fatal(Error::Storage("replica crashed".into()));

    assert!(task.build_fix_task(&error, &result).is_empty());
    assert!(task.build_fix_task(&result, &error).is_empty());
    assert!(task.build_fix_task(&error, &error).is_empty());
}

/// A node whose commit the quorum rejected unwinds the whole batch: the
/// create disappears, the update and delete targets return to their
/// pre-transaction state, and every recorded lock is released.
#[test]
fn undo_task_unwinds_applied_transaction() {
    let store = LocalStore::new();
    let updated = store.seed(DEFAULT_CLUSTER, payload("old")).unwrap();
    let deleted = store.seed(DEFAULT_CLUSTER, payload("victim")).unwrap();
    let ctx = context("loser");

    let mut task = TxTask::new();
    task.add(RecordTask::create(RecordId::temporary(0), payload("doc1")));
    task.add(RecordTask::update(updated, 0, payload("new")));
    task.add(RecordTask::delete(deleted, 0));

    let outcome = task.execute(&ctx, &store);
    let result = outcome.as_success().expect("local commit succeeded").clone();
    let OpOutcome::Placeholder { rid: created, .. } = result.results[0] else {
        panic!("expected placeholder");
    };
    assert!(store.read(&created).is_some());
    assert!(store.read(&deleted).is_none());

    // Quorum declared this outcome bad.
    let undo = task
        .build_undo_task(&BadResponse::Whole(TaskOutcome::Retryable(
            Error::TransactionAborted("outvoted".into()),
        )))
        .expect("a result exists, so an undo task must too");

    assert_eq!(undo.unlock_set(), &result.locks);
    assert_eq!(undo.actions().len(), 3);

    undo.execute(&ctx, &store).unwrap();

    assert!(store.read(&created).is_none());
    let restored = store.read(&updated).unwrap();
    assert_eq!(restored.payload, payload("old"));
    assert_eq!(restored.version, 0);
    let resurrected = store.read(&deleted).unwrap();
    assert_eq!(resurrected.payload, payload("victim"));
    assert_eq!(resurrected.version, 0);
    assert!(ctx.lock_manager.is_empty());
}

/// Without a prior successful execution there is nothing to undo.
#[test]
fn undo_requires_a_local_result() {
    let mut task = TxTask::new();
    task.add(RecordTask::delete(RecordId::new(0, 1), 0));
    assert!(task
        .build_undo_task(&BadResponse::PerOperation(vec![OpOutcome::Deleted]))
        .is_none());
}

/// Per-operation bad responses are consumed positionally.
#[test]
fn undo_accepts_per_operation_responses() {
    let store = LocalStore::new();
    let updated = store.seed(DEFAULT_CLUSTER, payload("old")).unwrap();
    let ctx = context("loser");

    let mut task = TxTask::new();
    task.add(RecordTask::update(updated, 0, payload("new")));
    assert!(task.execute(&ctx, &store).is_success());

    let undo = task
        .build_undo_task(&BadResponse::PerOperation(vec![OpOutcome::Version(9)]))
        .expect("undo task");
    assert_eq!(undo.actions().len(), 1);
}
