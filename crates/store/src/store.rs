//! Local versioned record store
//!
//! `LocalStore` is the node-local transactional store the replication layer
//! commits against. Records live in named clusters and carry a version that
//! starts at 0 on create and bumps by 1 on every update.
//!
//! `StoreTransaction` is optimistic: operations are staged and validated
//! eagerly against the state visible when staged, then re-validated and
//! applied atomically at commit under one write lock. Nothing touches the
//! store before commit, so rollback never has anything to undo.
//!
//! Temporary identifiers: `register_create` reserves a permanent identifier
//! up front and records the temporary-to-assigned mapping, so later
//! operations in the same batch can resolve references to records that do
//! not exist yet. The commit refuses to persist any payload that still
//! contains a temporary link.

use parking_lot::RwLock;
use quorum_core::{Error, RecordId, RecordPayload, Result, VersionedRecord};
use std::collections::{HashMap, HashSet};

/// Default cluster every store starts with.
pub const DEFAULT_CLUSTER: i32 = 0;

struct StoreInner {
    clusters: Vec<String>,
    next_position: Vec<i64>,
    records: HashMap<RecordId, VersionedRecord>,
}

/// In-memory versioned record store for one node.
pub struct LocalStore {
    inner: RwLock<StoreInner>,
}

impl LocalStore {
    /// Create a store with the default cluster.
    pub fn new() -> Self {
        LocalStore {
            inner: RwLock::new(StoreInner {
                clusters: vec!["default".to_string()],
                next_position: vec![0],
                records: HashMap::new(),
            }),
        }
    }

    /// Add a cluster and return its id. Returns the existing id if the name
    /// is already registered.
    pub fn add_cluster(&self, name: &str) -> i32 {
        let mut inner = self.inner.write();
        if let Some(id) = inner.clusters.iter().position(|c| c == name) {
            return id as i32;
        }
        inner.clusters.push(name.to_string());
        inner.next_position.push(0);
        (inner.clusters.len() - 1) as i32
    }

    /// Id of the cluster with the given name.
    pub fn cluster_id(&self, name: &str) -> Option<i32> {
        self.inner
            .read()
            .clusters
            .iter()
            .position(|c| c == name)
            .map(|id| id as i32)
    }

    /// Name of the cluster with the given id.
    pub fn cluster_name(&self, id: i32) -> Option<String> {
        if id < 0 {
            return None;
        }
        self.inner.read().clusters.get(id as usize).cloned()
    }

    /// Read a record.
    pub fn read(&self, rid: &RecordId) -> Option<VersionedRecord> {
        self.inner.read().records.get(rid).cloned()
    }

    /// Committed version of a record.
    pub fn version_of(&self, rid: &RecordId) -> Option<u64> {
        self.inner.read().records.get(rid).map(|r| r.version)
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Insert a record outside any transaction, assigning the next position
    /// in `cluster`. The record commits at version 0.
    pub fn seed(&self, cluster: i32, payload: RecordPayload) -> Result<RecordId> {
        let mut inner = self.inner.write();
        let idx = cluster_index(&inner.clusters, cluster)?;
        let position = inner.next_position[idx];
        inner.next_position[idx] = position + 1;
        let rid = RecordId::new(cluster, position);
        inner.records.insert(rid, VersionedRecord::new(payload, 0));
        Ok(rid)
    }

    /// Write a record at an exact identifier and version, bypassing version
    /// checks. Used by divergence repair, which re-aligns a stale replica to
    /// the agreed state rather than negotiating with it.
    pub fn force_put(&self, rid: RecordId, payload: RecordPayload, version: u64) {
        let mut inner = self.inner.write();
        if rid.cluster >= 0 {
            let idx = rid.cluster as usize;
            if idx < inner.next_position.len() && inner.next_position[idx] <= rid.position {
                inner.next_position[idx] = rid.position + 1;
            }
        }
        inner
            .records
            .insert(rid, VersionedRecord::new(payload, version));
    }

    /// Remove a record bypassing version checks. Returns `true` if it existed.
    pub fn force_remove(&self, rid: &RecordId) -> bool {
        self.inner.write().records.remove(rid).is_some()
    }

    /// Begin an optimistic transaction.
    pub fn begin(&self) -> StoreTransaction<'_> {
        StoreTransaction {
            store: self,
            staged: Vec::new(),
            rid_map: HashMap::new(),
            created: HashSet::new(),
            state: TxState::Active,
        }
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

fn cluster_index(clusters: &[String], cluster: i32) -> Result<usize> {
    if cluster >= 0 && (cluster as usize) < clusters.len() {
        Ok(cluster as usize)
    } else {
        Err(Error::Storage(format!("unknown cluster {cluster}")))
    }
}

#[derive(Debug, Clone)]
enum StagedOp {
    Create {
        rid: RecordId,
        payload: RecordPayload,
    },
    Update {
        rid: RecordId,
        payload: RecordPayload,
        expected: u64,
    },
    Delete {
        rid: RecordId,
        expected: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Active,
    Committed,
    RolledBack,
}

/// Optimistic transaction staging mutations against a [`LocalStore`].
pub struct StoreTransaction<'a> {
    store: &'a LocalStore,
    staged: Vec<StagedOp>,
    rid_map: HashMap<RecordId, RecordId>,
    created: HashSet<RecordId>,
    state: TxState,
}

impl<'a> StoreTransaction<'a> {
    /// Whether the transaction can still accept operations.
    pub fn is_active(&self) -> bool {
        self.state == TxState::Active
    }

    fn check_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "transaction is {:?}",
                self.state
            )))
        }
    }

    /// Register a pending create, assigning its permanent identifier now.
    ///
    /// The assigned identifier is reserved immediately so that later
    /// operations in the same batch can resolve references to it through
    /// [`resolve`](Self::resolve). Cluster selection: explicit `cluster`
    /// argument, else the cluster of a pre-assigned identifier, else the
    /// store default. A `declared` identifier that is already valid is kept
    /// as-is (replica-side apply reuses the coordinator's assignment).
    pub fn register_create(
        &mut self,
        declared: RecordId,
        cluster: Option<i32>,
    ) -> Result<RecordId> {
        self.check_active()?;

        if declared.is_valid() {
            // Pre-assigned by the coordinator: reserve it verbatim.
            let mut inner = self.store.inner.write();
            let idx = cluster_index(&inner.clusters, declared.cluster)?;
            if inner.next_position[idx] <= declared.position {
                inner.next_position[idx] = declared.position + 1;
            }
            return Ok(declared);
        }

        let cluster = cluster
            .or_else(|| (declared.cluster >= 0).then_some(declared.cluster))
            .unwrap_or(DEFAULT_CLUSTER);

        let assigned = {
            let mut inner = self.store.inner.write();
            let idx = cluster_index(&inner.clusters, cluster)?;
            let position = inner.next_position[idx];
            inner.next_position[idx] = position + 1;
            RecordId::new(cluster, position)
        };

        self.rid_map.insert(declared, assigned);
        Ok(assigned)
    }

    /// Resolve a temporary identifier registered in this transaction.
    /// Identifiers with no mapping (including all permanent ones) pass
    /// through unchanged.
    pub fn resolve(&self, rid: RecordId) -> RecordId {
        self.rid_map.get(&rid).copied().unwrap_or(rid)
    }

    /// Read the committed (pre-transaction) state of a record, resolving
    /// temporary identifiers first. Records created inside this transaction
    /// have no committed state yet and read as `None`.
    pub fn read_committed(&self, rid: &RecordId) -> Option<VersionedRecord> {
        self.store.read(&self.resolve(*rid))
    }

    /// Read a record as this transaction would see it: staged operations
    /// overlay the committed store state.
    pub fn read(&self, rid: &RecordId) -> Option<VersionedRecord> {
        let rid = self.resolve(*rid);
        let mut current = self.store.read(&rid);
        for op in &self.staged {
            match op {
                StagedOp::Create { rid: r, payload } if *r == rid => {
                    current = Some(VersionedRecord::new(payload.clone(), 0));
                }
                StagedOp::Update { rid: r, payload, .. } if *r == rid => {
                    let version = current.as_ref().map(|c| c.version + 1).unwrap_or(1);
                    current = Some(VersionedRecord::new(payload.clone(), version));
                }
                StagedOp::Delete { rid: r, .. } if *r == rid => {
                    current = None;
                }
                _ => {}
            }
        }
        current
    }

    /// Stage the create of a previously registered record.
    pub fn create(&mut self, assigned: RecordId, payload: RecordPayload) -> Result<()> {
        self.check_active()?;
        if !assigned.is_valid() {
            return Err(Error::InvalidState(format!(
                "create of {assigned} before registration"
            )));
        }
        if self.store.read(&assigned).is_some() || self.created.contains(&assigned) {
            return Err(Error::DuplicateRecord(assigned));
        }
        self.created.insert(assigned);
        self.staged.push(StagedOp::Create {
            rid: assigned,
            payload,
        });
        Ok(())
    }

    /// Stage an update.
    ///
    /// Returns the predicted committed version, or `None` when the target
    /// was created inside this transaction: its committed version is only
    /// known after commit, so the caller must reload then.
    pub fn update(
        &mut self,
        rid: RecordId,
        payload: RecordPayload,
        expected: u64,
    ) -> Result<Option<u64>> {
        self.check_active()?;
        let rid = self.resolve(rid);

        if self.created.contains(&rid) {
            self.staged.push(StagedOp::Update {
                rid,
                payload,
                expected,
            });
            return Ok(None);
        }

        match self.store.read(&rid) {
            None => Err(Error::RecordNotFound(rid)),
            Some(current) if current.version != expected => Err(Error::ConcurrentModification {
                rid,
                expected,
                actual: current.version,
            }),
            Some(_) => {
                self.staged.push(StagedOp::Update {
                    rid,
                    payload,
                    expected,
                });
                Ok(Some(expected + 1))
            }
        }
    }

    /// Stage a delete.
    pub fn delete(&mut self, rid: RecordId, expected: u64) -> Result<()> {
        self.check_active()?;
        let rid = self.resolve(rid);

        if self.created.contains(&rid) {
            self.staged.push(StagedOp::Delete { rid, expected });
            return Ok(());
        }

        match self.store.read(&rid) {
            None => Err(Error::RecordNotFound(rid)),
            Some(current) if current.version != expected => Err(Error::ConcurrentModification {
                rid,
                expected,
                actual: current.version,
            }),
            Some(_) => {
                self.staged.push(StagedOp::Delete { rid, expected });
                Ok(())
            }
        }
    }

    /// Commit every staged operation atomically.
    ///
    /// All operations are re-validated against the current store state
    /// (overlaid with earlier operations of this same transaction) before
    /// anything is applied; a failed validation leaves the store untouched
    /// and the transaction active so the caller can roll back.
    pub fn commit(&mut self) -> Result<()> {
        self.check_active()?;
        let mut inner = self.store.inner.write();

        // Validate into an overlay first; apply only if everything passes.
        let mut overlay: HashMap<RecordId, Option<VersionedRecord>> = HashMap::new();
        let current = |overlay: &HashMap<RecordId, Option<VersionedRecord>>,
                       records: &HashMap<RecordId, VersionedRecord>,
                       rid: &RecordId| {
            match overlay.get(rid) {
                Some(entry) => entry.clone(),
                None => records.get(rid).cloned(),
            }
        };

        for op in &self.staged {
            match op {
                StagedOp::Create { rid, payload } => {
                    if let Some(temp) = payload.first_temporary() {
                        return Err(Error::UnresolvedTemporary(temp));
                    }
                    if current(&overlay, &inner.records, rid).is_some() {
                        return Err(Error::DuplicateRecord(*rid));
                    }
                    overlay.insert(*rid, Some(VersionedRecord::new(payload.clone(), 0)));
                }
                StagedOp::Update {
                    rid,
                    payload,
                    expected,
                } => {
                    if let Some(temp) = payload.first_temporary() {
                        return Err(Error::UnresolvedTemporary(temp));
                    }
                    let cur = current(&overlay, &inner.records, rid)
                        .ok_or(Error::RecordNotFound(*rid))?;
                    if !self.created.contains(rid) && cur.version != *expected {
                        return Err(Error::ConcurrentModification {
                            rid: *rid,
                            expected: *expected,
                            actual: cur.version,
                        });
                    }
                    overlay.insert(
                        *rid,
                        Some(VersionedRecord::new(payload.clone(), cur.version + 1)),
                    );
                }
                StagedOp::Delete { rid, expected } => {
                    let cur = current(&overlay, &inner.records, rid)
                        .ok_or(Error::RecordNotFound(*rid))?;
                    if !self.created.contains(rid) && cur.version != *expected {
                        return Err(Error::ConcurrentModification {
                            rid: *rid,
                            expected: *expected,
                            actual: cur.version,
                        });
                    }
                    overlay.insert(*rid, None);
                }
            }
        }

        let applied = overlay.len();
        for (rid, entry) in overlay {
            match entry {
                Some(record) => {
                    inner.records.insert(rid, record);
                }
                None => {
                    inner.records.remove(&rid);
                }
            }
        }

        self.state = TxState::Committed;
        tracing::debug!(operations = self.staged.len(), records = applied, "committed");
        Ok(())
    }

    /// Discard every staged operation. Reserved positions stay consumed.
    pub fn rollback(&mut self) {
        self.staged.clear();
        self.rid_map.clear();
        self.created.clear();
        self.state = TxState::RolledBack;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_core::FieldValue;

    fn payload(name: &str) -> RecordPayload {
        let mut p = RecordPayload::new();
        p.set("name", FieldValue::String(name.into()));
        p
    }

    #[test]
    fn test_seed_and_read() {
        let store = LocalStore::new();
        let rid = store.seed(DEFAULT_CLUSTER, payload("a")).unwrap();
        assert_eq!(rid, RecordId::new(0, 0));
        let rec = store.read(&rid).unwrap();
        assert_eq!(rec.version, 0);
        assert_eq!(rec.payload, payload("a"));
    }

    #[test]
    fn test_clusters() {
        let store = LocalStore::new();
        assert_eq!(store.cluster_name(DEFAULT_CLUSTER).as_deref(), Some("default"));
        let orders = store.add_cluster("orders");
        assert_eq!(store.cluster_id("orders"), Some(orders));
        assert_eq!(store.cluster_name(orders).as_deref(), Some("orders"));
        // Re-adding returns the same id.
        assert_eq!(store.add_cluster("orders"), orders);
        assert_eq!(store.cluster_name(-1), None);
        assert_eq!(store.cluster_id("nope"), None);
    }

    #[test]
    fn test_create_commit() {
        let store = LocalStore::new();
        let mut tx = store.begin();

        let temp = RecordId::temporary(0);
        let assigned = tx.register_create(temp, None).unwrap();
        assert!(assigned.is_valid());
        assert_eq!(tx.resolve(temp), assigned);

        tx.create(assigned, payload("a")).unwrap();
        tx.commit().unwrap();

        assert_eq!(store.version_of(&assigned), Some(0));
    }

    #[test]
    fn test_register_create_cluster_selection() {
        let store = LocalStore::new();
        let orders = store.add_cluster("orders");
        let mut tx = store.begin();

        // Explicit cluster wins.
        let a = tx
            .register_create(RecordId::temporary(0), Some(orders))
            .unwrap();
        assert_eq!(a.cluster, orders);

        // Cluster implied by a pre-assigned identifier.
        let b = tx
            .register_create(RecordId::new(orders, -2), None)
            .unwrap();
        assert_eq!(b.cluster, orders);

        // Store default otherwise.
        let c = tx.register_create(RecordId::temporary(1), None).unwrap();
        assert_eq!(c.cluster, DEFAULT_CLUSTER);
    }

    #[test]
    fn test_register_create_preassigned_identifier_kept() {
        let store = LocalStore::new();
        let mut tx = store.begin();
        let rid = RecordId::new(0, 42);
        assert_eq!(tx.register_create(rid, None).unwrap(), rid);
        tx.create(rid, payload("a")).unwrap();
        tx.commit().unwrap();

        // The position counter moved past the reservation.
        let next = store.seed(DEFAULT_CLUSTER, payload("b")).unwrap();
        assert!(next.position > 42);
    }

    #[test]
    fn test_update_predicts_version() {
        let store = LocalStore::new();
        let rid = store.seed(DEFAULT_CLUSTER, payload("a")).unwrap();

        let mut tx = store.begin();
        let predicted = tx.update(rid, payload("b"), 0).unwrap();
        assert_eq!(predicted, Some(1));
        tx.commit().unwrap();

        let rec = store.read(&rid).unwrap();
        assert_eq!(rec.version, 1);
        assert_eq!(rec.payload, payload("b"));
    }

    #[test]
    fn test_update_of_in_tx_create_is_pending() {
        let store = LocalStore::new();
        let mut tx = store.begin();
        let temp = RecordId::temporary(0);
        let assigned = tx.register_create(temp, None).unwrap();
        tx.create(assigned, payload("a")).unwrap();

        // Targeting the temporary identifier resolves to the assigned one.
        let predicted = tx.update(temp, payload("b"), 0).unwrap();
        assert_eq!(predicted, None);
        tx.commit().unwrap();

        let rec = store.read(&assigned).unwrap();
        assert_eq!(rec.version, 1);
        assert_eq!(rec.payload, payload("b"));
    }

    #[test]
    fn test_update_version_mismatch() {
        let store = LocalStore::new();
        let rid = store.seed(DEFAULT_CLUSTER, payload("a")).unwrap();

        let mut tx = store.begin();
        let err = tx.update(rid, payload("b"), 7).unwrap_err();
        assert_eq!(
            err,
            Error::ConcurrentModification {
                rid,
                expected: 7,
                actual: 0
            }
        );
    }

    #[test]
    fn test_update_missing_record() {
        let store = LocalStore::new();
        let mut tx = store.begin();
        let rid = RecordId::new(0, 9);
        assert_eq!(
            tx.update(rid, payload("b"), 0).unwrap_err(),
            Error::RecordNotFound(rid)
        );
    }

    #[test]
    fn test_delete() {
        let store = LocalStore::new();
        let rid = store.seed(DEFAULT_CLUSTER, payload("a")).unwrap();

        let mut tx = store.begin();
        tx.delete(rid, 0).unwrap();
        tx.commit().unwrap();

        assert!(store.read(&rid).is_none());
    }

    #[test]
    fn test_commit_rejects_unresolved_temporary() {
        let store = LocalStore::new();
        let mut tx = store.begin();
        let assigned = tx.register_create(RecordId::temporary(0), None).unwrap();

        let mut p = payload("a");
        p.set("other", FieldValue::Link(RecordId::temporary(9)));
        tx.create(assigned, p).unwrap();

        let err = tx.commit().unwrap_err();
        assert_eq!(err, Error::UnresolvedTemporary(RecordId::temporary(9)));
        // Nothing applied.
        assert_eq!(store.record_count(), 0);
    }

    #[test]
    fn test_commit_is_all_or_nothing() {
        let store = LocalStore::new();
        let existing = store.seed(DEFAULT_CLUSTER, payload("old")).unwrap();

        let mut tx = store.begin();
        let assigned = tx.register_create(RecordId::temporary(0), None).unwrap();
        tx.create(assigned, payload("new")).unwrap();
        tx.update(existing, payload("changed"), 0).unwrap();

        // Concurrent writer bumps the version between staging and commit.
        store.force_put(existing, payload("raced"), 1);

        let err = tx.commit().unwrap_err();
        assert!(matches!(err, Error::ConcurrentModification { .. }));

        // Neither the create nor the update landed.
        assert!(store.read(&assigned).is_none());
        assert_eq!(store.read(&existing).unwrap().payload, payload("raced"));
    }

    #[test]
    fn test_rollback_discards_staged() {
        let store = LocalStore::new();
        let mut tx = store.begin();
        let assigned = tx.register_create(RecordId::temporary(0), None).unwrap();
        tx.create(assigned, payload("a")).unwrap();
        tx.rollback();

        assert!(!tx.is_active());
        assert_eq!(store.record_count(), 0);
        assert!(tx.create(assigned, payload("a")).is_err());
    }

    #[test]
    fn test_read_sees_staged_overlay() {
        let store = LocalStore::new();
        let rid = store.seed(DEFAULT_CLUSTER, payload("a")).unwrap();

        let mut tx = store.begin();
        tx.update(rid, payload("b"), 0).unwrap();
        assert_eq!(tx.read(&rid).unwrap().payload, payload("b"));

        tx.delete(rid, 0).unwrap();
        assert!(tx.read(&rid).is_none());

        // The store itself is untouched until commit.
        assert_eq!(store.read(&rid).unwrap().payload, payload("a"));
    }

    #[test]
    fn test_duplicate_create_rejected() {
        let store = LocalStore::new();
        let rid = store.seed(DEFAULT_CLUSTER, payload("a")).unwrap();

        let mut tx = store.begin();
        assert_eq!(
            tx.create(rid, payload("b")).unwrap_err(),
            Error::DuplicateRecord(rid)
        );
    }

    #[test]
    fn test_force_ops() {
        let store = LocalStore::new();
        let rid = RecordId::new(0, 5);
        store.force_put(rid, payload("fixed"), 3);
        assert_eq!(store.version_of(&rid), Some(3));

        assert!(store.force_remove(&rid));
        assert!(!store.force_remove(&rid));
    }
}
