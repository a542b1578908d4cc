//! Record payloads and field values
//!
//! A record payload is an ordered map of named fields. Fields may reference
//! other records by identifier, either directly (`Link`) or as a collection
//! (`LinkList`). Those references are what temporary-identifier resolution
//! rewrites before a transaction serializes its records.

use crate::rid::RecordId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value of a single record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// Absent value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    I64(i64),
    /// Floating point.
    F64(f64),
    /// UTF-8 string.
    String(String),
    /// Direct reference to another record.
    Link(RecordId),
    /// Collection of references to other records.
    LinkList(Vec<RecordId>),
}

/// Mutable field map of a record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    fields: BTreeMap<String, FieldValue>,
}

impl RecordPayload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) -> &mut Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Read a field.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Names of all fields, in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the payload has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Rewrite every record reference through `resolve`.
    ///
    /// Applied to link-valued and link-collection fields so that temporary
    /// identifiers established earlier in a batch are replaced by their
    /// resolved counterparts before the payload is serialized.
    pub fn resolve_links<F>(&mut self, resolve: F)
    where
        F: Fn(RecordId) -> RecordId,
    {
        for value in self.fields.values_mut() {
            match value {
                FieldValue::Link(rid) => *rid = resolve(*rid),
                FieldValue::LinkList(rids) => {
                    for rid in rids.iter_mut() {
                        *rid = resolve(*rid);
                    }
                }
                _ => {}
            }
        }
    }

    /// True if any link field still holds a temporary identifier.
    pub fn contains_temporary(&self) -> bool {
        self.first_temporary().is_some()
    }

    /// The first temporary identifier found in any link field, if any.
    pub fn first_temporary(&self) -> Option<RecordId> {
        self.fields.values().find_map(|value| match value {
            FieldValue::Link(rid) if rid.is_temporary() => Some(*rid),
            FieldValue::LinkList(rids) => rids.iter().copied().find(RecordId::is_temporary),
            _ => None,
        })
    }
}

/// A record payload together with its committed version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedRecord {
    /// Field data.
    pub payload: RecordPayload,
    /// Committed version; 0 for a freshly created record.
    pub version: u64,
}

impl VersionedRecord {
    /// Pair a payload with a version.
    pub fn new(payload: RecordPayload, version: u64) -> Self {
        VersionedRecord { payload, version }
    }
}
