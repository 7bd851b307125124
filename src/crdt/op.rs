//! Operations produced and consumed by the replicated tree.
//!
//! Operations are immutable values. A site creates one per local edit, applies
//! it locally and broadcasts it; every other site applies the same value.

use serde::{Deserialize, Serialize};

use crate::crdt::types::{HappenedBeforeSet, Timestamp};

/// Inserts `value` as a child of the node identified by `reference_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOp<V> {
    pub value: V,
    pub timestamp: Timestamp,
    pub happened_before: HappenedBeforeSet,
    pub reference_timestamp: Timestamp,
}

/// Hides the node created by the insert with `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveOp {
    pub timestamp: Timestamp,
}

/// A replayable edit of the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation<V> {
    Insert(InsertOp<V>),
    Remove(RemoveOp),
}

impl<V> Operation<V> {
    /// The timestamp this operation is about: the new node for inserts, the
    /// target node for removals.
    pub fn timestamp(&self) -> &Timestamp {
        match self {
            Operation::Insert(insert) => &insert.timestamp,
            Operation::Remove(remove) => &remove.timestamp,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Operation::Insert(_))
    }
}

impl<V> From<InsertOp<V>> for Operation<V> {
    fn from(op: InsertOp<V>) -> Self {
        Operation::Insert(op)
    }
}

impl<V> From<RemoveOp> for Operation<V> {
    fn from(op: RemoveOp) -> Self {
        Operation::Remove(op)
    }
}
