//! Node definition for the replicated tree.
//!
//! Nodes live in an arena owned by [`ReplicatedTree`](crate::crdt::rga::ReplicatedTree)
//! and refer to each other through [`NodeId`] indices, so parent links and
//! index handles never form ownership cycles.

use std::cmp::Ordering;

use crate::crdt::order_index::Location;
use crate::crdt::types::{HappenedBeforeSet, Timestamp};

/// Index of a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// The virtual root always occupies the first arena slot.
    pub const ROOT: NodeId = NodeId(0);
}

/// Represents one element of the replicated tree.
///
/// The root is a hidden node without a value that sorts before everything.
/// Every other node is a branch created by exactly one insert operation.
///
/// # Tombstone Deletion
///
/// Removing an element only sets `hidden`. The node, its value and its
/// children stay in place so that operations referencing it remain
/// resolvable on every replica.
#[derive(Debug, Clone)]
pub struct RgaNode<V> {
    /// Identity of the insert that created this node
    pub timestamp: Timestamp,
    /// Siblings the author had observed when inserting
    pub happened_before: HappenedBeforeSet,
    /// `None` only for the root
    pub value: Option<V>,
    /// Whether this node has been removed (tombstone)
    pub hidden: bool,
    /// Children sorted ascending by [`compare_siblings`]; document order is
    /// the reverse
    pub(crate) children: Vec<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) location: Location,
}

impl<V> RgaNode<V> {
    pub(crate) fn root(location: Location) -> Self {
        RgaNode {
            timestamp: Timestamp::root(),
            happened_before: HappenedBeforeSet::new(),
            value: None,
            hidden: true,
            children: Vec::new(),
            parent: None,
            location,
        }
    }

    pub(crate) fn branch(
        value: V,
        timestamp: Timestamp,
        happened_before: HappenedBeforeSet,
        parent: NodeId,
        location: Location,
    ) -> Self {
        RgaNode {
            timestamp,
            happened_before,
            value: Some(value),
            hidden: false,
            children: Vec::new(),
            parent: Some(parent),
            location,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Returns true if this node is part of the visible content.
    pub fn is_visible(&self) -> bool {
        !self.hidden
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in document order.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children.iter().rev().copied()
    }
}

/// Tie-break order between two children of the same reference node.
///
/// `Less` means `a` was causally older than `b`, or lost the concurrent
/// tie-break. Greater siblings come first in the document, so the most recent
/// insertion at a position appears right after the reference node.
pub fn compare_siblings(
    a_timestamp: &Timestamp,
    a_history: &HappenedBeforeSet,
    b_timestamp: &Timestamp,
    b_history: &HappenedBeforeSet,
) -> Ordering {
    if a_timestamp == b_timestamp {
        return Ordering::Equal;
    }
    if b_history.contains(a_timestamp) {
        return Ordering::Less;
    }
    if a_history.contains(b_timestamp) {
        return Ordering::Greater;
    }

    // Neither author saw the other: compare what each one saw that the other
    // did not, own timestamp included. Both differences contain at least the
    // author's own timestamp, and they cannot share a minimum.
    let a_only = a_history.with(a_timestamp).difference(b_history);
    let b_only = b_history.with(b_timestamp).difference(a_history);
    a_only.min().cmp(&b_only.min())
}

impl<V> RgaNode<V> {
    /// Applies [`compare_siblings`] to two nodes.
    pub fn compare_to(&self, other: &RgaNode<V>) -> Ordering {
        compare_siblings(
            &self.timestamp,
            &self.happened_before,
            &other.timestamp,
            &other.happened_before,
        )
    }
}
