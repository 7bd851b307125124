//! Core RGA CRDT implementation.
//!
//! This module contains the `ReplicatedTree` struct and its operations. Each
//! element is a node anchored under the element it was inserted after;
//! concurrent insertions under the same anchor are ordered by the sibling
//! tie-break in [`compare_siblings`].

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::crdt::node::{NodeId, RgaNode, compare_siblings};
use crate::crdt::op::{InsertOp, Operation, RemoveOp};
use crate::crdt::order_index::OrderIndex;
use crate::crdt::types::{HappenedBeforeSet, SiteId, Timestamp};
use crate::error::{Error, Result};

/// The Replicated Growable Array, stored as a tree.
///
/// # Design
///
/// - Nodes live in an arena and never leave it; removal only hides them
/// - `cache` resolves a timestamp to its node in O(1)
/// - `index` mirrors the visible pre-order so positions resolve in O(log n)
/// - Mutation takes `&mut self`; a tree belongs to exactly one peer session
///
/// Tombstones are kept forever. Memory grows with the number of insertions
/// ever made, in exchange for any late operation always finding its anchor.
#[derive(Debug, Clone)]
pub struct ReplicatedTree<V> {
    /// The site this replica mints timestamps for
    site: SiteId,
    /// Clock of the last locally minted timestamp
    clock: u64,
    nodes: Vec<RgaNode<V>>,
    cache: HashMap<Timestamp, NodeId>,
    index: OrderIndex<NodeId>,
}

impl<V: Clone> ReplicatedTree<V> {
    /// Creates an empty tree holding only the virtual root.
    pub fn new(site: impl Into<SiteId>) -> Self {
        let mut index = OrderIndex::new();
        let root_location = index.push_front(NodeId::ROOT, false);
        let root = RgaNode::root(root_location);

        let mut cache = HashMap::new();
        cache.insert(root.timestamp.clone(), NodeId::ROOT);

        ReplicatedTree {
            site: site.into(),
            clock: 0,
            nodes: vec![root],
            cache,
            index,
        }
    }

    pub fn site(&self) -> &SiteId {
        &self.site
    }

    /// Clock of the last locally minted timestamp.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    /// Number of visible elements.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of nodes ever inserted, tombstones included, root excluded.
    pub fn total_node_count(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Returns true if the insert with `timestamp` has been applied.
    pub fn contains(&self, timestamp: &Timestamp) -> bool {
        self.cache.contains_key(timestamp)
    }

    pub fn lookup(&self, timestamp: &Timestamp) -> Option<NodeId> {
        self.cache.get(timestamp).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&RgaNode<V>> {
        self.nodes.get(id.0)
    }

    /// The value at visible `position`.
    pub fn get(&self, position: usize) -> Option<&V> {
        let id = self.index.peek(position)?;
        self.nodes[id.0].value.as_ref()
    }

    /// Inserts `value` so that it ends up at visible `position`.
    ///
    /// The new node is anchored under the element currently at
    /// `position - 1`, or under the root for position 0. Returns the applied
    /// operation for broadcast.
    pub fn insert(&mut self, value: V, position: usize) -> Result<InsertOp<V>> {
        let length = self.len();
        if position > length {
            return Err(Error::PositionOutOfRange { position, length });
        }

        let reference = if position == 0 {
            NodeId::ROOT
        } else {
            self.index
                .get(position - 1)
                .ok_or(Error::PositionOutOfRange { position, length })?
        };

        self.clock += 1;
        let timestamp = Timestamp::new(self.site.clone(), self.clock);

        // every sibling the author can see right now, hidden ones included
        let reference_node = &self.nodes[reference.0];
        let happened_before = reference_node
            .children
            .iter()
            .map(|child| self.nodes[child.0].timestamp.clone())
            .collect::<HappenedBeforeSet>();

        let op = InsertOp {
            value,
            timestamp,
            happened_before,
            reference_timestamp: reference_node.timestamp.clone(),
        };
        self.apply_insert(&op)?;
        Ok(op)
    }

    /// Hides the element at visible `position`.
    pub fn remove(&mut self, position: usize) -> Result<RemoveOp> {
        let length = self.len();
        let id = self
            .index
            .get(position)
            .ok_or(Error::PositionOutOfRange { position, length })?;

        let op = RemoveOp {
            timestamp: self.nodes[id.0].timestamp.clone(),
        };
        self.apply_remove(&op)?;
        Ok(op)
    }

    /// Applies a local or remote operation.
    ///
    /// Re-applying an operation is a no-op. Referencing an unknown timestamp
    /// is a protocol violation: causal delivery guarantees dependencies
    /// arrive first.
    pub fn apply(&mut self, op: &Operation<V>) -> Result<()> {
        match op {
            Operation::Insert(insert) => self.apply_insert(insert),
            Operation::Remove(remove) => self.apply_remove(remove),
        }
    }

    fn apply_insert(&mut self, op: &InsertOp<V>) -> Result<()> {
        if self.cache.contains_key(&op.timestamp) {
            trace!(timestamp = %op.timestamp, "insert already applied");
            return Ok(());
        }

        let parent = self
            .lookup(&op.reference_timestamp)
            .ok_or_else(|| Error::UnknownTimestamp(op.reference_timestamp.clone()))?;

        // Children are ascending; the usual case is a new sibling that beats
        // all others, so scan from the greatest end.
        let siblings = &self.nodes[parent.0].children;
        let slot = siblings
            .iter()
            .rposition(|sibling| {
                let sibling = &self.nodes[sibling.0];
                compare_siblings(
                    &sibling.timestamp,
                    &sibling.happened_before,
                    &op.timestamp,
                    &op.happened_before,
                )
                .is_lt()
            })
            .map_or(0, |i| i + 1);

        // Directly after the parent when the new node comes first in
        // document order, otherwise after the whole subtree of the sibling
        // right before it.
        let id = NodeId(self.nodes.len());
        let location = match siblings.get(slot).copied() {
            Some(sibling) => self
                .index
                .insert_after_subtree(self.nodes[sibling.0].location, id),
            None => self.index.insert_after(self.nodes[parent.0].location, id),
        };

        self.nodes.push(RgaNode::branch(
            op.value.clone(),
            op.timestamp.clone(),
            op.happened_before.clone(),
            parent,
            location,
        ));
        self.nodes[parent.0].children.insert(slot, id);
        self.cache.insert(op.timestamp.clone(), id);

        trace!(
            timestamp = %op.timestamp,
            reference = %op.reference_timestamp,
            "applied insert"
        );
        Ok(())
    }

    fn apply_remove(&mut self, op: &RemoveOp) -> Result<()> {
        if op.timestamp.is_root() {
            return Err(Error::RootRemoval);
        }

        let id = self
            .lookup(&op.timestamp)
            .ok_or_else(|| Error::UnknownTimestamp(op.timestamp.clone()))?;

        let node = &mut self.nodes[id.0];
        if node.hidden {
            trace!(timestamp = %op.timestamp, "remove already applied");
            return Ok(());
        }
        node.hidden = true;
        self.index.remove_at(node.location);

        trace!(timestamp = %op.timestamp, "applied remove");
        Ok(())
    }

    /// Visible values in document order, read off the order index.
    pub fn to_array(&self) -> Vec<V> {
        self.index
            .iter()
            .filter_map(|id| self.nodes[id.0].value.clone())
            .collect()
    }

    /// Visible values in document order, read off a pre-order walk of the
    /// tree. Always equal to [`to_array`](Self::to_array).
    pub fn pre_order_values(&self) -> Vec<V> {
        let mut values = Vec::with_capacity(self.len());
        let mut stack = vec![NodeId::ROOT];

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            if let (false, Some(value)) = (node.hidden, &node.value) {
                values.push(value.clone());
            }
            // ascending children pop greatest first, which is document order
            stack.extend(node.children.iter().copied());
        }
        values
    }

    /// Operations that rebuild this tree on an empty replica.
    ///
    /// Inserts come breadth-first so every reference precedes its dependents,
    /// followed by one remove per hidden node.
    pub fn history(&self) -> Vec<Operation<V>> {
        let mut inserts = Vec::with_capacity(self.nodes.len());
        let mut removes = Vec::new();
        let mut queue = VecDeque::from([NodeId::ROOT]);

        while let Some(id) = queue.pop_front() {
            let node = &self.nodes[id.0];
            queue.extend(node.children());

            let (Some(parent), Some(value)) = (node.parent, &node.value) else {
                continue;
            };
            inserts.push(Operation::Insert(InsertOp {
                value: value.clone(),
                timestamp: node.timestamp.clone(),
                happened_before: node.happened_before.clone(),
                reference_timestamp: self.nodes[parent.0].timestamp.clone(),
            }));
            if node.hidden {
                removes.push(Operation::Remove(RemoveOp {
                    timestamp: node.timestamp.clone(),
                }));
            }
        }

        inserts.extend(removes);
        inserts
    }
}

impl ReplicatedTree<char> {
    /// Inserts every character of `text` starting at `position`.
    pub fn insert_str(&mut self, position: usize, text: &str) -> Result<Vec<InsertOp<char>>> {
        let length = self.len();
        if position > length {
            return Err(Error::PositionOutOfRange { position, length });
        }
        text.chars()
            .enumerate()
            .map(|(offset, ch)| self.insert(ch, position + offset))
            .collect()
    }

    /// The visible content as a string.
    pub fn text(&self) -> String {
        self.to_array().into_iter().collect()
    }
}
