//! CRDT (Conflict-free Replicated Data Type) implementation module.
//!
//! This module contains the RGA (Replicated Growable Array) tree, the
//! positional index that backs it, and the operations exchanged between
//! replicas.

pub mod node;
pub mod op;
pub mod order_index;
pub mod rga;
pub mod types;

// Re-export the main public API
pub use node::{NodeId, RgaNode, compare_siblings};
pub use op::{InsertOp, Operation, RemoveOp};
pub use order_index::{Location, OrderIndex};
pub use rga::ReplicatedTree;
pub use types::{HappenedBeforeSet, SiteId, Timestamp};
