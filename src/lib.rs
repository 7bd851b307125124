//! # causal-rga - collaborative text over a Replicated Growable Array
//!
//! An RGA tree CRDT for ordered sequences, a causal mailbox that delivers
//! remote operations only once their dependencies have been applied, and a
//! small relay so that peers can find each other.
//!
//! ## Features
//!
//! - **Conflict-free**: replicas that applied the same operations hold the same sequence
//! - **Causally delivered**: vector clocks hold operations back until they are ready
//! - **Indexed**: a splay-tree order index gives O(log n) amortized positional access
//! - **Tombstones**: removed elements stay in the tree so late inserts still find their anchor
//! - **History sync**: a newcomer receives the full operation history in batches
//!
//! ## Example
//!
//! ```rust
//! use causal_rga::{Operation, ReplicatedTree};
//!
//! let mut alice = ReplicatedTree::new("alice");
//! let mut bob = ReplicatedTree::new("bob");
//!
//! for op in alice.insert_str(0, "Hello").unwrap() {
//!     bob.apply(&Operation::Insert(op)).unwrap();
//! }
//! assert_eq!(bob.text(), "Hello");
//! ```

pub mod causal;
pub mod config;
pub mod crdt;
pub mod error;
pub mod replica;
pub mod server;
pub mod transport;

// Re-export the main public API
pub use causal::{CausalMailbox, Delivery, VectorClock, WireMessage};
pub use config::Config;
pub use crdt::{InsertOp, Operation, RemoveOp, ReplicatedTree, SiteId, Timestamp};
pub use error::{Error, Result};
pub use replica::Replica;
pub use transport::{LocalHub, Transport, TransportEvent, WsTransport};
