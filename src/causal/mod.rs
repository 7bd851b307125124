//! Causal delivery layer.
//!
//! Vector clocks, the message envelope that carries them, and the mailbox
//! that holds remote operations back until they are causally ready.

pub mod mailbox;
pub mod vector_clock;
pub mod wire;

pub use mailbox::{CausalMailbox, DEFAULT_SYNC_BATCH_SIZE, Delivery};
pub use vector_clock::VectorClock;
pub use wire::{Payload, SyncBatch, WireMessage};
