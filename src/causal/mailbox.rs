//! Causal delivery of remote operations.
//!
//! The mailbox stamps outgoing operations with the local vector clock and
//! withholds incoming ones until everything their sender had seen has been
//! delivered locally. Delivered operations are not applied here: they are
//! pushed onto a channel that the tree-owning session drains.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

use crate::causal::vector_clock::VectorClock;
use crate::causal::wire::{Payload, SyncBatch, WireMessage};
use crate::crdt::op::Operation;
use crate::crdt::types::SiteId;
use crate::error::Result;
use crate::transport::{PeerSyncContext, Transport};

/// Default number of operations per history sync batch.
pub const DEFAULT_SYNC_BATCH_SIZE: usize = 1000;

/// What the mailbox hands to the tree, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery<V> {
    /// One causally ready remote operation.
    Operation(Operation<V>),
    /// One batch of a history sync, in history order.
    Sync(Vec<Operation<V>>),
}

/// A remote operation waiting for its causal dependencies.
struct Pending<V> {
    vclock: VectorClock,
    op: Operation<V>,
    /// Arrival sequence, breaks ties between clocks that compare equal
    arrival: u64,
}

impl<V> PartialEq for Pending<V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<V> Eq for Pending<V> {}

impl<V> PartialOrd for Pending<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<V> Ord for Pending<V> {
    // BinaryHeap pops the greatest, so the causally smallest clock must
    // compare greatest here.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .vclock
            .compare_to(&self.vclock)
            .then_with(|| other.arrival.cmp(&self.arrival))
    }
}

/// Per-session causal delivery queue.
pub struct CausalMailbox<V> {
    vclock: VectorClock,
    queue: BinaryHeap<Pending<V>>,
    arrivals: u64,
    sync_batch_size: usize,
    deliveries: UnboundedSender<Delivery<V>>,
}

impl<V> CausalMailbox<V>
where
    V: Clone + Serialize + DeserializeOwned,
{
    /// Creates a mailbox for `site` and the receiver its deliveries go to.
    pub fn new(
        site: impl Into<SiteId>,
        sync_batch_size: usize,
    ) -> (Self, UnboundedReceiver<Delivery<V>>) {
        let (tx, rx) = unbounded_channel();
        let mailbox = CausalMailbox {
            vclock: VectorClock::new(site),
            queue: BinaryHeap::new(),
            arrivals: 0,
            sync_batch_size: sync_batch_size.max(1),
            deliveries: tx,
        };
        (mailbox, rx)
    }

    pub fn site(&self) -> &SiteId {
        self.vclock.site()
    }

    /// The local vector clock.
    pub fn clock(&self) -> &VectorClock {
        &self.vclock
    }

    /// Number of operations still waiting for dependencies.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Stamps `op` with the advanced local clock and sends it to all peers.
    pub fn broadcast<T>(&mut self, transport: &T, op: &Operation<V>) -> Result<()>
    where
        T: Transport + ?Sized,
    {
        self.vclock.increment();
        let message = WireMessage::operation(self.vclock.clone(), op.clone()).encode()?;
        transport.broadcast_to_connected_peers(message)
    }

    /// Processes one raw inbound message.
    ///
    /// Operations are queued and everything that became ready is delivered.
    /// Sync batches are delivered immediately; the sender's clock is merged
    /// only with the last batch, after which queued operations are
    /// re-examined.
    pub fn handle(&mut self, raw: &str) -> Result<()> {
        let message = WireMessage::<V>::decode(raw)?;

        match message.payload {
            Payload::Operation(op) => {
                self.enqueue(message.vector_clock, op);
                self.deliver_ready()?;
                debug!(site = %self.site(), pending = self.queue.len(), "message queue size");
            }
            Payload::Sync(batch) => {
                debug!(
                    site = %self.site(),
                    from = %message.vector_clock.site(),
                    "syncing batch {}/{}",
                    batch.batch_number,
                    batch.last_batch_number
                );
                let last = batch.is_last();
                self.deliveries.send(Delivery::Sync(batch.operations))?;
                if last {
                    self.vclock.merge(&message.vector_clock);
                    self.deliver_ready()?;
                }
            }
        }
        Ok(())
    }

    /// Streams `history` to one peer in numbered batches.
    ///
    /// An empty history still produces one empty final batch so the peer
    /// always learns this site's clock.
    pub fn sync<C>(&self, context: &C, history: &[Operation<V>]) -> Result<()>
    where
        C: PeerSyncContext + ?Sized,
    {
        let batch_count = history.len().div_ceil(self.sync_batch_size).max(1);
        let last_batch_number = (batch_count - 1) as u64;

        for batch_number in 0..batch_count {
            let start = batch_number * self.sync_batch_size;
            let end = (start + self.sync_batch_size).min(history.len());
            debug!(
                peer = %context.peer(),
                "sending batch {}/{}",
                batch_number,
                last_batch_number
            );

            let batch = SyncBatch {
                batch_number: batch_number as u64,
                last_batch_number,
                operations: history[start..end].to_vec(),
            };
            context.sync(WireMessage::sync(self.vclock.clone(), batch).encode()?)?;
        }
        Ok(())
    }

    fn enqueue(&mut self, vclock: VectorClock, op: Operation<V>) {
        self.arrivals += 1;
        self.queue.push(Pending {
            vclock,
            op,
            arrival: self.arrivals,
        });
    }

    /// Releases queued operations while they are causally ready.
    ///
    /// The queue head is preferred. When the head is blocked, a ready
    /// operation it causally depends on is pulled out from further down,
    /// since the draw order among concurrent clocks is not a total order and
    /// can bury a dependency beneath its dependent.
    fn deliver_ready(&mut self) -> Result<()> {
        while let Some(head) = self.queue.peek() {
            let sender = head.vclock.site();
            let sent = head.vclock.get(sender);
            let seen = self.vclock.get(sender);

            // Already incorporated, by an earlier delivery or a sync history.
            // Left in place it would block the queue forever.
            if sent <= seen {
                debug!(
                    site = %self.site(),
                    %sender,
                    sent,
                    "discarding already delivered message"
                );
                self.queue.pop();
                continue;
            }

            let entry = if self.is_ready(head) {
                self.queue.pop()
            } else {
                self.take_ready_dependency()
            };
            let Some(entry) = entry else {
                break;
            };
            self.deliveries.send(Delivery::Operation(entry.op))?;
            self.vclock.merge(&entry.vclock);
        }
        Ok(())
    }

    fn is_ready(&self, pending: &Pending<V>) -> bool {
        let sender = pending.vclock.site();
        let sent = pending.vclock.get(sender);
        sent == self.vclock.get(sender) + 1
            && pending
                .vclock
                .all_less_than_or_equal_except(sender, &self.vclock)
    }

    /// Removes a ready operation that happened before the queue head.
    fn take_ready_dependency(&mut self) -> Option<Pending<V>> {
        let head = self.queue.peek()?.vclock.clone();
        let mut entries = std::mem::take(&mut self.queue).into_vec();
        let found = entries
            .iter()
            .position(|entry| entry.vclock.happened_before(&head) && self.is_ready(entry));
        let taken = found.map(|i| entries.swap_remove(i));
        self.queue = BinaryHeap::from(entries);
        if let Some(entry) = &taken {
            debug!(
                site = %self.site(),
                sender = %entry.vclock.site(),
                "releasing dependency of blocked queue head"
            );
        }
        taken
    }
}
