//! One peer's editing session.
//!
//! A `Replica` owns the tree, the mailbox, the mailbox's delivery receiver and
//! the transport handle. Local edits are applied and broadcast; transport
//! events are fed through the mailbox and whatever it delivers is applied to
//! the tree before control returns.

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use crate::causal::mailbox::{CausalMailbox, Delivery};
use crate::config::Config;
use crate::crdt::op::{InsertOp, Operation, RemoveOp};
use crate::crdt::rga::ReplicatedTree;
use crate::crdt::types::SiteId;
use crate::error::{Error, Result};
use crate::transport::{PeerSync, Transport, TransportEvent};

/// A text replica bound to one transport.
pub struct Replica<T> {
    tree: ReplicatedTree<char>,
    mailbox: CausalMailbox<char>,
    deliveries: UnboundedReceiver<Delivery<char>>,
    transport: T,
}

impl<T: Transport> Replica<T> {
    /// Creates a session for an already known site id.
    pub fn new(site: impl Into<SiteId>, transport: T, config: &Config) -> Self {
        let site = site.into();
        let (mailbox, deliveries) = CausalMailbox::new(site.clone(), config.sync_batch_size);
        Replica {
            tree: ReplicatedTree::new(site),
            mailbox,
            deliveries,
            transport,
        }
    }

    /// Waits for the transport to assign a site id, then creates the session.
    ///
    /// Departures seen before the id are skipped; any other event first is
    /// an error.
    pub async fn join(
        transport: T,
        events: &mut UnboundedReceiver<TransportEvent>,
        config: &Config,
    ) -> Result<Self> {
        loop {
            match events.recv().await {
                Some(TransportEvent::IdAssigned(site)) => {
                    info!(%site, "joined session");
                    return Ok(Replica::new(site, transport, config));
                }
                Some(TransportEvent::Closed) | None => return Err(Error::ChannelClosed),
                Some(TransportEvent::PeerLeft(peer)) => {
                    debug!(%peer, "peer left before id assignment");
                }
                Some(other) => {
                    return Err(Error::UnexpectedFrame(format!(
                        "{other:?} before id assignment"
                    )));
                }
            }
        }
    }

    pub fn site(&self) -> &SiteId {
        self.tree.site()
    }

    pub fn tree(&self) -> &ReplicatedTree<char> {
        &self.tree
    }

    pub fn mailbox(&self) -> &CausalMailbox<char> {
        &self.mailbox
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn text(&self) -> String {
        self.tree.text()
    }

    /// Inserts locally and broadcasts the operation.
    pub fn insert(&mut self, value: char, position: usize) -> Result<InsertOp<char>> {
        let op = self.tree.insert(value, position)?;
        self.mailbox
            .broadcast(&self.transport, &Operation::Insert(op.clone()))?;
        Ok(op)
    }

    /// Removes locally and broadcasts the operation.
    pub fn remove(&mut self, position: usize) -> Result<RemoveOp> {
        let op = self.tree.remove(position)?;
        self.mailbox
            .broadcast(&self.transport, &Operation::Remove(op.clone()))?;
        Ok(op)
    }

    /// Inserts every character of `text` starting at `position`.
    pub fn insert_str(&mut self, position: usize, text: &str) -> Result<()> {
        let length = self.tree.len();
        if position > length {
            return Err(Error::PositionOutOfRange { position, length });
        }
        for (offset, ch) in text.chars().enumerate() {
            self.insert(ch, position + offset)?;
        }
        Ok(())
    }

    /// Handles one transport event. Returns false once the transport closed.
    pub fn handle_event(&mut self, event: TransportEvent) -> Result<bool> {
        match event {
            TransportEvent::Data { peer, payload } => {
                debug!(site = %self.site(), %peer, "received message");
                self.mailbox.handle(&payload)?;
                self.apply_deliveries()?;
            }
            TransportEvent::SyncRequested { peer } => {
                let history = self.tree.history();
                info!(
                    site = %self.site(),
                    %peer,
                    operations = history.len(),
                    "syncing history to new peer"
                );
                let context = PeerSync::new(&self.transport, peer);
                self.mailbox.sync(&context, &history)?;
            }
            TransportEvent::PeerLeft(peer) => {
                info!(site = %self.site(), %peer, "peer left");
            }
            TransportEvent::IdAssigned(site) => {
                if &site != self.site() {
                    warn!(current = %self.site(), %site, "ignoring second id assignment");
                }
            }
            TransportEvent::Closed => return Ok(false),
        }
        Ok(true)
    }

    /// Handles every event already queued, without waiting. Returns how many
    /// were handled.
    pub fn poll_events(&mut self, events: &mut UnboundedReceiver<TransportEvent>) -> Result<usize> {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            handled += 1;
            if !self.handle_event(event)? {
                break;
            }
        }
        Ok(handled)
    }

    /// Handles events until the transport closes.
    pub async fn run(&mut self, events: &mut UnboundedReceiver<TransportEvent>) -> Result<()> {
        while let Some(event) = events.recv().await {
            if !self.handle_event(event)? {
                break;
            }
        }
        info!(site = %self.site(), "transport closed");
        Ok(())
    }

    fn apply_deliveries(&mut self) -> Result<()> {
        while let Ok(delivery) = self.deliveries.try_recv() {
            match delivery {
                Delivery::Operation(op) => self.tree.apply(&op)?,
                Delivery::Sync(ops) => {
                    for op in &ops {
                        self.tree.apply(op)?;
                    }
                }
            }
        }
        Ok(())
    }
}
