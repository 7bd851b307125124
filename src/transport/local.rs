//! In-process transport.
//!
//! `LocalHub` plays the role of the relay for peers living in the same
//! process: it assigns ids, fans broadcasts out to every other peer, and asks
//! the earliest-joined peer to sync each newcomer. Used by tests and demos.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::debug;

use crate::crdt::types::SiteId;
use crate::error::{Error, Result};
use crate::transport::{Transport, TransportEvent};

#[derive(Default)]
struct HubState {
    next_id: u64,
    /// Connected peers in join order
    peers: Vec<(SiteId, UnboundedSender<TransportEvent>)>,
}

/// Shared fan-out hub; clones refer to the same hub.
#[derive(Clone, Default)]
pub struct LocalHub {
    state: Arc<Mutex<HubState>>,
}

impl LocalHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the hub under a generated id.
    pub fn connect(&self) -> (LocalTransport, UnboundedReceiver<TransportEvent>) {
        let site = {
            let mut state = self.state.lock();
            state.next_id += 1;
            format!("peer-{}", state.next_id)
        };
        self.connect_as(site)
    }

    /// Joins the hub under an explicit id.
    pub fn connect_as(
        &self,
        site: impl Into<SiteId>,
    ) -> (LocalTransport, UnboundedReceiver<TransportEvent>) {
        let site = site.into();
        let (tx, rx) = unbounded_channel();
        // the receiver is still in hand, so this send cannot fail
        let _ = tx.send(TransportEvent::IdAssigned(site.clone()));

        let mut state = self.state.lock();
        // earliest-joined peer whose receiver is still alive
        let syncer = state.peers.iter().find(|(_, sender)| {
            sender
                .send(TransportEvent::SyncRequested { peer: site.clone() })
                .is_ok()
        });
        if let Some((existing, _)) = syncer {
            debug!(peer = %site, sync_from = %existing, "requesting sync for new peer");
        }
        state.peers.push((site.clone(), tx));
        drop(state);

        let transport = LocalTransport {
            hub: self.clone(),
            site,
        };
        (transport, rx)
    }

    pub fn peer_count(&self) -> usize {
        self.state.lock().peers.len()
    }

    fn deliver(&self, to: &SiteId, event: TransportEvent) -> Result<()> {
        let state = self.state.lock();
        let (_, sender) = state
            .peers
            .iter()
            .find(|(site, _)| site == to)
            .ok_or_else(|| Error::Transport(format!("unknown peer {to}")))?;
        sender
            .send(event)
            .map_err(|_| Error::Transport(format!("peer {to} is gone")))
    }

    fn fan_out(&self, from: &SiteId, payload: &str) {
        let state = self.state.lock();
        for (site, sender) in state.peers.iter().filter(|(site, _)| site != from) {
            if sender
                .send(TransportEvent::Data {
                    peer: from.clone(),
                    payload: payload.to_string(),
                })
                .is_err()
            {
                debug!(peer = %site, "dropping message for closed receiver");
            }
        }
    }

    fn leave(&self, site: &SiteId) {
        let mut state = self.state.lock();
        state.peers.retain(|(peer, _)| peer != site);
        for (_, sender) in &state.peers {
            let _ = sender.send(TransportEvent::PeerLeft(site.clone()));
        }
    }
}

/// One peer's handle on a [`LocalHub`]. Dropping it leaves the hub.
pub struct LocalTransport {
    hub: LocalHub,
    site: SiteId,
}

impl Transport for LocalTransport {
    fn id(&self) -> Option<SiteId> {
        Some(self.site.clone())
    }

    fn broadcast_to_connected_peers(&self, message: String) -> Result<()> {
        self.hub.fan_out(&self.site, &message);
        Ok(())
    }

    fn send_to(&self, peer: &SiteId, message: String) -> Result<()> {
        self.hub.deliver(
            peer,
            TransportEvent::Data {
                peer: self.site.clone(),
                payload: message,
            },
        )
    }
}

impl Drop for LocalTransport {
    fn drop(&mut self) {
        self.hub.leave(&self.site);
    }
}
