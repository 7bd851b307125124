//! Relay server.
//!
//! Peers connect over WebSocket, get an id, and from then on the relay
//! forwards their broadcasts and direct sync frames. When a peer joins, the
//! earliest-joined peer still connected is asked to sync it.

pub mod routes;
pub mod websocket;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::crdt::types::SiteId;
use crate::transport::relay_protocol::RelayFrame;

// Re-export main server functionality
pub use routes::{HealthResponse, create_router, health, ws_handler};

/// Shared application state
pub type AppState = Arc<PeerRegistry>;

struct PeerHandle {
    id: SiteId,
    outbound: UnboundedSender<RelayFrame>,
}

/// Connected peers in join order.
pub struct PeerRegistry {
    peers: Mutex<Vec<PeerHandle>>,
    next_id: AtomicU64,
    started_at: DateTime<Utc>,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        PeerRegistry {
            peers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            started_at: Utc::now(),
        }
    }
}

impl PeerRegistry {
    pub fn new() -> AppState {
        Arc::new(Self::default())
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    pub(crate) fn next_peer_id(&self) -> SiteId {
        format!("peer-{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Adds a peer and asks the earliest-joined one to sync it. Returns the
    /// peer chosen to sync, if any.
    pub(crate) fn register(
        &self,
        id: SiteId,
        outbound: UnboundedSender<RelayFrame>,
    ) -> Option<SiteId> {
        let mut peers = self.peers.lock();
        let syncer = peers.iter().find(|peer| {
            peer.outbound
                .send(RelayFrame::SyncRequested { peer: id.clone() })
                .is_ok()
        });
        let syncer = syncer.map(|peer| peer.id.clone());
        peers.push(PeerHandle { id, outbound });
        syncer
    }

    /// Removes a peer and tells the rest it left.
    pub(crate) fn unregister(&self, id: &SiteId) {
        let mut peers = self.peers.lock();
        peers.retain(|peer| &peer.id != id);
        for peer in peers.iter() {
            let _ = peer.outbound.send(RelayFrame::PeerLeft { peer: id.clone() });
        }
    }

    /// Forwards `payload` to every peer except `from`.
    pub(crate) fn broadcast(&self, from: &SiteId, payload: &str) {
        let peers = self.peers.lock();
        for peer in peers.iter().filter(|peer| &peer.id != from) {
            let frame = RelayFrame::Data {
                from: from.clone(),
                payload: payload.to_string(),
            };
            if peer.outbound.send(frame).is_err() {
                debug!(peer = %peer.id, "dropping frame for closing session");
            }
        }
    }

    /// Forwards `payload` to one peer. Returns false if it is not connected.
    pub(crate) fn send_to(&self, from: &SiteId, to: &SiteId, payload: String) -> bool {
        let peers = self.peers.lock();
        match peers.iter().find(|peer| &peer.id == to) {
            Some(peer) => peer
                .outbound
                .send(RelayFrame::Data {
                    from: from.clone(),
                    payload,
                })
                .is_ok(),
            None => false,
        }
    }
}
