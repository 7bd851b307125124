//! Transport boundary consumed by the replica.
//!
//! Peer discovery and connection management live outside the CRDT core. The
//! core only needs to broadcast a serialized message, push history to one
//! peer, learn its own site id, and receive a stream of events.
//!
//! Each transport is constructed explicitly per peer session and hands back
//! its event stream as a tokio channel receiver.

pub mod local;
pub mod relay_protocol;
pub mod ws_client;

use crate::crdt::types::SiteId;
use crate::error::Result;

pub use local::{LocalHub, LocalTransport};
pub use ws_client::WsTransport;

/// Events a transport delivers to its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The local site id is known. Sent exactly once, first.
    IdAssigned(SiteId),
    /// A serialized message arrived from `peer`.
    Data { peer: SiteId, payload: String },
    /// `peer` just joined and needs this site's history.
    SyncRequested { peer: SiteId },
    /// `peer` disconnected.
    PeerLeft(SiteId),
    /// The transport shut down; no further events follow.
    Closed,
}

/// Outbound half of a transport.
pub trait Transport {
    /// The local site id, once assigned.
    fn id(&self) -> Option<SiteId>;

    /// Sends `message` to every currently connected peer.
    fn broadcast_to_connected_peers(&self, message: String) -> Result<()>;

    /// Sends `message` to one peer.
    fn send_to(&self, peer: &SiteId, message: String) -> Result<()>;
}

/// Pushes history batches to one just-joined peer.
pub trait PeerSyncContext {
    fn peer(&self) -> &SiteId;

    fn sync(&self, message: String) -> Result<()>;
}

/// [`PeerSyncContext`] that routes through a [`Transport`].
pub struct PeerSync<'a, T: ?Sized> {
    transport: &'a T,
    peer: SiteId,
}

impl<'a, T: Transport + ?Sized> PeerSync<'a, T> {
    pub fn new(transport: &'a T, peer: SiteId) -> Self {
        PeerSync { transport, peer }
    }
}

impl<T: Transport + ?Sized> PeerSyncContext for PeerSync<'_, T> {
    fn peer(&self) -> &SiteId {
        &self.peer
    }

    fn sync(&self, message: String) -> Result<()> {
        self.transport.send_to(&self.peer, message)
    }
}
