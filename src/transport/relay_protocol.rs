//! Frames spoken between peers and the relay server.
//!
//! Frames travel as JSON in WebSocket text frames, tagged by `type`. The
//! `payload` of a frame is an encoded [`WireMessage`](crate::causal::wire::WireMessage)
//! that the relay forwards untouched.

use serde::{Deserialize, Serialize};

use crate::crdt::types::SiteId;

/// Relay to peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayFrame {
    Welcome { peer_id: SiteId },
    Data { from: SiteId, payload: String },
    SyncRequested { peer: SiteId },
    PeerLeft { peer: SiteId },
}

/// Peer to relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Broadcast { payload: String },
    Direct { to: SiteId, payload: String },
}
