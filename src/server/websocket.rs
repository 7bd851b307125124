//! WebSocket session management for relay peers.
//!
//! Each session owns one socket. A writer task drains the session's outbound
//! channel into the socket while the session itself reads client frames and
//! routes them through the shared registry.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::unbounded_channel;
use tracing::{debug, error, info, warn};

use crate::crdt::types::SiteId;
use crate::server::AppState;
use crate::transport::relay_protocol::{ClientFrame, RelayFrame};

/// WebSocket session for one peer
pub struct WebSocketSession {
    stream: SplitStream<WebSocket>,
    state: AppState,
    peer_id: SiteId,
}

impl WebSocketSession {
    /// Handle the WebSocket connection lifecycle
    pub async fn run(socket: WebSocket, state: AppState) {
        let peer_id = state.next_peer_id();
        let (mut sink, stream) = socket.split();
        let (outbound, mut outbound_rx) = unbounded_channel::<RelayFrame>();

        // welcome goes first, ahead of anything other peers route here
        let _ = outbound.send(RelayFrame::Welcome {
            peer_id: peer_id.clone(),
        });
        match state.register(peer_id.clone(), outbound) {
            Some(syncer) => info!("Peer {} joined, {} syncs it", peer_id, syncer),
            None => info!("Peer {} joined an empty session", peer_id),
        }

        let writer_peer = peer_id.clone();
        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let json = match serde_json::to_string(&frame) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to encode frame for {}: {}", writer_peer, e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(json)).await {
                    debug!("Socket for {} closed: {}", writer_peer, e);
                    break;
                }
            }
        });

        let mut session = WebSocketSession {
            stream,
            state,
            peer_id,
        };
        session.read_frames().await;

        session.state.unregister(&session.peer_id);
        writer.abort();
        info!("Peer {} left", session.peer_id);
    }

    async fn read_frames(&mut self) {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(Message::Text(text)) => self.handle_text_message(&text),
                Ok(Message::Close(_)) => {
                    info!("Peer {} closed the connection", self.peer_id);
                    break;
                }
                Ok(_) => {
                    // Ignore other message types (binary, ping, pong)
                }
                Err(e) => {
                    warn!("WebSocket error for {}: {}", self.peer_id, e);
                    break;
                }
            }
        }
    }

    fn handle_text_message(&self, text: &str) {
        match serde_json::from_str::<ClientFrame>(text) {
            Ok(ClientFrame::Broadcast { payload }) => {
                self.state.broadcast(&self.peer_id, &payload);
            }
            Ok(ClientFrame::Direct { to, payload }) => {
                if !self.state.send_to(&self.peer_id, &to, payload) {
                    warn!("Peer {} sent to unknown peer {}", self.peer_id, to);
                }
            }
            Err(e) => {
                // Don't break connection for parse errors
                warn!("Failed to parse frame from {}: {}", self.peer_id, e);
            }
        }
    }
}

/// Create and handle a new WebSocket session
pub async fn handle_websocket_connection(socket: WebSocket, state: AppState) {
    WebSocketSession::run(socket, state).await;
}
