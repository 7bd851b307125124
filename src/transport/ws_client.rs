//! WebSocket client transport for the relay server.
//!
//! `WsTransport::connect` performs the handshake, waits for the relay's
//! welcome frame to learn the local site id, then runs one task pumping
//! outbound frames into the socket and one task turning inbound frames into
//! [`TransportEvent`]s.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::crdt::types::SiteId;
use crate::error::{Error, Result};
use crate::transport::relay_protocol::{ClientFrame, RelayFrame};
use crate::transport::{Transport, TransportEvent};

/// Handle on a relay connection. Dropping it closes the socket once queued
/// frames are flushed.
pub struct WsTransport {
    site: SiteId,
    outbound: UnboundedSender<ClientFrame>,
}

impl WsTransport {
    /// Connects to a relay at `url` (e.g. `ws://127.0.0.1:8443/ws`).
    pub async fn connect(url: &str) -> Result<(Self, UnboundedReceiver<TransportEvent>)> {
        let (socket, _response) = connect_async(url).await?;
        let (mut sink, mut stream) = socket.split();

        let site = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<RelayFrame>(&text)? {
                    RelayFrame::Welcome { peer_id } => break peer_id,
                    other => {
                        return Err(Error::UnexpectedFrame(format!("{other:?} before welcome")));
                    }
                },
                Some(Ok(Message::Close(_))) | None => return Err(Error::ChannelClosed),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        };
        info!(%site, url, "connected to relay");

        let (events_tx, events_rx) = unbounded_channel();
        let _ = events_tx.send(TransportEvent::IdAssigned(site.clone()));

        let (outbound_tx, mut outbound_rx) = unbounded_channel::<ClientFrame>();
        tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("failed to encode frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!("failed to send frame: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let reader_site = site.clone();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let frame = match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<RelayFrame>(&text) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(site = %reader_site, "ignoring malformed relay frame: {}", e);
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(site = %reader_site, "relay connection error: {}", e);
                        break;
                    }
                };

                let event = match frame {
                    RelayFrame::Data { from, payload } => TransportEvent::Data {
                        peer: from,
                        payload,
                    },
                    RelayFrame::SyncRequested { peer } => TransportEvent::SyncRequested { peer },
                    RelayFrame::PeerLeft { peer } => TransportEvent::PeerLeft(peer),
                    RelayFrame::Welcome { .. } => {
                        warn!(site = %reader_site, "ignoring repeated welcome");
                        continue;
                    }
                };
                if events_tx.send(event).is_err() {
                    break;
                }
            }
            debug!(site = %reader_site, "relay stream ended");
            let _ = events_tx.send(TransportEvent::Closed);
        });

        let transport = WsTransport {
            site,
            outbound: outbound_tx,
        };
        Ok((transport, events_rx))
    }

    fn send_frame(&self, frame: ClientFrame) -> Result<()> {
        self.outbound.send(frame)?;
        Ok(())
    }
}

impl Transport for WsTransport {
    fn id(&self) -> Option<SiteId> {
        Some(self.site.clone())
    }

    fn broadcast_to_connected_peers(&self, message: String) -> Result<()> {
        self.send_frame(ClientFrame::Broadcast { payload: message })
    }

    fn send_to(&self, peer: &SiteId, message: String) -> Result<()> {
        self.send_frame(ClientFrame::Direct {
            to: peer.clone(),
            payload: message,
        })
    }
}
