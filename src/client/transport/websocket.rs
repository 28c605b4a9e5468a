//! WebSocket link: one JSON envelope per text frame

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::ws::protocol::{ClientEvent, ConnectionId, ServerEvent};

use super::{decode, websocket_url, LinkOutcome, TransportError, TransportEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub(super) struct WsLink {
    id: ConnectionId,
    stream: WsStream,
}

impl WsLink {
    /// Open the socket and wait for the `welcome` frame
    pub(super) async fn connect(base_url: &str) -> Result<Self, TransportError> {
        let url = websocket_url(base_url);
        let (mut stream, _response) = connect_async(url.as_str()).await?;

        let id = loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(ServerEvent::Welcome { id }) => break id,
                    Ok(other) => {
                        return Err(TransportError::Handshake(format!(
                            "expected welcome, got {}",
                            other.name()
                        )))
                    }
                    Err(e) => return Err(TransportError::Handshake(e.to_string())),
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(other)) => {
                    return Err(TransportError::Handshake(format!("unexpected frame {other:?}")))
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err(TransportError::Closed),
            }
        };

        Ok(Self { id, stream })
    }

    pub(super) fn id(&self) -> ConnectionId {
        self.id
    }

    pub(super) async fn run(
        self,
        outbound_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
        events_tx: &mpsc::UnboundedSender<TransportEvent>,
    ) -> LinkOutcome {
        let (mut sink, mut stream) = self.stream.split();

        loop {
            tokio::select! {
                outbound = outbound_rx.recv() => match outbound {
                    Some(event) => {
                        let text = match serde_json::to_string(&event) {
                            Ok(text) => text,
                            Err(e) => {
                                warn!(error = %e, "Failed to encode client message");
                                continue;
                            }
                        };
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            return LinkOutcome::Lost(e.to_string());
                        }
                    }
                    None => {
                        let _ = sink.send(Message::Close(None)).await;
                        return LinkOutcome::Closed;
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
                            warn!("Received non-JSON text frame, ignoring");
                            continue;
                        };
                        if let Some(event) = decode(value) {
                            if events_tx.send(TransportEvent::Message(event)).is_err() {
                                let _ = sink.send(Message::Close(None)).await;
                                return LinkOutcome::Closed;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return LinkOutcome::Lost("server closed the connection".to_string());
                    }
                    Some(Ok(_)) => {
                        debug!("Ignoring non-text frame");
                    }
                    Some(Err(e)) => return LinkOutcome::Lost(e.to_string()),
                },
            }
        }
    }
}
