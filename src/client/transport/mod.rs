//! Client connection supervisor
//!
//! Tries each configured transport in order (WebSocket first, long-polling as
//! fallback), reconnects after a drop with a fixed delay, and gives up for
//! good once the attempt budget is spent.

mod polling;
mod websocket;

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ws::protocol::{ClientEvent, ConnectionId, ServerEvent};

use polling::PollLink;
use websocket::WsLink;

/// Reconnection attempts after the first failure or drop
pub const RECONNECTION_ATTEMPTS: u32 = 5;
/// Pause between attempts
pub const RECONNECTION_DELAY: Duration = Duration::from_millis(1000);
/// Per-transport connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(20_000);

/// Wire transports, in fallback order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    WebSocket,
    Polling,
}

impl TransportKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Some(Self::WebSocket),
            "polling" | "poll" => Some(Self::Polling),
            _ => None,
        }
    }
}

/// Connection settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// HTTP base URL of the relay, e.g. `http://127.0.0.1:3000`
    pub base_url: String,
    pub transports: Vec<TransportKind>,
    pub reconnection_attempts: u32,
    pub reconnection_delay: Duration,
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            reconnection_attempts: RECONNECTION_ATTEMPTS,
            reconnection_delay: RECONNECTION_DELAY,
            timeout: CONNECT_TIMEOUT,
        }
    }
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bad handshake: {0}")]
    Handshake(String),

    #[error("No transports configured")]
    NoTransports,

    #[error("Connection closed")]
    Closed,
}

/// What the application sees from the connection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Handshake finished; `id` is this connection's identity on the relay
    Connected {
        id: ConnectionId,
        transport: TransportKind,
    },
    Message(ServerEvent),
    /// Link dropped; a reconnect will be attempted
    Disconnected { reason: String },
    /// Attempt budget spent, no further retries
    Failed { attempts: u32 },
}

/// How a link ended
#[derive(Debug)]
enum LinkOutcome {
    /// The application closed the connection
    Closed,
    /// The link broke underneath us
    Lost(String),
}

enum Link {
    WebSocket(WsLink),
    Polling(PollLink),
}

impl Link {
    fn id(&self) -> ConnectionId {
        match self {
            Link::WebSocket(link) => link.id(),
            Link::Polling(link) => link.id(),
        }
    }

    fn kind(&self) -> TransportKind {
        match self {
            Link::WebSocket(_) => TransportKind::WebSocket,
            Link::Polling(_) => TransportKind::Polling,
        }
    }

    async fn run(
        self,
        outbound_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
        events_tx: &mpsc::UnboundedSender<TransportEvent>,
    ) -> LinkOutcome {
        match self {
            Link::WebSocket(link) => link.run(outbound_rx, events_tx).await,
            Link::Polling(link) => link.run(outbound_rx, events_tx).await,
        }
    }
}

/// Handle to a supervised connection.
///
/// Events emitted while the link is down are buffered and flushed after the
/// next connect. A reconnect gets a fresh identity, so the application has to
/// join again.
pub struct Connection {
    outbound_tx: mpsc::UnboundedSender<ClientEvent>,
    task: JoinHandle<()>,
}

impl Connection {
    /// Start connecting in the background
    pub fn open(config: TransportConfig) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(supervise(config, outbound_rx, events_tx));

        (Self { outbound_tx, task }, events_rx)
    }

    /// Queue an event for the relay
    pub fn emit(&self, event: ClientEvent) -> Result<(), TransportError> {
        self.outbound_tx
            .send(event)
            .map_err(|_| TransportError::Closed)
    }

    /// Close the link gracefully, aborting if it does not wind down in time
    pub async fn close(self) {
        let Self { outbound_tx, mut task } = self;
        drop(outbound_tx);
        if tokio::time::timeout(Duration::from_secs(5), &mut task)
            .await
            .is_err()
        {
            task.abort();
        }
    }
}

async fn supervise(
    config: TransportConfig,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientEvent>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut failures: u32 = 0;

    loop {
        match establish(&config).await {
            Ok(link) => {
                failures = 0;
                let (id, transport) = (link.id(), link.kind());
                info!(conn_id = %id, ?transport, "Connected to relay");

                if events_tx
                    .send(TransportEvent::Connected { id, transport })
                    .is_err()
                {
                    return;
                }

                match link.run(&mut outbound_rx, &events_tx).await {
                    LinkOutcome::Closed => {
                        info!(conn_id = %id, "Connection closed");
                        return;
                    }
                    LinkOutcome::Lost(reason) => {
                        warn!(conn_id = %id, %reason, "Connection lost");
                        if events_tx
                            .send(TransportEvent::Disconnected { reason })
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, attempt = failures, "Connect failed");
            }
        }

        if failures >= config.reconnection_attempts {
            warn!(attempts = failures, "Giving up on the relay");
            let _ = events_tx.send(TransportEvent::Failed { attempts: failures });
            return;
        }
        failures += 1;
        tokio::time::sleep(config.reconnection_delay).await;
    }
}

/// Try each transport in order, each under the connect timeout
async fn establish(config: &TransportConfig) -> Result<Link, TransportError> {
    let mut last_error = TransportError::NoTransports;

    for &kind in &config.transports {
        let attempt = async {
            match kind {
                TransportKind::WebSocket => {
                    WsLink::connect(&config.base_url).await.map(Link::WebSocket)
                }
                TransportKind::Polling => PollLink::connect(&config.base_url, config.timeout)
                    .await
                    .map(Link::Polling),
            }
        };

        match tokio::time::timeout(config.timeout, attempt).await {
            Ok(Ok(link)) => return Ok(link),
            Ok(Err(e)) => {
                debug!(transport = ?kind, error = %e, "Transport unavailable, trying next");
                last_error = e;
            }
            Err(_) => {
                debug!(transport = ?kind, "Transport timed out, trying next");
                last_error = TransportError::Timeout(config.timeout);
            }
        }
    }

    Err(last_error)
}

/// Decode one inbound envelope. Handshake frames and garbage are dropped.
fn decode(value: serde_json::Value) -> Option<ServerEvent> {
    match serde_json::from_value::<ServerEvent>(value) {
        Ok(ServerEvent::Welcome { .. }) => None,
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Failed to parse server message");
            None
        }
    }
}

/// `http(s)://host` to `ws(s)://host/ws`
pub fn websocket_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base.to_string()
    };
    format!("{ws}/ws")
}
