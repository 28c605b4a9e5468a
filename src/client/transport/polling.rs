//! HTTP long-polling link, the fallback when WebSockets are unavailable

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use crate::util::time::POLL_WAIT;
use crate::ws::protocol::{ClientEvent, ConnectionId, ServerEvent};

use super::{decode, LinkOutcome, TransportError, TransportEvent};

/// Slack on top of the server's long-poll wait before a GET counts as dead
const POLL_GRACE: Duration = Duration::from_secs(10);

pub(super) struct PollLink {
    id: ConnectionId,
    client: reqwest::Client,
    /// `{base}/poll/{id}`
    url: String,
}

impl PollLink {
    /// Open a polling session; the response body is the `welcome` envelope
    pub(super) async fn connect(base_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().connect_timeout(timeout).build()?;
        let base = base_url.trim_end_matches('/');

        let welcome: ServerEvent = client
            .post(format!("{base}/poll"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let id = match welcome {
            ServerEvent::Welcome { id } => id,
            other => {
                return Err(TransportError::Handshake(format!(
                    "expected welcome, got {}",
                    other.name()
                )))
            }
        };

        Ok(Self {
            id,
            client,
            url: format!("{base}/poll/{id}"),
        })
    }

    pub(super) fn id(&self) -> ConnectionId {
        self.id
    }

    pub(super) async fn run(
        self,
        outbound_rx: &mut mpsc::UnboundedReceiver<ClientEvent>,
        events_tx: &mpsc::UnboundedSender<TransportEvent>,
    ) -> LinkOutcome {
        // Receiving runs on its own task so a send never cancels an in-flight GET
        let mut poller = tokio::spawn(receive_loop(
            self.client.clone(),
            self.url.clone(),
            events_tx.clone(),
        ));

        let outcome = loop {
            tokio::select! {
                outbound = outbound_rx.recv() => match outbound {
                    Some(first) => {
                        let mut batch = vec![first];
                        while let Ok(more) = outbound_rx.try_recv() {
                            batch.push(more);
                        }
                        if let Err(e) = self.push(&batch).await {
                            break LinkOutcome::Lost(e.to_string());
                        }
                    }
                    None => {
                        if let Err(e) = self.client.delete(&self.url).send().await {
                            debug!(error = %e, "Failed to close polling session");
                        }
                        break LinkOutcome::Closed;
                    }
                },
                finished = &mut poller => {
                    break match finished {
                        Ok(outcome) => outcome,
                        Err(e) => LinkOutcome::Lost(e.to_string()),
                    };
                }
            }
        };

        poller.abort();
        outcome
    }

    async fn push(&self, batch: &[ClientEvent]) -> Result<(), TransportError> {
        self.client
            .post(&self.url)
            .json(batch)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

async fn receive_loop(
    client: reqwest::Client,
    url: String,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
) -> LinkOutcome {
    loop {
        let response = match client.get(&url).timeout(POLL_WAIT + POLL_GRACE).send().await {
            Ok(response) => response,
            Err(e) => return LinkOutcome::Lost(e.to_string()),
        };

        if !response.status().is_success() {
            return LinkOutcome::Lost(format!("poll returned {}", response.status()));
        }

        let batch: Vec<serde_json::Value> = match response.json().await {
            Ok(batch) => batch,
            Err(e) => return LinkOutcome::Lost(e.to_string()),
        };

        for event in batch.into_iter().filter_map(decode) {
            if events_tx.send(TransportEvent::Message(event)).is_err() {
                return LinkOutcome::Closed;
            }
        }
    }
}
