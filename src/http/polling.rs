//! HTTP long-polling transport
//!
//! `POST /poll` opens a session and answers with the `welcome` envelope.
//! `GET /poll/:id` blocks until at least one event is queued (or the wait
//! runs out) and returns a JSON array. `POST /poll/:id` takes a JSON array of
//! client envelopes. `DELETE /poll/:id` closes the session.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::relay::RelayHandle;
use crate::util::time::{POLL_IDLE_TIMEOUT, POLL_WAIT};
use crate::ws::protocol::{ClientEvent, ConnectionId, ServerEvent};

/// One polling client
struct PollSession {
    /// Held by the in-flight GET, so concurrent GETs queue up
    outbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerEvent>>,
    last_seen: Mutex<Instant>,
}

impl PollSession {
    fn touch(&self) {
        *self.last_seen.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_seen.lock().elapsed()
    }
}

/// Open polling sessions keyed by connection identity
#[derive(Default)]
pub struct PollSessions {
    sessions: DashMap<ConnectionId, Arc<PollSession>>,
}

impl PollSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn get(&self, id: &ConnectionId) -> Option<Arc<PollSession>> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    /// Drop a session and tell the relay. Returns whether it existed.
    fn close(&self, id: &ConnectionId, relay: &RelayHandle) -> bool {
        if self.sessions.remove(id).is_some() {
            relay.disconnect(*id);
            true
        } else {
            false
        }
    }

    /// Disconnect sessions that stopped polling
    pub fn reap_idle(&self, relay: &RelayHandle, idle: Duration) -> usize {
        let stale: Vec<ConnectionId> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() >= idle)
            .map(|entry| *entry.key())
            .collect();

        for id in &stale {
            info!(conn_id = %id, "Reaping idle polling session");
            self.close(id, relay);
        }
        stale.len()
    }

    /// Periodic idle sweep
    pub async fn run_reaper(&self, relay: RelayHandle) {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            interval.tick().await;
            self.reap_idle(&relay, POLL_IDLE_TIMEOUT);
        }
    }
}

/// `POST /poll`
pub async fn open_handler(State(state): State<AppState>) -> Response {
    let (conn_id, mut outbound_rx) = state.relay.connect();

    // The relay's first event on a new queue is the welcome
    let welcome = match tokio::time::timeout(POLL_WAIT, outbound_rx.recv()).await {
        Ok(Some(event @ ServerEvent::Welcome { .. })) => event,
        _ => {
            warn!(conn_id = %conn_id, "Relay did not welcome polling session");
            state.relay.disconnect(conn_id);
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    state.polls.sessions.insert(
        conn_id,
        Arc::new(PollSession {
            outbound: tokio::sync::Mutex::new(outbound_rx),
            last_seen: Mutex::new(Instant::now()),
        }),
    );

    info!(conn_id = %conn_id, "New polling connection");
    Json(welcome).into_response()
}

/// `GET /poll/:id`
pub async fn poll_handler(
    State(state): State<AppState>,
    Path(conn_id): Path<ConnectionId>,
) -> Response {
    let Some(session) = state.polls.get(&conn_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    session.touch();

    let mut outbound = session.outbound.lock().await;
    let mut batch = Vec::new();

    match tokio::time::timeout(POLL_WAIT, outbound.recv()).await {
        Ok(Some(event)) => batch.push(event),
        Ok(None) => return StatusCode::GONE.into_response(),
        Err(_) => {}
    }
    while let Ok(event) = outbound.try_recv() {
        batch.push(event);
    }
    drop(outbound);

    session.touch();
    Json(batch).into_response()
}

/// `POST /poll/:id`
pub async fn push_handler(
    State(state): State<AppState>,
    Path(conn_id): Path<ConnectionId>,
    body: String,
) -> StatusCode {
    if state.polls.get(&conn_id).is_none() {
        return StatusCode::NOT_FOUND;
    }

    let envelopes: Vec<serde_json::Value> = match serde_json::from_str(&body) {
        Ok(envelopes) => envelopes,
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "Failed to parse polling batch");
            return StatusCode::BAD_REQUEST;
        }
    };

    for envelope in envelopes {
        match serde_json::from_value::<ClientEvent>(envelope) {
            Ok(event) => state.relay.send(conn_id, event),
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
            }
        }
    }

    StatusCode::NO_CONTENT
}

/// `DELETE /poll/:id`
pub async fn close_handler(
    State(state): State<AppState>,
    Path(conn_id): Path<ConnectionId>,
) -> StatusCode {
    if state.polls.close(&conn_id, &state.relay) {
        debug!(conn_id = %conn_id, "Polling connection closed by client");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameRules;
    use crate::relay::{Relay, TrustClient};

    #[tokio::test]
    async fn idle_sessions_are_reaped_and_announced() {
        let (relay, handle) = Relay::new(GameRules::default(), TrustClient, 9);
        tokio::spawn(relay.run());

        let (watcher, mut watcher_rx) = handle.connect();
        assert_eq!(watcher_rx.recv().await, Some(ServerEvent::Welcome { id: watcher }));

        let polls = PollSessions::new();
        let (idle, outbound) = handle.connect();
        polls.sessions.insert(
            idle,
            Arc::new(PollSession {
                outbound: tokio::sync::Mutex::new(outbound),
                last_seen: Mutex::new(Instant::now()),
            }),
        );

        assert_eq!(polls.reap_idle(&handle, Duration::from_secs(60)), 0);
        assert_eq!(polls.len(), 1);

        assert_eq!(polls.reap_idle(&handle, Duration::ZERO), 1);
        assert!(polls.is_empty());
        assert_eq!(watcher_rx.recv().await, Some(ServerEvent::PlayerLeft(idle)));
    }
}
