//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::GameRules;
use crate::http::polling::PollSessions;
use crate::relay::{Relay, RelayHandle, TrustClient};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub relay: RelayHandle,
    pub polls: Arc<PollSessions>,
}

impl AppState {
    pub fn new(config: Config, relay: RelayHandle) -> Self {
        Self {
            config: Arc::new(config),
            relay,
            polls: Arc::new(PollSessions::new()),
        }
    }

    /// Spawn the relay and the polling reaper, returning state wired to them.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn start(config: Config) -> Self {
        let (relay, handle) = Relay::new(GameRules::default(), TrustClient, rand::random());
        tokio::spawn(relay.run());

        let state = Self::new(config, handle);

        let polls = state.polls.clone();
        let reaper_relay = state.relay.clone();
        tokio::spawn(async move {
            polls.run_reaper(reaper_relay).await;
        });

        state
    }
}
