//! Arena relay - a bare relay server for a multiplayer eat-to-grow game,
//! plus the client-side simulation that does all the actual game logic.
//!
//! The server trusts every client: it stores whatever position, radius and
//! score a client reports and fans it out. Collisions, growth, scoring and
//! win/loss are decided independently on each client.

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod relay;
pub mod util;
pub mod ws;
