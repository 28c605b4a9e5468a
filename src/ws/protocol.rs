//! Wire protocol shared by the relay and the client
//!
//! Every frame is a named event envelope: `{"event": "playerMove", "data": {...}}`.
//! Payloads are schema-less in spirit: unknown fields are ignored and most
//! fields are optional so a sloppy client never gets its frame rejected for
//! leaving something out.

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque per-connection identity, assigned on connect and stable until disconnect
pub type ConnectionId = Uuid;

/// Avatar and bot colours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Red,
    Yellow,
    Purple,
    Orange,
    Pink,
    Cyan,
    Lime,
    Magenta,
    /// Anything outside the palette. The relay never rejects a colour.
    #[serde(other)]
    Other,
}

impl Color {
    pub const PALETTE: [Color; 9] = [
        Color::Green,
        Color::Red,
        Color::Yellow,
        Color::Purple,
        Color::Orange,
        Color::Pink,
        Color::Cyan,
        Color::Lime,
        Color::Magenta,
    ];

    /// Pick a palette colour uniformly
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::PALETTE[rng.gen_range(0..Self::PALETTE.len())]
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Join the arena
    StartGame(StartGame),
    /// Per-frame state push
    PlayerMove(MoveFields),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartGame {
    #[serde(default)]
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

/// Reported player state. Absent fields mean "unchanged".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u64>,
}

impl MoveFields {
    /// A move carrying every field
    pub fn full(x: f64, y: f64, radius: f64, score: u64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            radius: Some(radius),
            score: Some(score),
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Handshake frame carrying the connection identity
    Welcome { id: ConnectionId },

    /// Snapshot sent to a joining connection
    GameState(GameState),

    /// A peer joined
    PlayerJoined(Player),

    /// A peer reported new state
    PlayerMoved(PlayerMoved),

    /// A peer's connection went away
    PlayerLeft(ConnectionId),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Welcome { .. } => "welcome",
            ServerEvent::GameState(_) => "gameState",
            ServerEvent::PlayerJoined(_) => "playerJoined",
            ServerEvent::PlayerMoved(_) => "playerMoved",
            ServerEvent::PlayerLeft(_) => "playerLeft",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    #[serde(default)]
    pub players: Vec<Player>,
    pub map_width: f64,
    pub map_height: f64,
}

/// A player as stored by the relay and mirrored by clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: ConnectionId,
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub score: u64,
}

impl Player {
    /// Overwrite whichever fields the move carries
    pub fn merge(&mut self, fields: &MoveFields) {
        if let Some(x) = fields.x {
            self.x = x;
        }
        if let Some(y) = fields.y {
            self.y = y;
        }
        if let Some(radius) = fields.radius {
            self.radius = radius;
        }
        if let Some(score) = fields.score {
            self.score = score;
        }
    }

    pub fn moved(&self) -> PlayerMoved {
        PlayerMoved {
            id: self.id,
            fields: MoveFields::full(self.x, self.y, self.radius, self.score),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerMoved {
    pub id: ConnectionId,
    #[serde(flatten)]
    pub fields: MoveFields,
}
