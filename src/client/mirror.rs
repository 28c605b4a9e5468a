//! Remote mirror - last known state of every other player

use std::collections::HashMap;

use crate::ws::protocol::{ConnectionId, Player, ServerEvent};

/// Client-side cache of peers, fed only by relay broadcasts.
///
/// There are no sequence numbers on the wire, so this is last-write-wins per
/// field in arrival order.
#[derive(Debug, Default)]
pub struct RemoteMirror {
    players: HashMap<ConnectionId, Player>,
}

impl RemoteMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one server event into the mirror. `self_id` filters our own
    /// entry out of snapshots.
    pub fn apply(&mut self, event: &ServerEvent, self_id: Option<ConnectionId>) {
        match event {
            ServerEvent::GameState(state) => {
                self.players = state
                    .players
                    .iter()
                    .filter(|p| Some(p.id) != self_id)
                    .map(|p| (p.id, p.clone()))
                    .collect();
            }
            ServerEvent::PlayerJoined(player) => {
                self.players.insert(player.id, player.clone());
            }
            ServerEvent::PlayerMoved(moved) => {
                // No implicit creation: a move for an unknown id is dropped
                if let Some(player) = self.players.get_mut(&moved.id) {
                    player.merge(&moved.fields);
                }
            }
            ServerEvent::PlayerLeft(id) => {
                self.players.remove(id);
            }
            ServerEvent::Welcome { .. } => {}
        }
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<Player> {
        self.players.remove(id)
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.players.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn clear(&mut self) {
        self.players.clear();
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
