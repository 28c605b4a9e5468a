//! Session registry - connection identity to reported player state

use std::collections::HashMap;

use crate::ws::protocol::{ConnectionId, MoveFields, Player, PlayerMoved};

/// Players keyed by the connection that created them.
///
/// Owned by the relay task; never shared.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    players: HashMap<ConnectionId, Player>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the connection's player
    pub fn register(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Overwrite reported fields. Returns the resulting broadcast, or `None`
    /// if the connection never joined.
    pub fn apply_move(&mut self, id: &ConnectionId, fields: &MoveFields) -> Option<PlayerMoved> {
        let player = self.players.get_mut(id)?;
        player.merge(fields);
        Some(player.moved())
    }

    pub fn remove(&mut self, id: &ConnectionId) -> Option<Player> {
        self.players.remove(id)
    }

    /// Every registered player except `exclude`
    pub fn snapshot_excluding(&self, exclude: &ConnectionId) -> Vec<Player> {
        self.players
            .values()
            .filter(|p| p.id != *exclude)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn player(id: ConnectionId) -> Player {
        Player {
            id,
            x: 100.0,
            y: 200.0,
            radius: 20.0,
            color: None,
            nickname: "p".into(),
            score: 0,
        }
    }

    #[test]
    fn move_for_unknown_connection_is_ignored() {
        let mut registry = SessionRegistry::new();
        let moved = registry.apply_move(&Uuid::new_v4(), &MoveFields::full(1.0, 1.0, 1.0, 1));
        assert!(moved.is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn move_overwrites_without_checks() {
        let mut registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry.register(player(id));

        // Shrinking, teleporting off-map and a score drop are all accepted
        let moved = registry
            .apply_move(&id, &MoveFields::full(-50.0, 9000.0, 3.0, 7))
            .unwrap();
        assert_eq!(moved.fields, MoveFields::full(-50.0, 9000.0, 3.0, 7));

        let stored = registry.get(&id).unwrap();
        assert_eq!((stored.x, stored.y, stored.radius, stored.score), (-50.0, 9000.0, 3.0, 7));
    }

    #[test]
    fn partial_move_reports_full_state() {
        let mut registry = SessionRegistry::new();
        let id = Uuid::new_v4();
        registry.register(player(id));

        let moved = registry
            .apply_move(&id, &MoveFields { x: Some(5.0), ..MoveFields::default() })
            .unwrap();
        assert_eq!(moved.fields, MoveFields::full(5.0, 200.0, 20.0, 0));
    }

    #[test]
    fn snapshot_excludes_the_requester() {
        let mut registry = SessionRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.register(player(a));
        registry.register(player(b));

        let snapshot = registry.snapshot_excluding(&a);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, b);

        registry.remove(&b);
        assert!(registry.snapshot_excluding(&a).is_empty());
        assert_eq!(registry.len(), 1);
    }
}
