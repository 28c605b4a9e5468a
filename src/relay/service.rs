//! Relay task - the single owner of the session registry

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::GameRules;
use crate::ws::protocol::{
    ClientEvent, ConnectionId, GameState, MoveFields, Player, ServerEvent, StartGame,
};

use super::authority::Authority;
use super::registry::SessionRegistry;

/// Commands fed to the relay task by transport handlers
#[derive(Debug)]
pub enum RelayCommand {
    /// A transport accepted a new connection
    Connect {
        id: ConnectionId,
        outbound: mpsc::UnboundedSender<ServerEvent>,
    },
    /// A decoded client frame
    Message { id: ConnectionId, event: ClientEvent },
    /// The transport lost the connection
    Disconnect { id: ConnectionId },
}

/// Counters readable from outside the relay task
#[derive(Debug, Default)]
pub struct RelayStats {
    connections: AtomicUsize,
    players: AtomicUsize,
}

impl RelayStats {
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }

    pub fn players(&self) -> usize {
        self.players.load(Ordering::Relaxed)
    }
}

/// Cheap, cloneable entry point into the relay
#[derive(Clone)]
pub struct RelayHandle {
    command_tx: mpsc::UnboundedSender<RelayCommand>,
    stats: Arc<RelayStats>,
}

impl RelayHandle {
    /// Allocate a connection identity and register its outbound queue.
    ///
    /// The first event on the returned receiver is always `welcome`.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerEvent>) {
        let id = Uuid::new_v4();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        self.submit(RelayCommand::Connect { id, outbound });
        (id, outbound_rx)
    }

    pub fn send(&self, id: ConnectionId, event: ClientEvent) {
        self.submit(RelayCommand::Message { id, event });
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.submit(RelayCommand::Disconnect { id });
    }

    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    fn submit(&self, command: RelayCommand) {
        if self.command_tx.send(command).is_err() {
            debug!("Relay task is gone, dropping command");
        }
    }
}

/// The relay: stores what clients report and fans it out to everyone else
pub struct Relay<A: Authority> {
    rules: GameRules,
    authority: A,
    registry: SessionRegistry,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
    command_rx: mpsc::UnboundedReceiver<RelayCommand>,
    stats: Arc<RelayStats>,
    rng: ChaCha8Rng,
}

impl<A: Authority> Relay<A> {
    /// Create a relay and the handle used to feed it
    pub fn new(rules: GameRules, authority: A, seed: u64) -> (Self, RelayHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let stats = Arc::new(RelayStats::default());

        let handle = RelayHandle {
            command_tx,
            stats: stats.clone(),
        };

        let relay = Self {
            rules,
            authority,
            registry: SessionRegistry::new(),
            connections: HashMap::new(),
            command_rx,
            stats,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };

        (relay, handle)
    }

    /// Process commands one at a time until every handle is dropped
    pub async fn run(mut self) {
        info!("Relay started");
        while let Some(command) = self.command_rx.recv().await {
            self.handle(command);
        }
        info!("Relay stopped");
    }

    /// Apply a single command to completion
    pub fn handle(&mut self, command: RelayCommand) {
        match command {
            RelayCommand::Connect { id, outbound } => self.handle_connect(id, outbound),
            RelayCommand::Message { id, event } => match event {
                ClientEvent::StartGame(start) => self.handle_start(id, start),
                ClientEvent::PlayerMove(fields) => self.handle_move(id, fields),
            },
            RelayCommand::Disconnect { id } => self.handle_disconnect(id),
        }
        self.publish_stats();
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    fn handle_connect(&mut self, id: ConnectionId, outbound: mpsc::UnboundedSender<ServerEvent>) {
        let _ = outbound.send(ServerEvent::Welcome { id });
        self.connections.insert(id, outbound);
        info!(conn_id = %id, connections = self.connections.len(), "Connection opened");
    }

    fn handle_start(&mut self, id: ConnectionId, start: StartGame) {
        if !self.connections.contains_key(&id) {
            debug!(conn_id = %id, "startGame from unknown connection");
            return;
        }

        let player = Player {
            id,
            x: self.rng.gen_range(0.0..self.rules.map_width),
            y: self.rng.gen_range(0.0..self.rules.map_height),
            radius: self.rules.initial_radius,
            color: start.color,
            nickname: start.nickname,
            score: 0,
        };

        self.registry.register(player.clone());

        self.send_to(
            &id,
            ServerEvent::GameState(GameState {
                players: self.registry.snapshot_excluding(&id),
                map_width: self.rules.map_width,
                map_height: self.rules.map_height,
            }),
        );

        info!(
            conn_id = %id,
            nickname = %player.nickname,
            players = self.registry.len(),
            "Player joined"
        );

        self.broadcast_except(&id, ServerEvent::PlayerJoined(player));
    }

    fn handle_move(&mut self, id: ConnectionId, fields: MoveFields) {
        let Some(current) = self.registry.get(&id) else {
            debug!(conn_id = %id, "playerMove before startGame, ignoring");
            return;
        };

        let Some(accepted) = self.authority.review_move(current, fields) else {
            debug!(conn_id = %id, "Move rejected by authority");
            return;
        };

        if let Some(moved) = self.registry.apply_move(&id, &accepted) {
            self.broadcast_except(&id, ServerEvent::PlayerMoved(moved));
        }
    }

    fn handle_disconnect(&mut self, id: ConnectionId) {
        if self.connections.remove(&id).is_none() {
            return;
        }
        let had_player = self.registry.remove(&id).is_some();

        info!(conn_id = %id, had_player, "Connection closed");

        self.broadcast_except(&id, ServerEvent::PlayerLeft(id));
    }

    fn send_to(&self, id: &ConnectionId, event: ServerEvent) {
        if let Some(outbound) = self.connections.get(id) {
            let _ = outbound.send(event);
        }
    }

    /// Best effort: a closed queue just means that transport is shutting down
    fn broadcast_except(&self, sender: &ConnectionId, event: ServerEvent) {
        for (id, outbound) in &self.connections {
            if id != sender {
                let _ = outbound.send(event.clone());
            }
        }
    }

    fn publish_stats(&self) {
        self.stats
            .connections
            .store(self.connections.len(), Ordering::Relaxed);
        self.stats
            .players
            .store(self.registry.len(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::authority::TrustClient;
    use crate::ws::protocol::Color;

    struct Peer {
        id: ConnectionId,
        rx: mpsc::UnboundedReceiver<ServerEvent>,
    }

    impl Peer {
        fn drain(&mut self) -> Vec<ServerEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.rx.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn connect<A: Authority>(relay: &mut Relay<A>) -> Peer {
        let id = Uuid::new_v4();
        let (outbound, rx) = mpsc::unbounded_channel();
        relay.handle(RelayCommand::Connect { id, outbound });
        let mut peer = Peer { id, rx };
        assert_eq!(peer.drain(), vec![ServerEvent::Welcome { id }]);
        peer
    }

    fn start<A: Authority>(relay: &mut Relay<A>, peer: &Peer, nickname: &str) {
        relay.handle(RelayCommand::Message {
            id: peer.id,
            event: ClientEvent::StartGame(StartGame {
                nickname: nickname.into(),
                color: Some(Color::Red),
            }),
        });
    }

    fn mv<A: Authority>(relay: &mut Relay<A>, peer: &Peer, fields: MoveFields) {
        relay.handle(RelayCommand::Message {
            id: peer.id,
            event: ClientEvent::PlayerMove(fields),
        });
    }

    fn relay() -> Relay<TrustClient> {
        Relay::new(GameRules::default(), TrustClient, 7).0
    }

    #[test]
    fn connect_does_not_join() {
        let mut relay = relay();
        let _a = connect(&mut relay);
        assert!(relay.registry().is_empty());
        assert_eq!(relay.stats.connections(), 1);
        assert_eq!(relay.stats.players(), 0);
    }

    #[test]
    fn join_spawns_on_map_and_snapshots_others() {
        let mut relay = relay();
        let mut a = connect(&mut relay);
        let mut b = connect(&mut relay);

        start(&mut relay, &a, "alpha");
        let events = a.drain();
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::GameState(state) => {
                assert!(state.players.is_empty());
                assert_eq!((state.map_width, state.map_height), (3000.0, 3000.0));
            }
            other => panic!("expected gameState, got {other:?}"),
        }

        let joined = match b.drain().as_slice() {
            [ServerEvent::PlayerJoined(p)] => p.clone(),
            other => panic!("expected playerJoined, got {other:?}"),
        };
        assert_eq!(joined.id, a.id);
        assert_eq!(joined.nickname, "alpha");
        assert_eq!(joined.radius, 20.0);
        assert_eq!(joined.score, 0);
        assert!((0.0..3000.0).contains(&joined.x));
        assert!((0.0..3000.0).contains(&joined.y));

        start(&mut relay, &b, "beta");
        match b.drain().as_slice() {
            [ServerEvent::GameState(state)] => {
                let ids: Vec<_> = state.players.iter().map(|p| p.id).collect();
                assert_eq!(ids, vec![a.id]);
            }
            other => panic!("expected gameState, got {other:?}"),
        }
        assert!(matches!(a.drain().as_slice(), [ServerEvent::PlayerJoined(p)] if p.id == b.id));
    }

    #[test]
    fn empty_nickname_is_accepted() {
        let mut relay = relay();
        let a = connect(&mut relay);
        start(&mut relay, &a, "");
        assert_eq!(relay.registry().get(&a.id).unwrap().nickname, "");
    }

    #[test]
    fn move_is_relayed_to_everyone_but_the_sender() {
        let mut relay = relay();
        let mut a = connect(&mut relay);
        let mut b = connect(&mut relay);
        let mut c = connect(&mut relay);
        start(&mut relay, &a, "a");
        a.drain();
        b.drain();
        c.drain();

        mv(&mut relay, &a, MoveFields::full(10.0, 20.0, 30.0, 40));

        assert!(a.drain().is_empty());
        for peer in [&mut b, &mut c] {
            match peer.drain().as_slice() {
                [ServerEvent::PlayerMoved(moved)] => {
                    assert_eq!(moved.id, a.id);
                    assert_eq!(moved.fields, MoveFields::full(10.0, 20.0, 30.0, 40));
                }
                other => panic!("expected playerMoved, got {other:?}"),
            }
        }
    }

    #[test]
    fn move_before_join_is_silently_ignored() {
        let mut relay = relay();
        let mut a = connect(&mut relay);
        let mut b = connect(&mut relay);

        mv(&mut relay, &a, MoveFields::full(1.0, 1.0, 1.0, 1));

        assert!(a.drain().is_empty());
        assert!(b.drain().is_empty());
        assert!(relay.registry().is_empty());
    }

    #[test]
    fn disconnect_notifies_every_remaining_connection_once() {
        let mut relay = relay();
        let a = connect(&mut relay);
        let mut b = connect(&mut relay);
        let mut c = connect(&mut relay);
        start(&mut relay, &a, "a");
        b.drain();
        c.drain();

        relay.handle(RelayCommand::Disconnect { id: a.id });
        relay.handle(RelayCommand::Disconnect { id: a.id });

        assert_eq!(b.drain(), vec![ServerEvent::PlayerLeft(a.id)]);
        assert_eq!(c.drain(), vec![ServerEvent::PlayerLeft(a.id)]);
        assert!(relay.registry().get(&a.id).is_none());

        start(&mut relay, &b, "b");
        match b.drain().as_slice() {
            [ServerEvent::GameState(state)] => assert!(state.players.is_empty()),
            other => panic!("expected gameState, got {other:?}"),
        }
    }

    #[test]
    fn disconnect_without_join_still_announces_leave() {
        let mut relay = relay();
        let a = connect(&mut relay);
        let mut b = connect(&mut relay);

        relay.handle(RelayCommand::Disconnect { id: a.id });
        assert_eq!(b.drain(), vec![ServerEvent::PlayerLeft(a.id)]);
    }

    struct FrozenScore;

    impl Authority for FrozenScore {
        fn review_move(&self, current: &Player, mut proposed: MoveFields) -> Option<MoveFields> {
            proposed.score = Some(current.score);
            Some(proposed)
        }
    }

    #[test]
    fn authority_seam_filters_moves() {
        let (mut relay, _handle) = Relay::new(GameRules::default(), FrozenScore, 1);
        let a = connect(&mut relay);
        let mut b = connect(&mut relay);
        start(&mut relay, &a, "a");
        b.drain();

        mv(&mut relay, &a, MoveFields::full(5.0, 5.0, 25.0, 999));
        match b.drain().as_slice() {
            [ServerEvent::PlayerMoved(moved)] => {
                assert_eq!(moved.fields.score, Some(0));
                assert_eq!(moved.fields.radius, Some(25.0));
            }
            other => panic!("expected playerMoved, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handle_drives_running_relay() {
        let (relay, handle) = Relay::new(GameRules::default(), TrustClient, 3);
        let task = tokio::spawn(relay.run());

        let (a, mut a_rx) = handle.connect();
        assert_eq!(a_rx.recv().await, Some(ServerEvent::Welcome { id: a }));

        let (b, mut b_rx) = handle.connect();
        assert_eq!(b_rx.recv().await, Some(ServerEvent::Welcome { id: b }));

        handle.send(a, ClientEvent::StartGame(StartGame::default()));
        assert!(matches!(a_rx.recv().await, Some(ServerEvent::GameState(_))));
        assert!(matches!(b_rx.recv().await, Some(ServerEvent::PlayerJoined(p)) if p.id == a));

        handle.disconnect(a);
        assert_eq!(b_rx.recv().await, Some(ServerEvent::PlayerLeft(a)));

        drop(handle);
        tokio_test::assert_ok!(task.await);
    }
}
