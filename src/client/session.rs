//! Client game session: ties the local avatar, bots and mirror into a frame loop

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::game::GameRules;
use crate::ws::protocol::{ClientEvent, Color, ConnectionId, ServerEvent, StartGame};

use super::engine::{eat_bots, resolve_players, BotField};
use super::mirror::RemoteMirror;
use super::simulation::{LocalPlayer, Target};

/// Session errors surfaced to the UI layer
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Nickname must not be empty")]
    EmptyNickname,
}

/// Where the local session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Start screen, nothing simulated
    Menu,
    Playing,
    /// A bigger peer covered us
    Eaten { by: ConnectionId },
    /// Reached the win score
    Won,
}

/// Result of a frame's collision pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Eaten { by: ConnectionId },
    Won,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub bots_eaten: usize,
    pub players_eaten: Vec<ConnectionId>,
    pub bot_spawned: bool,
    pub outcome: Outcome,
}

/// Everything one frame produces
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// State push for the relay, taken after steering and before collisions
    pub outbound: ClientEvent,
    pub report: FrameReport,
}

/// One client's view of the game
pub struct GameSession {
    rules: GameRules,
    phase: Phase,
    player: Option<LocalPlayer>,
    target: Target,
    bots: BotField,
    mirror: RemoteMirror,
    self_id: Option<ConnectionId>,
    won: bool,
    rng: ChaCha8Rng,
}

impl GameSession {
    pub fn new(rules: GameRules, seed: u64) -> Self {
        let (cx, cy) = rules.center();
        Self {
            rules,
            phase: Phase::Menu,
            player: None,
            target: Target::new(cx, cy),
            bots: BotField::new(),
            mirror: RemoteMirror::new(),
            self_id: None,
            won: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Begin (or restart) a round. Returns the join request to send.
    pub fn start(&mut self, nickname: &str) -> Result<ClientEvent, SessionError> {
        if nickname.trim().is_empty() {
            return Err(SessionError::EmptyNickname);
        }

        let color = Color::random(&mut self.rng);
        let player = LocalPlayer::spawn(&self.rules, nickname.to_string(), color);

        self.target = Target::new(player.x, player.y);
        self.bots.reset(&mut self.rng, &self.rules);
        self.mirror.clear();
        self.won = false;
        self.phase = Phase::Playing;
        self.player = Some(player);

        info!(nickname, ?color, "Round started");

        Ok(ClientEvent::StartGame(StartGame {
            nickname: nickname.to_string(),
            color: Some(color),
        }))
    }

    /// Record the identity the transport handed us
    pub fn set_self_id(&mut self, id: ConnectionId) {
        self.self_id = Some(id);
    }

    pub fn set_target(&mut self, target: Target) {
        self.target = target;
    }

    /// Aim at a pointer position on a viewport centred on the avatar
    pub fn point_at(&mut self, pointer: (f64, f64), viewport: (f64, f64)) {
        if let Some(player) = &self.player {
            self.target = Target::from_pointer(player, pointer, viewport);
        }
    }

    /// Feed a relay broadcast into the mirror
    pub fn apply(&mut self, event: &ServerEvent) {
        if let ServerEvent::Welcome { id } = event {
            self.set_self_id(*id);
            return;
        }
        debug!(event = event.name(), "Applying server event");
        self.mirror.apply(event, self.self_id);
    }

    /// Run one frame. `None` unless a round is in progress.
    pub fn frame(&mut self) -> Option<Frame> {
        if self.phase != Phase::Playing {
            return None;
        }
        let player = self.player.as_mut()?;

        player.steer(self.target, &self.rules);
        let outbound = ClientEvent::PlayerMove(player.report());

        let bots_eaten = eat_bots(player, self.bots.bots_mut(), &self.rules);
        let pass = resolve_players(player, &mut self.mirror);

        let outcome = if let Some(by) = pass.eaten_by {
            self.phase = Phase::Eaten { by };
            info!(by = %by, score = player.score, "Eaten");
            Outcome::Eaten { by }
        } else if player.score >= self.rules.win_score && !self.won {
            self.won = true;
            self.phase = Phase::Won;
            info!(score = player.score, "Won");
            Outcome::Won
        } else {
            Outcome::Continue
        };

        let bot_spawned = match outcome {
            Outcome::Eaten { .. } => false,
            _ => self.bots.replenish(&mut self.rng, &self.rules),
        };

        Some(Frame {
            outbound,
            report: FrameReport {
                bots_eaten,
                players_eaten: pass.eaten,
                bot_spawned,
                outcome,
            },
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn player(&self) -> Option<&LocalPlayer> {
        self.player.as_ref()
    }

    pub fn player_mut(&mut self) -> Option<&mut LocalPlayer> {
        self.player.as_mut()
    }

    pub fn bots(&self) -> &BotField {
        &self.bots
    }

    pub fn bots_mut(&mut self) -> &mut BotField {
        &mut self.bots
    }

    pub fn mirror(&self) -> &RemoteMirror {
        &self.mirror
    }

    pub fn self_id(&self) -> Option<ConnectionId> {
        self.self_id
    }
}
