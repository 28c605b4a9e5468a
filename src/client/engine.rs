//! Client-side collision and scoring
//!
//! Every outcome here is decided locally from the mirror. Nothing is reported
//! back to the relay, so two clients can disagree about who ate whom.

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::game::GameRules;
use crate::ws::protocol::{Color, ConnectionId};

use super::mirror::RemoteMirror;
use super::simulation::LocalPlayer;

/// Food blob, never transmitted
#[derive(Debug, Clone, PartialEq)]
pub struct Bot {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub color: Color,
}

impl Bot {
    pub fn random(rng: &mut ChaCha8Rng, rules: &GameRules) -> Self {
        Self {
            x: rng.gen_range(0.0..rules.map_width),
            y: rng.gen_range(0.0..rules.map_height),
            radius: rng.gen_range(rules.bot_min_radius..rules.bot_max_radius),
            color: Color::random(rng),
        }
    }
}

/// What the remote-player pass decided
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerPass {
    /// Remote entries we ate (already removed from the mirror)
    pub eaten: Vec<ConnectionId>,
    /// Set when a bigger remote player covered us
    pub eaten_by: Option<ConnectionId>,
}

fn distance(ax: f64, ay: f64, bx: f64, by: f64) -> f64 {
    let dx = ax - bx;
    let dy = ay - by;
    (dx * dx + dy * dy).sqrt()
}

/// Eat every overlapping bot. Growth applies immediately, so a later bot in
/// the same pass is tested against the grown radius.
pub fn eat_bots(player: &mut LocalPlayer, bots: &mut Vec<Bot>, rules: &GameRules) -> usize {
    let before = bots.len();
    let mut i = bots.len();
    while i > 0 {
        i -= 1;
        let bot = &bots[i];
        if distance(player.x, player.y, bot.x, bot.y) < player.radius + bot.radius {
            bots.swap_remove(i);
            player.radius += rules.bot_growth;
            player.score = player.score.saturating_add(rules.bot_score);
        }
    }
    before - bots.len()
}

/// Compare against every mirrored peer. Equal radii never resolve.
///
/// Stops at the first peer that eats us.
pub fn resolve_players(player: &mut LocalPlayer, mirror: &mut RemoteMirror) -> PlayerPass {
    let mut pass = PlayerPass::default();

    for id in mirror.ids() {
        let Some(other) = mirror.get(&id) else {
            continue;
        };
        let d = distance(player.x, player.y, other.x, other.y);

        if player.radius > other.radius && d < player.radius {
            player.radius += other.radius / 2.0;
            // Peer radii are unvalidated; the cast saturates and so must the sum
            player.score = player.score.saturating_add((other.radius * 2.0).floor() as u64);
            mirror.remove(&id);
            pass.eaten.push(id);
        } else if other.radius > player.radius && d < other.radius {
            pass.eaten_by = Some(id);
            break;
        }
    }

    pass
}

/// Client-local bot population
#[derive(Debug)]
pub struct BotField {
    bots: Vec<Bot>,
}

impl BotField {
    pub fn new() -> Self {
        Self { bots: Vec::new() }
    }

    /// Drop everything and spawn a full population
    pub fn reset(&mut self, rng: &mut ChaCha8Rng, rules: &GameRules) {
        self.bots.clear();
        for _ in 0..rules.bot_population {
            self.bots.push(Bot::random(rng, rules));
        }
    }

    /// Spawn at most one bot if below target. Returns whether one was added.
    pub fn replenish(&mut self, rng: &mut ChaCha8Rng, rules: &GameRules) -> bool {
        if self.bots.len() < rules.bot_population {
            self.bots.push(Bot::random(rng, rules));
            true
        } else {
            false
        }
    }

    pub fn bots(&self) -> &[Bot] {
        &self.bots
    }

    pub fn bots_mut(&mut self) -> &mut Vec<Bot> {
        &mut self.bots
    }

    pub fn len(&self) -> usize {
        self.bots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bots.is_empty()
    }
}

impl Default for BotField {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::{Player, ServerEvent};
    use rand::SeedableRng;
    use uuid::Uuid;

    fn me(x: f64, y: f64, radius: f64) -> LocalPlayer {
        LocalPlayer {
            x,
            y,
            radius,
            color: Color::Green,
            nickname: "me".into(),
            score: 0,
        }
    }

    fn bot(x: f64, y: f64, radius: f64) -> Bot {
        Bot {
            x,
            y,
            radius,
            color: Color::Red,
        }
    }

    fn mirror_with(peers: &[(ConnectionId, f64, f64, f64)]) -> RemoteMirror {
        let mut mirror = RemoteMirror::new();
        for &(id, x, y, radius) in peers {
            mirror.apply(
                &ServerEvent::PlayerJoined(Player {
                    id,
                    x,
                    y,
                    radius,
                    color: None,
                    nickname: "peer".into(),
                    score: 0,
                }),
                None,
            );
        }
        mirror
    }

    #[test]
    fn overlapping_bot_is_eaten_once() {
        let rules = GameRules::default();
        let mut player = me(100.0, 100.0, 20.0);
        let mut bots = vec![bot(125.0, 100.0, 10.0), bot(500.0, 500.0, 10.0)];

        assert_eq!(eat_bots(&mut player, &mut bots, &rules), 1);
        assert_eq!(player.radius, 22.0);
        assert_eq!(player.score, 10);
        assert_eq!(bots, vec![bot(500.0, 500.0, 10.0)]);

        assert_eq!(eat_bots(&mut player, &mut bots, &rules), 0);
        assert_eq!(player.score, 10);
    }

    #[test]
    fn touching_exactly_is_not_a_collision() {
        let rules = GameRules::default();
        let mut player = me(100.0, 100.0, 20.0);
        let mut bots = vec![bot(130.0, 100.0, 10.0)];
        assert_eq!(eat_bots(&mut player, &mut bots, &rules), 0);
    }

    #[test]
    fn growth_within_a_pass_reaches_further_bots() {
        let rules = GameRules::default();
        let mut player = me(100.0, 100.0, 20.0);
        // Second bot is only reachable after eating the first (checked last-to-first)
        let mut bots = vec![bot(131.0, 100.0, 10.0), bot(100.0, 100.0, 10.0)];
        assert_eq!(eat_bots(&mut player, &mut bots, &rules), 2);
        assert_eq!(player.radius, 24.0);
        assert_eq!(player.score, 20);
    }

    #[test]
    fn smaller_player_is_eliminated() {
        let big = Uuid::new_v4();
        let mut mirror = mirror_with(&[(big, 110.0, 100.0, 25.0)]);
        let mut player = me(100.0, 100.0, 15.0);

        let pass = resolve_players(&mut player, &mut mirror);
        assert_eq!(pass.eaten_by, Some(big));
        assert!(pass.eaten.is_empty());
        assert_eq!(player.radius, 15.0);
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn bigger_player_eats_and_mirror_drops_entry() {
        let small = Uuid::new_v4();
        let mut mirror = mirror_with(&[(small, 110.0, 100.0, 25.0)]);
        let mut player = me(100.0, 100.0, 26.0);

        let pass = resolve_players(&mut player, &mut mirror);
        assert_eq!(pass.eaten, vec![small]);
        assert_eq!(pass.eaten_by, None);
        assert_eq!(player.radius, 26.0 + 12.5);
        assert_eq!(player.score, 50);
        assert!(mirror.is_empty());
    }

    #[test]
    fn eating_needs_centre_inside_own_radius() {
        let small = Uuid::new_v4();
        let mut mirror = mirror_with(&[(small, 130.0, 100.0, 10.0)]);
        let mut player = me(100.0, 100.0, 26.0);

        assert_eq!(resolve_players(&mut player, &mut mirror), PlayerPass::default());
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn equal_radii_never_resolve() {
        let twin = Uuid::new_v4();
        let mut mirror = mirror_with(&[(twin, 100.0, 100.0, 20.0)]);
        let mut player = me(100.0, 100.0, 20.0);

        assert_eq!(resolve_players(&mut player, &mut mirror), PlayerPass::default());
        assert_eq!(player.radius, 20.0);
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn score_uses_floor_of_double_radius() {
        let small = Uuid::new_v4();
        let mut mirror = mirror_with(&[(small, 100.0, 100.0, 12.7)]);
        let mut player = me(100.0, 100.0, 30.0);
        resolve_players(&mut player, &mut mirror);
        assert_eq!(player.score, 25);
    }

    #[test]
    fn huge_peer_radius_saturates_score() {
        let giant = Uuid::new_v4();
        let mut mirror = mirror_with(&[(giant, 0.0, 0.0, 1e19)]);
        let mut player = me(0.0, 0.0, 1e20);
        player.score = 10;

        let pass = resolve_players(&mut player, &mut mirror);
        assert_eq!(pass.eaten, vec![giant]);
        assert_eq!(player.score, u64::MAX);
    }

    #[test]
    fn bot_score_saturates() {
        let rules = GameRules::default();
        let mut player = me(0.0, 0.0, 20.0);
        player.score = u64::MAX - 1;
        let mut bots = vec![bot(0.0, 0.0, 10.0)];

        assert_eq!(eat_bots(&mut player, &mut bots, &rules), 1);
        assert_eq!(player.score, u64::MAX);
    }

    #[test]
    fn replenish_adds_one_bot_per_call() {
        let rules = GameRules::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut field = BotField::new();
        field.reset(&mut rng, &rules);
        assert_eq!(field.len(), 30);
        assert!(!field.replenish(&mut rng, &rules));

        field.bots_mut().truncate(25);
        for expected in 26..=30 {
            assert!(field.replenish(&mut rng, &rules));
            assert_eq!(field.len(), expected);
        }
        assert!(!field.replenish(&mut rng, &rules));
    }

    #[test]
    fn random_bots_respect_rules() {
        let rules = GameRules::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..200 {
            let bot = Bot::random(&mut rng, &rules);
            assert!((0.0..3000.0).contains(&bot.x));
            assert!((0.0..3000.0).contains(&bot.y));
            assert!((10.0..20.0).contains(&bot.radius));
            assert_ne!(bot.color, Color::Other);
        }
    }
}
