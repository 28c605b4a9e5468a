//! Local avatar: steering toward the pointer and map clamping

use crate::game::GameRules;
use crate::ws::protocol::{Color, MoveFields};

/// The locally controlled avatar
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPlayer {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub color: Color,
    pub nickname: String,
    pub score: u64,
}

impl LocalPlayer {
    /// Fresh avatar at the map centre
    pub fn spawn(rules: &GameRules, nickname: String, color: Color) -> Self {
        let (x, y) = rules.center();
        Self {
            x,
            y,
            radius: rules.initial_radius,
            color,
            nickname,
            score: 0,
        }
    }

    /// The state pushed to the relay every frame
    pub fn report(&self) -> MoveFields {
        MoveFields::full(self.x, self.y, self.radius, self.score)
    }

    /// One frame of ease-toward-target steering, then clamp to the map.
    ///
    /// Returns the applied displacement.
    pub fn steer(&mut self, target: Target, rules: &GameRules) -> (f64, f64) {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        let distance = (dx * dx + dy * dy).sqrt();
        let speed = (distance / rules.speed_divisor).min(rules.max_speed);

        let step_x = finite_or_zero(dx / distance * speed);
        let step_y = finite_or_zero(dy / distance * speed);

        let (old_x, old_y) = (self.x, self.y);
        self.x += step_x;
        self.y += step_y;
        self.clamp(rules);
        (self.x - old_x, self.y - old_y)
    }

    /// Keep the whole circle on the map. A circle wider than the map is
    /// pinned at `radius` rather than rejected.
    pub fn clamp(&mut self, rules: &GameRules) {
        self.x = self.x.min(rules.map_width - self.radius).max(self.radius);
        self.y = self.y.min(rules.map_height - self.radius).max(self.radius);
    }
}

// 0/0 at zero distance
fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Where the avatar is heading, in map coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub x: f64,
    pub y: f64,
}

impl Target {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Map a pointer position on a viewport centred on the avatar
    pub fn from_pointer(
        player: &LocalPlayer,
        pointer: (f64, f64),
        viewport: (f64, f64),
    ) -> Self {
        Self {
            x: player.x - viewport.0 / 2.0 + pointer.0,
            y: player.y - viewport.1 / 2.0 + pointer.1,
        }
    }
}
