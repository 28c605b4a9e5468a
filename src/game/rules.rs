//! Compiled-in game constants
//!
//! Nothing here goes over the wire. Client and server must be built with the
//! same values; a mismatch only shows up as odd behaviour, never as an error.

/// Map size and eat/grow tuning
#[derive(Debug, Clone, PartialEq)]
pub struct GameRules {
    pub map_width: f64,
    pub map_height: f64,
    /// Radius of a freshly spawned player
    pub initial_radius: f64,
    /// Cap on per-frame displacement
    pub max_speed: f64,
    /// Speed is `distance / speed_divisor` below the cap
    pub speed_divisor: f64,
    /// Bot population the client keeps topping up to
    pub bot_population: usize,
    pub bot_min_radius: f64,
    pub bot_max_radius: f64,
    /// Radius gained per bot eaten
    pub bot_growth: f64,
    /// Score gained per bot eaten
    pub bot_score: u64,
    /// Score at which the local session is won
    pub win_score: u64,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            map_width: 3000.0,
            map_height: 3000.0,
            initial_radius: 20.0,
            max_speed: 5.0,
            speed_divisor: 10.0,
            bot_population: 30,
            bot_min_radius: 10.0,
            bot_max_radius: 20.0,
            bot_growth: 2.0,
            bot_score: 10,
            win_score: 100,
        }
    }
}

impl GameRules {
    /// Map centre, where the client places its own avatar
    pub fn center(&self) -> (f64, f64) {
        (self.map_width / 2.0, self.map_height / 2.0)
    }
}
