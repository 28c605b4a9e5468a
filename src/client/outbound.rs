//! Outbound move coalescing
//!
//! Moves are pure state pushes, so an unsent one is simply replaced by the
//! next. With the default quota at frame rate every frame's move goes out.

use std::sync::Arc;

use crate::util::rate_limit::{create_limiter, Limiter, MOVE_SEND_RATE};
use crate::ws::protocol::MoveFields;

/// Last-value-wins holder for `playerMove`, released by a governor quota
pub struct MoveThrottle {
    limiter: Arc<Limiter>,
    pending: Option<MoveFields>,
}

impl MoveThrottle {
    pub fn new(moves_per_second: u32) -> Self {
        Self {
            limiter: create_limiter(moves_per_second),
            pending: None,
        }
    }

    /// Replace the pending move; return it if the quota allows a send now
    pub fn offer(&mut self, fields: MoveFields) -> Option<MoveFields> {
        self.pending = Some(fields);
        if self.limiter.check().is_ok() {
            self.pending.take()
        } else {
            None
        }
    }

    /// Release whatever is pending, ignoring the quota
    pub fn flush(&mut self) -> Option<MoveFields> {
        self.pending.take()
    }
}

impl Default for MoveThrottle {
    fn default() -> Self {
        Self::new(MOVE_SEND_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64) -> MoveFields {
        MoveFields::full(x, 0.0, 20.0, 0)
    }

    #[test]
    fn default_quota_passes_a_frame_burst() {
        let mut throttle = MoveThrottle::default();
        for i in 0..60 {
            assert_eq!(throttle.offer(at(i as f64)), Some(at(i as f64)));
        }
        assert_eq!(throttle.flush(), None);
    }

    #[test]
    fn over_quota_keeps_only_the_latest() {
        let mut throttle = MoveThrottle::new(1);
        assert_eq!(throttle.offer(at(1.0)), Some(at(1.0)));
        assert_eq!(throttle.offer(at(2.0)), None);
        assert_eq!(throttle.offer(at(3.0)), None);
        assert_eq!(throttle.flush(), Some(at(3.0)));
        assert_eq!(throttle.flush(), None);
    }
}
