//! Trust boundary for client-reported state
//!
//! The relay stores whatever a client says about itself. Every reported move
//! goes through an [`Authority`] before it reaches the registry, so a stricter
//! policy can be dropped in without touching the protocol.

use crate::ws::protocol::{MoveFields, Player};

/// Decides what part of a reported move the relay accepts
pub trait Authority: Send + 'static {
    /// Return the fields to apply, or `None` to drop the move entirely
    fn review_move(&self, current: &Player, proposed: MoveFields) -> Option<MoveFields>;
}

/// Accepts every report as-is: no bounds, no growth limits, no rate checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustClient;

impl Authority for TrustClient {
    fn review_move(&self, _current: &Player, proposed: MoveFields) -> Option<MoveFields> {
        Some(proposed)
    }
}
