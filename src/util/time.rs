//! Time utilities

use std::time::{Duration, Instant};

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Client frame rate
pub const FRAME_RATE: u32 = 60;

/// How long the server holds a long-poll GET open with nothing to send
pub const POLL_WAIT: Duration = Duration::from_secs(25);

/// A polling session with no GET for this long is treated as disconnected
pub const POLL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Frame period for a given rate; a rate of zero falls back to the default
pub fn frame_period(frames_per_second: u32) -> Duration {
    let fps = if frames_per_second == 0 {
        FRAME_RATE
    } else {
        frames_per_second
    };
    Duration::from_micros(1_000_000 / fps as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_period_handles_zero() {
        assert_eq!(frame_period(50), Duration::from_millis(20));
        assert_eq!(frame_period(0), frame_period(FRAME_RATE));
    }
}
