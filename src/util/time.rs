//! Time utilities for the match simulation

use std::time::Duration;

use tokio::time::Instant;

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(std::time::Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Simulation rate of every match loop
pub const SIMULATION_TPS: u32 = 90;

/// Wall-clock budget of one tick
pub fn tick_duration() -> Duration {
    Duration::from_micros(1_000_000 / SIMULATION_TPS as u64)
}

/// Monotonic clock for one match.
///
/// Built on the tokio clock so paused-time tests drive it together with
/// the loop's sleeps.
#[derive(Debug, Clone, Copy)]
pub struct MatchClock {
    start: Instant,
}

impl MatchClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Current instant on the shared clock
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    /// Milliseconds since the match clock started
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for MatchClock {
    fn default() -> Self {
        Self::new()
    }
}
