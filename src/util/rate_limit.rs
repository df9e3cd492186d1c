//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Max paddle commands per second on one connection (two players share a
/// socket in local matches)
pub const COMMAND_RATE_LIMIT: u32 = 60;

/// Per-connection command limiter
#[derive(Clone)]
pub struct CommandRateLimiter {
    limiter: Arc<Limiter>,
}

impl CommandRateLimiter {
    pub fn new() -> Self {
        Self {
            limiter: create_limiter(COMMAND_RATE_LIMIT),
        }
    }

    /// Check if a command is allowed (returns true if allowed)
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for CommandRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_beyond_quota_is_rejected() {
        let limiter = CommandRateLimiter::new();
        let allowed = (0..COMMAND_RATE_LIMIT * 2).filter(|_| limiter.check()).count();
        assert!(allowed >= COMMAND_RATE_LIMIT as usize);
        assert!(allowed < (COMMAND_RATE_LIMIT * 2) as usize);
    }
}
