//! Per-session command rate limiting.
//!
//! Each client session owns one [`CommandRateLimiter`], a token bucket that
//! is consulted before a parsed command is handed to the processor. Rejected
//! commands never reach the processor.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

use crate::config::RateLimitConfig;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Command is allowed.
    Allowed,
    /// Command is denied due to rate limit.
    Denied {
        /// Time until the next token becomes available.
        retry_after: Duration,
    },
}

/// Token bucket limiting how fast one session may issue commands.
///
/// # Example
///
/// ```
/// use parlor::config::RateLimitConfig;
/// use parlor::rate_limit::{CommandRateLimiter, RateLimitResult};
///
/// let limiter = CommandRateLimiter::new(&RateLimitConfig {
///     enabled: true,
///     burst: 2,
///     per_second: 1,
/// });
///
/// assert_eq!(limiter.check(), RateLimitResult::Allowed);
/// assert_eq!(limiter.check(), RateLimitResult::Allowed);
/// assert!(matches!(limiter.check(), RateLimitResult::Denied { .. }));
/// ```
pub struct CommandRateLimiter {
    limiter: Option<DirectRateLimiter>,
    clock: DefaultClock,
}

impl CommandRateLimiter {
    /// Create a limiter from configuration.
    ///
    /// A disabled configuration yields a limiter that allows everything.
    pub fn new(config: &RateLimitConfig) -> Self {
        let limiter = config.enabled.then(|| {
            let per_second = NonZeroU32::new(config.per_second).unwrap_or(NonZeroU32::MIN);
            let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
            RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst))
        });

        Self {
            limiter,
            clock: DefaultClock::default(),
        }
    }

    /// Whether this limiter enforces a quota.
    pub fn is_enabled(&self) -> bool {
        self.limiter.is_some()
    }

    /// Take one token if available.
    pub fn check(&self) -> RateLimitResult {
        let Some(limiter) = &self.limiter else {
            return RateLimitResult::Allowed;
        };

        match limiter.check() {
            Ok(()) => RateLimitResult::Allowed,
            Err(not_until) => RateLimitResult::Denied {
                retry_after: not_until.wait_time_from(self.clock.now()),
            },
        }
    }
}
