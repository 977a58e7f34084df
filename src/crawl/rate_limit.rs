//! Politeness for web crawling

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::time::Duration;
use tracing::trace;

/// Per-run politeness: a fixed pause before every fetch plus a rate limit
pub struct Politeness {
    delay: Duration,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl Politeness {
    /// Create a policy with a fixed delay and a requests-per-second cap
    pub fn new(delay: Duration, requests_per_second: f64) -> Self {
        let quota = (requests_per_second.is_finite() && requests_per_second > 0.0)
            .then(|| Duration::try_from_secs_f64(1.0 / requests_per_second).ok())
            .flatten()
            .and_then(Quota::with_period)
            .unwrap_or_else(|| Quota::per_second(nonzero!(1u32)));

        Self {
            delay,
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Wait until the next request is allowed
    pub async fn wait(&self) {
        if !self.delay.is_zero() {
            trace!("Politeness delay: {:?}", self.delay);
            tokio::time::sleep(self.delay).await;
        }
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for Politeness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Politeness")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}
