//! Rate limiting for outbound room notices.
//!
//! A single process-wide governor limiter spaces notices out so a burst of
//! command replies never trips the room service's own flood limits.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::time::Duration;
use tracing::debug;

/// Process-wide pacing for notices.
#[derive(Debug)]
pub struct NoticeLimiter {
    limiter: DefaultDirectRateLimiter,
    interval: Duration,
}

impl NoticeLimiter {
    /// One notice per `interval`, no burst.
    pub fn new(interval: Duration) -> Self {
        let mut interval = interval;
        if interval.is_zero() {
            interval = Duration::from_nanos(1);
        }
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(nonzero!(5u32)))
            .allow_burst(nonzero!(1u32));

        Self {
            limiter: RateLimiter::direct(quota),
            interval,
        }
    }

    /// Wait until the next notice may go out.
    pub async fn until_ready(&self) {
        if self.limiter.check().is_ok() {
            return;
        }
        debug!(interval_ms = self.interval.as_millis() as u64, "notice throttled");
        self.limiter.until_ready().await;
    }
}
