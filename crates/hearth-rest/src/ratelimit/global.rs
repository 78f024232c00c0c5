//! Process-wide request limiter

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::Mutex;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::Instant;

use super::headers::deadline;

/// Aggregate limit across every bucket.
///
/// Combines a steady requests-per-second quota with a hard block that a
/// global 429 imposes on every bucket at once.
pub struct GlobalLimiter {
    limiter: DefaultDirectRateLimiter,
    blocked_until: Mutex<Option<Instant>>,
}

impl std::fmt::Debug for GlobalLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalLimiter")
            .field("blocked_until", &*self.blocked_until.lock())
            .finish_non_exhaustive()
    }
}

impl GlobalLimiter {
    pub fn new(per_second: u32) -> Self {
        let rate = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            blocked_until: Mutex::new(None),
        }
    }

    /// Wait for a global slot
    pub async fn acquire(&self) {
        loop {
            let blocked_until = *self.blocked_until.lock();
            match blocked_until {
                Some(until) if until > Instant::now() => tokio::time::sleep_until(until).await,
                _ => break,
            }
        }
        self.limiter.until_ready().await;
    }

    /// Block every bucket for `duration`; never shortens an existing block
    pub fn block_for(&self, duration: Duration) {
        let until = deadline(Instant::now(), duration);
        let mut blocked_until = self.blocked_until.lock();
        if blocked_until.map_or(true, |current| current < until) {
            *blocked_until = Some(until);
        }
    }

    pub fn blocked_until(&self) -> Option<Instant> {
        let blocked_until = *self.blocked_until.lock();
        blocked_until.filter(|until| *until > Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_global_block_delays_acquire() {
        let limiter = GlobalLimiter::new(50);
        let start = Instant::now();
        limiter.block_for(Duration::from_secs(2));
        limiter.block_for(Duration::from_millis(500));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(limiter.blocked_until().is_none());
    }

    #[tokio::test]
    async fn test_unblocked_acquire_is_immediate() {
        let limiter = GlobalLimiter::new(0);
        tokio::time::timeout(Duration::from_secs(1), limiter.acquire())
            .await
            .unwrap();
    }
}
