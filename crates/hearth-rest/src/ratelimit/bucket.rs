//! Per-route rate-limit bucket

use std::time::Duration;
use tokio::time::Instant;

use super::headers::deadline;
use super::RateLimitHeaders;

/// Budget of one bucket, as last reported by the server.
///
/// A bucket with no remaining requests blocks until its reset instant; once
/// the reset has passed the next request goes out and its response refreshes
/// the budget.
#[derive(Debug, Clone, Default)]
pub struct RateLimitBucket {
    limit: Option<u32>,
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    /// Kept for diagnostics; the route-derived key decides serialization
    server_hash: Option<String>,
}

impl RateLimitBucket {
    pub fn new() -> Self {
        Self::default()
    }

    /// How long the next request must wait, if at all
    pub fn wait_time(&self, now: Instant) -> Option<Duration> {
        let reset_at = self.reset_at?;
        if self.remaining != Some(0) || now >= reset_at {
            return None;
        }
        Some(reset_at - now)
    }

    /// Take in the headers of a response
    pub fn update(&mut self, headers: &RateLimitHeaders, now: Instant) {
        if let Some(hash) = &headers.bucket {
            if self.server_hash.as_deref() != Some(hash.as_str()) {
                tracing::trace!(bucket_hash = %hash, "Server bucket hash changed");
                self.server_hash = Some(hash.clone());
            }
        }
        if let Some(limit) = headers.limit {
            self.limit = Some(limit);
        }
        if let Some(remaining) = headers.remaining {
            self.remaining = Some(remaining);
        }
        if let Some(reset_after) = headers.reset_after {
            self.reset_at = Some(deadline(now, reset_after));
        }
    }

    /// Hold the bucket closed (after a 429)
    pub fn block_for(&mut self, duration: Duration, now: Instant) {
        self.remaining = Some(0);
        self.reset_at = Some(deadline(now, duration));
    }

    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn remaining(&self) -> Option<u32> {
        self.remaining
    }

    pub fn server_hash(&self) -> Option<&str> {
        self.server_hash.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::MAX_RATE_LIMIT_WAIT;

    fn headers(remaining: u32, reset_ms: u64) -> RateLimitHeaders {
        RateLimitHeaders {
            bucket: Some("hash".into()),
            limit: Some(5),
            remaining: Some(remaining),
            reset_after: Some(Duration::from_millis(reset_ms)),
            global: false,
        }
    }

    #[test]
    fn test_fresh_bucket_never_waits() {
        assert!(RateLimitBucket::new().wait_time(Instant::now()).is_none());
    }

    #[test]
    fn test_exhausted_bucket_waits_until_reset() {
        let now = Instant::now();
        let mut bucket = RateLimitBucket::new();
        bucket.update(&headers(0, 1000), now);

        assert_eq!(bucket.wait_time(now), Some(Duration::from_millis(1000)));
        assert_eq!(
            bucket.wait_time(now + Duration::from_millis(400)),
            Some(Duration::from_millis(600))
        );
        assert!(bucket.wait_time(now + Duration::from_millis(1000)).is_none());
        assert_eq!(bucket.server_hash(), Some("hash"));
    }

    #[test]
    fn test_remaining_budget_does_not_wait() {
        let now = Instant::now();
        let mut bucket = RateLimitBucket::new();
        bucket.update(&headers(3, 1000), now);

        assert!(bucket.wait_time(now).is_none());
        assert_eq!(bucket.remaining(), Some(3));
        assert_eq!(bucket.limit(), Some(5));
    }

    #[test]
    fn test_block_for_closes_bucket() {
        let now = Instant::now();
        let mut bucket = RateLimitBucket::new();
        bucket.update(&headers(4, 1000), now);
        bucket.block_for(Duration::from_millis(250), now);

        assert_eq!(bucket.wait_time(now), Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_unbounded_block_is_capped() {
        let now = Instant::now();
        let mut bucket = RateLimitBucket::new();
        bucket.block_for(Duration::MAX, now);

        assert_eq!(bucket.wait_time(now), Some(MAX_RATE_LIMIT_WAIT));
    }
}
