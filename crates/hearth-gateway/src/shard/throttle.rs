//! IDENTIFY spacing shared by every shard

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum gap between IDENTIFY sends across shards
#[derive(Debug, Clone)]
pub struct IdentifyThrottle {
    next: Arc<Mutex<Option<Instant>>>,
    spacing: Duration,
}

impl IdentifyThrottle {
    pub fn new(spacing: Duration) -> Self {
        Self {
            next: Arc::new(Mutex::new(None)),
            spacing,
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Wait for this caller's IDENTIFY slot. Callers are served in the order
    /// they arrive; the lock is held across the wait to keep them queued.
    pub async fn acquire(&self) {
        let mut next = self.next.lock().await;
        if let Some(at) = *next {
            if at > Instant::now() {
                tracing::debug!(wait_ms = (at - Instant::now()).as_millis() as u64, "Waiting for identify slot");
                tokio::time::sleep_until(at).await;
            }
        }
        *next = Some(Instant::now() + self.spacing);
    }
}
