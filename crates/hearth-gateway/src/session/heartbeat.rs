//! Heartbeat bookkeeping
//!
//! The session's select loop owns the ticker; this tracker only answers
//! whether the previous beat was acknowledged.

use rand::Rng;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

#[derive(Debug)]
pub struct HeartbeatTracker {
    interval: Duration,
    awaiting_ack: bool,
    last_sent: Option<Instant>,
    latency: Option<Duration>,
}

impl HeartbeatTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            awaiting_ack: false,
            last_sent: None,
            latency: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticker whose first beat lands at a random point inside the first interval
    pub fn ticker(&self) -> Interval {
        let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let first = Instant::now() + self.interval.mul_f64(jitter);
        let mut ticker = tokio::time::interval_at(first, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// A beat was sent and never acknowledged before the next one was due
    pub fn is_zombie(&self) -> bool {
        self.awaiting_ack
    }

    pub fn record_sent(&mut self) {
        self.awaiting_ack = true;
        self.last_sent = Some(Instant::now());
    }

    pub fn record_ack(&mut self) {
        self.awaiting_ack = false;
        self.latency = self.last_sent.map(|sent| sent.elapsed());
    }

    /// Round trip of the last acknowledged beat
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_ack_clears_zombie_and_measures_latency() {
        let mut tracker = HeartbeatTracker::new(Duration::from_millis(100));
        assert!(!tracker.is_zombie());

        tracker.record_sent();
        assert!(tracker.is_zombie());

        tokio::time::advance(Duration::from_millis(30)).await;
        tracker.record_ack();
        assert!(!tracker.is_zombie());
        assert_eq!(tracker.latency(), Some(Duration::from_millis(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_within_one_interval() {
        let tracker = HeartbeatTracker::new(Duration::from_millis(100));
        let start = Instant::now();
        let mut ticker = tracker.ticker();

        ticker.tick().await;
        let first = start.elapsed();
        assert!(first <= Duration::from_millis(100));

        ticker.tick().await;
        assert_eq!(start.elapsed() - first, Duration::from_millis(100));
    }
}
