//! Bookkeeping for in-flight member requests

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tokio::sync::oneshot;

use hearth_core::Snowflake;

/// Requests are told apart by nonce; requests without one share the guild's slot
type ChunkKey = (Snowflake, Option<String>);

/// Result of a fully delivered member request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSummary {
    pub guild_id: Snowflake,
    pub nonce: Option<String>,
    pub user_ids: Vec<Snowflake>,
    pub not_found: Vec<Snowflake>,
}

/// Outcome of merging one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkProgress {
    pub guild_id: Snowflake,
    pub chunk_index: u32,
    pub chunk_count: u32,
    /// Members merged from this chunk
    pub user_ids: Vec<Snowflake>,
    /// Every chunk of the request has now been merged
    pub complete: bool,
}

#[derive(Debug, Default)]
struct Pending {
    received: HashSet<u32>,
    user_ids: Vec<Snowflake>,
    not_found: Vec<Snowflake>,
    waiters: Vec<oneshot::Sender<ChunkSummary>>,
}

#[derive(Debug, Default)]
pub(crate) struct ChunkTracker {
    pending: Mutex<HashMap<ChunkKey, Pending>>,
}

pub(crate) type Completion = (ChunkSummary, Vec<oneshot::Sender<ChunkSummary>>);

impl ChunkTracker {
    /// Register interest in a request before it is sent
    pub fn register(
        &self,
        guild_id: Snowflake,
        nonce: Option<String>,
    ) -> oneshot::Receiver<ChunkSummary> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .entry((guild_id, nonce))
            .or_default()
            .waiters
            .push(tx);
        rx
    }

    /// Record one merged chunk.
    ///
    /// Returns the summary and the waiters to notify once the last missing
    /// chunk index arrives. Replayed indexes are counted once.
    pub fn record(
        &self,
        guild_id: Snowflake,
        nonce: Option<String>,
        chunk_index: u32,
        chunk_count: u32,
        user_ids: &[Snowflake],
        not_found: &[Snowflake],
    ) -> Option<Completion> {
        let key = (guild_id, nonce);
        let mut pending = self.pending.lock();
        let entry = pending.entry(key.clone()).or_default();

        if entry.received.insert(chunk_index) {
            entry.user_ids.extend_from_slice(user_ids);
            entry.not_found.extend_from_slice(not_found);
        }

        if (entry.received.len() as u32) < chunk_count.max(1) {
            return None;
        }

        let done = pending.remove(&key)?;
        Some((
            ChunkSummary {
                guild_id,
                nonce: key.1,
                user_ids: done.user_ids,
                not_found: done.not_found,
            },
            done.waiters,
        ))
    }

    /// Forget in-flight requests for a guild; their waiters observe a closed channel
    pub fn cancel_guild(&self, guild_id: Snowflake) {
        self.pending.lock().retain(|(id, _), _| *id != guild_id);
    }

    /// Requests with chunks still outstanding
    pub fn in_flight(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u64]) -> Vec<Snowflake> {
        raw.iter().copied().map(Snowflake::new).collect()
    }

    #[test]
    fn test_completes_after_every_index() {
        let tracker = ChunkTracker::default();
        let guild = Snowflake::new(1);
        let nonce = Some("n1".to_string());

        assert!(tracker.record(guild, nonce.clone(), 1, 3, &ids(&[3]), &[]).is_none());
        assert!(tracker.record(guild, nonce.clone(), 0, 3, &ids(&[1, 2]), &[]).is_none());
        // Replay of an index already seen does not count twice
        assert!(tracker.record(guild, nonce.clone(), 0, 3, &ids(&[1, 2]), &[]).is_none());

        let (summary, waiters) = tracker
            .record(guild, nonce, 2, 3, &ids(&[4]), &ids(&[99]))
            .unwrap();
        assert!(waiters.is_empty());
        assert_eq!(summary.user_ids, ids(&[3, 1, 2, 4]));
        assert_eq!(summary.not_found, ids(&[99]));
        assert_eq!(tracker.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_waiter_is_notified() {
        let tracker = ChunkTracker::default();
        let guild = Snowflake::new(1);
        let rx = tracker.register(guild, Some("abc".into()));

        let (summary, waiters) = tracker
            .record(guild, Some("abc".into()), 0, 1, &ids(&[7]), &[])
            .unwrap();
        for waiter in waiters {
            let _ = waiter.send(summary.clone());
        }

        let received = rx.await.unwrap();
        assert_eq!(received.user_ids, ids(&[7]));
        assert_eq!(received.nonce.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_cancel_guild_closes_waiters() {
        let tracker = ChunkTracker::default();
        let rx = tracker.register(Snowflake::new(1), None);
        let other = tracker.register(Snowflake::new(2), None);

        tracker.cancel_guild(Snowflake::new(1));

        assert!(rx.await.is_err());
        assert_eq!(tracker.in_flight(), 1);
        drop(other);
    }
}
