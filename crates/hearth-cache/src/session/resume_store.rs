//! Per-shard resume information, kept in memory.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Everything needed to RESUME a gateway session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeInfo {
    /// Session id from READY
    pub session_id: String,
    /// Highest dispatch sequence number seen
    pub sequence: u64,
    /// Gateway URL the server asked us to resume against
    pub resume_url: Option<String>,
}

impl ResumeInfo {
    pub fn new(session_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            session_id: session_id.into(),
            sequence,
            resume_url: None,
        }
    }

    #[must_use]
    pub fn with_resume_url(mut self, url: impl Into<String>) -> Self {
        self.resume_url = Some(url.into());
        self
    }

    /// Advance the sequence; sequence numbers never move backwards
    pub fn observe(&mut self, sequence: u64) {
        self.sequence = self.sequence.max(sequence);
    }
}

/// Resume information keyed by shard index
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<DashMap<u32, ResumeInfo>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, shard: u32) -> Option<ResumeInfo> {
        self.sessions.get(&shard).map(|info| info.clone())
    }

    pub fn save(&self, shard: u32, info: ResumeInfo) {
        tracing::debug!(shard, session_id = %info.session_id, sequence = info.sequence, "Saved resume info");
        self.sessions.insert(shard, info);
    }

    /// Record a dispatch sequence number for a shard with a known session
    pub fn observe_sequence(&self, shard: u32, sequence: u64) {
        if let Some(mut info) = self.sessions.get_mut(&shard) {
            info.observe(sequence);
        }
    }

    /// Forget a shard's session; the next connect identifies from scratch
    pub fn invalidate(&self, shard: u32) -> Option<ResumeInfo> {
        let removed = self.sessions.remove(&shard).map(|(_, info)| info);
        if removed.is_some() {
            tracing::debug!(shard, "Discarded resume info");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
