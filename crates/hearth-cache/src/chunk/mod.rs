//! Member chunk delivery
//!
//! Large guilds send their member list in pages (GUILD_MEMBERS_CHUNK) after a
//! request-guild-members command. Each page is merged atomically; the list is
//! only reported complete once every page of the request has been merged.

mod tracker;

use serde::Deserialize;

use hearth_core::{MemberPayload, PresencePayload, Snowflake};

pub(crate) use tracker::ChunkTracker;
pub use tracker::{ChunkProgress, ChunkSummary};

/// GUILD_MEMBERS_CHUNK payload
#[derive(Debug, Clone, Deserialize)]
pub struct MemberChunk {
    pub guild_id: Snowflake,
    pub members: Vec<MemberPayload>,
    pub chunk_index: u32,
    pub chunk_count: u32,
    #[serde(default)]
    pub not_found: Vec<Snowflake>,
    #[serde(default)]
    pub presences: Vec<PresencePayload>,
    #[serde(default)]
    pub nonce: Option<String>,
}
