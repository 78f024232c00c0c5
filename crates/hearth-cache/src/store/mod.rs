//! The entity cache
//!
//! # Layout
//!
//! - Users live once in `users`, shared as `Arc<User>`; members refer to them by id.
//! - Everything scoped to a guild lives in that guild's [`GuildState`] entry, so
//!   all writes for one guild serialize while unrelated guilds proceed in parallel.
//! - `channel_guild` indexes guild channels by id for lookups that only know the
//!   channel.
//!
//! Lock order is `guilds` before `channel_guild`; no code path takes them the
//! other way round, and no guild entry is held while `users` is written.
//!
//! # Cloning
//!
//! The cache wraps its data in an `Arc`; clones are cheap and share state.

mod generic;
mod guild_state;
mod reads;
mod writes;

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;

use hearth_core::{Channel, Presence, Snowflake, User};

use crate::chunk::ChunkTracker;

pub use generic::{CacheKey, Entity, Patch};
pub use guild_state::GuildState;
pub use writes::GuildCreateOutcome;

#[derive(Debug, Default)]
struct Inner {
    users: DashMap<Snowflake, Arc<User>>,
    guilds: DashMap<Snowflake, GuildState>,
    channel_guild: DashMap<Snowflake, Snowflake>,
    private_channels: DashMap<Snowflake, Channel>,
    current_user_id: RwLock<Option<Snowflake>>,
    current_presence: RwLock<Option<Presence>>,
    chunks: ChunkTracker,
}

/// Thread-safe, in-process mirror of remote entities
#[derive(Debug, Clone, Default)]
pub struct EntityCache(Arc<Inner>);

/// Entry counts, for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub users: usize,
    pub guilds: usize,
    pub unavailable_guilds: usize,
    pub channels: usize,
    pub private_channels: usize,
    pub members: usize,
    /// Member requests still waiting for chunks
    pub pending_member_requests: usize,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached entity
    pub fn clear(&self) {
        self.0.users.clear();
        self.0.guilds.clear();
        self.0.channel_guild.clear();
        self.0.private_channels.clear();
        *self.0.current_user_id.write() = None;
        *self.0.current_presence.write() = None;
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            users: self.0.users.len(),
            guilds: self.0.guilds.len(),
            private_channels: self.0.private_channels.len(),
            pending_member_requests: self.0.chunks.in_flight(),
            ..CacheStats::default()
        };
        for state in &self.0.guilds {
            if !state.is_available() {
                stats.unavailable_guilds += 1;
            }
            stats.channels += state.channels.len();
            stats.members += state.members.len();
        }
        stats
    }
}
