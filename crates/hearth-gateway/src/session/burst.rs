//! Initial guild burst after READY
//!
//! READY lists the guilds a shard owns as unavailable stubs; each then
//! arrives as GUILD_CREATE (or GUILD_DELETE when it is in an outage). The
//! shard counts as ready once every listed guild arrived or the wait expired.

use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

use hearth_core::Snowflake;

#[derive(Debug)]
pub struct GuildBurst {
    pending: HashSet<Snowflake>,
    unavailable: HashSet<Snowflake>,
    deadline: Instant,
}

impl GuildBurst {
    pub fn new(guild_ids: impl IntoIterator<Item = Snowflake>, timeout: Duration) -> Self {
        Self {
            pending: guild_ids.into_iter().collect(),
            unavailable: HashSet::new(),
            deadline: Instant::now() + timeout,
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Listed in READY and not yet arrived
    pub fn is_pending(&self, guild_id: Snowflake) -> bool {
        self.pending.contains(&guild_id)
    }

    /// A listed guild arrived; `available` is false for an outage notice
    pub fn arrived(&mut self, guild_id: Snowflake, available: bool) {
        if !self.pending.remove(&guild_id) {
            return;
        }
        if !available {
            self.unavailable.insert(guild_id);
        }
    }

    /// Guilds that are still unavailable, including those that never arrived
    pub fn finish(self) -> Vec<Snowflake> {
        let mut ids: Vec<Snowflake> = self.pending.union(&self.unavailable).copied().collect();
        ids.sort_unstable();
        ids
    }
}
