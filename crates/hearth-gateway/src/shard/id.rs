//! Shard identity

use std::fmt;

use hearth_core::Snowflake;

/// `(index, count)` pair sent in IDENTIFY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardId {
    index: u32,
    count: u32,
}

impl ShardId {
    /// The only shard of an unsharded client
    pub const SINGLE: Self = Self { index: 0, count: 1 };

    /// `None` unless `index < count`
    pub const fn new(index: u32, count: u32) -> Option<Self> {
        if index < count {
            Some(Self { index, count })
        } else {
            None
        }
    }

    /// Every shard of a `count`-shard deployment, in launch order
    pub fn all(count: u32) -> impl Iterator<Item = Self> {
        let count = count.max(1);
        (0..count).map(move |index| Self { index, count })
    }

    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn count(self) -> u32 {
        self.count
    }

    /// Whether `guild_id` is routed to this shard
    #[inline]
    pub const fn owns(self, guild_id: Snowflake) -> bool {
        guild_id.shard_index(self.count) == self.index
    }

    pub const fn as_array(self) -> [u32; 2] {
        [self.index, self.count]
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.index, self.count)
    }
}
