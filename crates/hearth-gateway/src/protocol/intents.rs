//! Gateway intents
//!
//! Intents select which event groups the server sends to a shard.

use bitflags::bitflags;

bitflags! {
    /// Gateway intent flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Intents: u64 {
        const GUILDS                   = 1 << 0;
        /// Privileged
        const GUILD_MEMBERS            = 1 << 1;
        const GUILD_MODERATION         = 1 << 2;
        const GUILD_EMOJIS             = 1 << 3;
        const GUILD_INTEGRATIONS       = 1 << 4;
        const GUILD_WEBHOOKS           = 1 << 5;
        const GUILD_INVITES            = 1 << 6;
        const GUILD_VOICE_STATES       = 1 << 7;
        /// Privileged
        const GUILD_PRESENCES          = 1 << 8;
        const GUILD_MESSAGES           = 1 << 9;
        const GUILD_MESSAGE_REACTIONS  = 1 << 10;
        const GUILD_MESSAGE_TYPING     = 1 << 11;
        const DIRECT_MESSAGES          = 1 << 12;
        const DIRECT_MESSAGE_REACTIONS = 1 << 13;
        const DIRECT_MESSAGE_TYPING    = 1 << 14;
        /// Privileged
        const MESSAGE_CONTENT          = 1 << 15;
    }
}

impl Intents {
    /// Intents the application must be approved for
    pub const PRIVILEGED: Self = Self::GUILD_MEMBERS
        .union(Self::GUILD_PRESENCES)
        .union(Self::MESSAGE_CONTENT);

    /// The set this client's cache is built from
    pub const CACHE: Self = Self::GUILDS
        .union(Self::GUILD_MEMBERS)
        .union(Self::GUILD_VOICE_STATES)
        .union(Self::GUILD_PRESENCES)
        .union(Self::GUILD_MESSAGES)
        .union(Self::GUILD_MESSAGE_TYPING)
        .union(Self::DIRECT_MESSAGES);

    /// Keep known bits, dropping anything this client has no name for
    pub fn from_config(bits: u64) -> Self {
        Self::from_bits_truncate(bits)
    }

    pub fn is_privileged(&self) -> bool {
        self.intersects(Self::PRIVILEGED)
    }

    /// Member chunks without a user-id filter need the members intent
    pub fn can_request_all_members(&self) -> bool {
        self.contains(Self::GUILD_MEMBERS)
    }
}
