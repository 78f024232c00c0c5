//! Domain events - one typed event per dispatch merged into the cache
//!
//! Update events carry the cached value from before the merge (`old`) when the
//! cache had one, so listeners can diff without keeping their own copy.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entities::{
    Channel, Guild, GuildMember, Message, MessageUpdate, Presence, Role, User, VoiceState,
};
use crate::value_objects::Snowflake;

/// All events delivered to listeners
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainEvent {
    // =========================================================================
    // Session Events
    // =========================================================================
    Ready {
        session_id: String,
        user: User,
        guild_ids: Vec<Snowflake>,
    },
    Resumed,
    /// A shard was started by the shard manager
    ShardLaunched { shard_id: u32, shard_count: u32 },
    /// Every guild announced in READY has arrived (or the wait timed out)
    ShardReady {
        shard_id: u32,
        unavailable_guilds: Vec<Snowflake>,
    },

    // =========================================================================
    // Guild Events
    // =========================================================================
    /// The client joined a guild, or a guild arrived during the initial burst
    GuildCreate { guild: Guild },
    /// A guild came back from an outage and was rebuilt
    GuildAvailable { guild: Guild },
    GuildUpdate { old: Option<Guild>, guild: Guild },
    /// A guild entered an outage
    GuildUnavailable { guild_id: Snowflake },
    /// The client left or was removed from a guild
    GuildDelete {
        guild_id: Snowflake,
        guild: Option<Guild>,
    },

    // =========================================================================
    // Channel Events
    // =========================================================================
    ChannelCreate { channel: Channel },
    ChannelUpdate {
        old: Option<Channel>,
        channel: Channel,
    },
    ChannelDelete { channel: Channel },

    // =========================================================================
    // Member Events
    // =========================================================================
    MemberAdd { member: GuildMember, user: User },
    MemberUpdate {
        old: Option<GuildMember>,
        member: GuildMember,
    },
    MemberRemove { guild_id: Snowflake, user: User },
    MembersChunk {
        guild_id: Snowflake,
        chunk_index: u32,
        chunk_count: u32,
        user_ids: Vec<Snowflake>,
        not_found: Vec<Snowflake>,
        nonce: Option<String>,
    },

    // =========================================================================
    // Role Events
    // =========================================================================
    RoleCreate { role: Role },
    RoleUpdate { old: Option<Role>, role: Role },
    RoleDelete {
        guild_id: Snowflake,
        role_id: Snowflake,
        role: Option<Role>,
    },

    // =========================================================================
    // Presence & Voice Events
    // =========================================================================
    PresenceUpdate {
        old: Option<Presence>,
        presence: Presence,
    },
    VoiceStateUpdate {
        old: Option<VoiceState>,
        state: VoiceState,
    },
    VoiceServerUpdate {
        guild_id: Snowflake,
        endpoint: Option<String>,
        token: String,
    },

    // =========================================================================
    // Message Events
    // =========================================================================
    MessageCreate { message: Box<Message> },
    MessageUpdate { update: MessageUpdate },
    MessageDelete {
        id: Snowflake,
        channel_id: Snowflake,
        guild_id: Option<Snowflake>,
    },
    MessageDeleteBulk {
        ids: Vec<Snowflake>,
        channel_id: Snowflake,
        guild_id: Option<Snowflake>,
    },
    TypingStart {
        channel_id: Snowflake,
        guild_id: Option<Snowflake>,
        user_id: Snowflake,
        timestamp: i64,
    },

    // =========================================================================
    // User Events
    // =========================================================================
    UserUpdate { old: Option<User>, user: User },

    /// Dispatch this client has no typed model for
    Unknown {
        name: String,
        data: serde_json::Value,
    },
}

/// Discriminant of [`DomainEvent`], used to register typed listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    Resumed,
    ShardLaunched,
    ShardReady,
    GuildCreate,
    GuildAvailable,
    GuildUpdate,
    GuildUnavailable,
    GuildDelete,
    ChannelCreate,
    ChannelUpdate,
    ChannelDelete,
    MemberAdd,
    MemberUpdate,
    MemberRemove,
    MembersChunk,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
    PresenceUpdate,
    VoiceStateUpdate,
    VoiceServerUpdate,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    MessageDeleteBulk,
    TypingStart,
    UserUpdate,
    Unknown,
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Ready { .. } => EventKind::Ready,
            Self::Resumed => EventKind::Resumed,
            Self::ShardLaunched { .. } => EventKind::ShardLaunched,
            Self::ShardReady { .. } => EventKind::ShardReady,
            Self::GuildCreate { .. } => EventKind::GuildCreate,
            Self::GuildAvailable { .. } => EventKind::GuildAvailable,
            Self::GuildUpdate { .. } => EventKind::GuildUpdate,
            Self::GuildUnavailable { .. } => EventKind::GuildUnavailable,
            Self::GuildDelete { .. } => EventKind::GuildDelete,
            Self::ChannelCreate { .. } => EventKind::ChannelCreate,
            Self::ChannelUpdate { .. } => EventKind::ChannelUpdate,
            Self::ChannelDelete { .. } => EventKind::ChannelDelete,
            Self::MemberAdd { .. } => EventKind::MemberAdd,
            Self::MemberUpdate { .. } => EventKind::MemberUpdate,
            Self::MemberRemove { .. } => EventKind::MemberRemove,
            Self::MembersChunk { .. } => EventKind::MembersChunk,
            Self::RoleCreate { .. } => EventKind::RoleCreate,
            Self::RoleUpdate { .. } => EventKind::RoleUpdate,
            Self::RoleDelete { .. } => EventKind::RoleDelete,
            Self::PresenceUpdate { .. } => EventKind::PresenceUpdate,
            Self::VoiceStateUpdate { .. } => EventKind::VoiceStateUpdate,
            Self::VoiceServerUpdate { .. } => EventKind::VoiceServerUpdate,
            Self::MessageCreate { .. } => EventKind::MessageCreate,
            Self::MessageUpdate { .. } => EventKind::MessageUpdate,
            Self::MessageDelete { .. } => EventKind::MessageDelete,
            Self::MessageDeleteBulk { .. } => EventKind::MessageDeleteBulk,
            Self::TypingStart { .. } => EventKind::TypingStart,
            Self::UserUpdate { .. } => EventKind::UserUpdate,
            Self::Unknown { .. } => EventKind::Unknown,
        }
    }

    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Guild the event is scoped to, if any
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Self::GuildCreate { guild }
            | Self::GuildAvailable { guild }
            | Self::GuildUpdate { guild, .. } => Some(guild.id),
            Self::GuildUnavailable { guild_id }
            | Self::GuildDelete { guild_id, .. }
            | Self::MemberRemove { guild_id, .. }
            | Self::MembersChunk { guild_id, .. }
            | Self::RoleDelete { guild_id, .. }
            | Self::VoiceServerUpdate { guild_id, .. } => Some(*guild_id),
            Self::ChannelCreate { channel }
            | Self::ChannelUpdate { channel, .. }
            | Self::ChannelDelete { channel } => channel.guild_id,
            Self::MemberAdd { member, .. } | Self::MemberUpdate { member, .. } => {
                Some(member.guild_id)
            }
            Self::RoleCreate { role } | Self::RoleUpdate { role, .. } => Some(role.guild_id),
            Self::PresenceUpdate { presence, .. } => presence.guild_id,
            Self::VoiceStateUpdate { state, .. } => state.guild_id,
            Self::MessageCreate { message } => message.guild_id,
            Self::MessageUpdate { update } => update.guild_id,
            Self::MessageDelete { guild_id, .. }
            | Self::MessageDeleteBulk { guild_id, .. }
            | Self::TypingStart { guild_id, .. } => *guild_id,
            Self::Ready { .. }
            | Self::Resumed
            | Self::ShardLaunched { .. }
            | Self::ShardReady { .. }
            | Self::UserUpdate { .. }
            | Self::Unknown { .. } => None,
        }
    }
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::Resumed => "RESUMED",
            Self::ShardLaunched => "SHARD_LAUNCHED",
            Self::ShardReady => "SHARD_READY",
            Self::GuildCreate => "GUILD_CREATE",
            Self::GuildAvailable => "GUILD_AVAILABLE",
            Self::GuildUpdate => "GUILD_UPDATE",
            Self::GuildUnavailable => "GUILD_UNAVAILABLE",
            Self::GuildDelete => "GUILD_DELETE",
            Self::ChannelCreate => "CHANNEL_CREATE",
            Self::ChannelUpdate => "CHANNEL_UPDATE",
            Self::ChannelDelete => "CHANNEL_DELETE",
            Self::MemberAdd => "GUILD_MEMBER_ADD",
            Self::MemberUpdate => "GUILD_MEMBER_UPDATE",
            Self::MemberRemove => "GUILD_MEMBER_REMOVE",
            Self::MembersChunk => "GUILD_MEMBERS_CHUNK",
            Self::RoleCreate => "GUILD_ROLE_CREATE",
            Self::RoleUpdate => "GUILD_ROLE_UPDATE",
            Self::RoleDelete => "GUILD_ROLE_DELETE",
            Self::PresenceUpdate => "PRESENCE_UPDATE",
            Self::VoiceStateUpdate => "VOICE_STATE_UPDATE",
            Self::VoiceServerUpdate => "VOICE_SERVER_UPDATE",
            Self::MessageCreate => "MESSAGE_CREATE",
            Self::MessageUpdate => "MESSAGE_UPDATE",
            Self::MessageDelete => "MESSAGE_DELETE",
            Self::MessageDeleteBulk => "MESSAGE_DELETE_BULK",
            Self::TypingStart => "TYPING_START",
            Self::UserUpdate => "USER_UPDATE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
