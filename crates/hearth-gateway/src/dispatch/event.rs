//! Typed dispatch payloads
//!
//! A DISPATCH frame's `t` and `d` decoded into one variant per event name.
//! Names this client has no model for decode to [`GatewayEvent::Unknown`].

use serde::Deserialize;
use serde_json::Value;

use hearth_cache::MemberChunk;
use hearth_core::{
    ChannelPayload, GuildPayload, MemberPayload, Message, MessageUpdate, PresencePayload,
    RolePayload, Snowflake, UnavailableGuild, UserPayload, VoiceStatePayload,
};

use crate::protocol::ReadyPayload;

#[derive(Debug, Clone, Deserialize)]
pub struct MemberRemove {
    pub guild_id: Snowflake,
    pub user: UserPayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleChange {
    pub guild_id: Snowflake,
    pub role: RolePayload,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleDelete {
    pub guild_id: Snowflake,
    pub role_id: Snowflake,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceServerUpdate {
    pub guild_id: Snowflake,
    /// `None` while the voice server is being reallocated
    #[serde(default)]
    pub endpoint: Option<String>,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDelete {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageDeleteBulk {
    pub ids: Vec<Snowflake>,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypingStart {
    pub channel_id: Snowflake,
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    pub user_id: Snowflake,
    /// Unix time in seconds
    pub timestamp: i64,
    #[serde(default)]
    pub member: Option<MemberPayload>,
}

/// A decoded dispatch
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Ready(Box<ReadyPayload>),
    Resumed,
    GuildCreate(Box<GuildPayload>),
    GuildUpdate(Box<GuildPayload>),
    GuildDelete(UnavailableGuild),
    ChannelCreate(ChannelPayload),
    ChannelUpdate(ChannelPayload),
    ChannelDelete(ChannelPayload),
    MemberAdd(MemberPayload),
    MemberUpdate(MemberPayload),
    MemberRemove(MemberRemove),
    MembersChunk(MemberChunk),
    RoleCreate(RoleChange),
    RoleUpdate(RoleChange),
    RoleDelete(RoleDelete),
    PresenceUpdate(PresencePayload),
    VoiceStateUpdate(VoiceStatePayload),
    VoiceServerUpdate(VoiceServerUpdate),
    MessageCreate(Box<Message>),
    MessageUpdate(MessageUpdate),
    MessageDelete(MessageDelete),
    MessageDeleteBulk(MessageDeleteBulk),
    TypingStart(TypingStart),
    UserUpdate(UserPayload),
    Unknown { name: String, data: Value },
}

impl GatewayEvent {
    /// Decode the `d` of a dispatch named `name`
    pub fn parse(name: &str, data: Value) -> Result<Self, serde_json::Error> {
        Ok(match name {
            "READY" => Self::Ready(serde_json::from_value(data)?),
            "RESUMED" => Self::Resumed,
            "GUILD_CREATE" => Self::GuildCreate(serde_json::from_value(data)?),
            "GUILD_UPDATE" => Self::GuildUpdate(serde_json::from_value(data)?),
            "GUILD_DELETE" => Self::GuildDelete(serde_json::from_value(data)?),
            "CHANNEL_CREATE" => Self::ChannelCreate(serde_json::from_value(data)?),
            "CHANNEL_UPDATE" => Self::ChannelUpdate(serde_json::from_value(data)?),
            "CHANNEL_DELETE" => Self::ChannelDelete(serde_json::from_value(data)?),
            "GUILD_MEMBER_ADD" => Self::MemberAdd(serde_json::from_value(data)?),
            "GUILD_MEMBER_UPDATE" => Self::MemberUpdate(serde_json::from_value(data)?),
            "GUILD_MEMBER_REMOVE" => Self::MemberRemove(serde_json::from_value(data)?),
            "GUILD_MEMBERS_CHUNK" => Self::MembersChunk(serde_json::from_value(data)?),
            "GUILD_ROLE_CREATE" => Self::RoleCreate(serde_json::from_value(data)?),
            "GUILD_ROLE_UPDATE" => Self::RoleUpdate(serde_json::from_value(data)?),
            "GUILD_ROLE_DELETE" => Self::RoleDelete(serde_json::from_value(data)?),
            "PRESENCE_UPDATE" => Self::PresenceUpdate(serde_json::from_value(data)?),
            "VOICE_STATE_UPDATE" => Self::VoiceStateUpdate(serde_json::from_value(data)?),
            "VOICE_SERVER_UPDATE" => Self::VoiceServerUpdate(serde_json::from_value(data)?),
            "MESSAGE_CREATE" => Self::MessageCreate(serde_json::from_value(data)?),
            "MESSAGE_UPDATE" => Self::MessageUpdate(serde_json::from_value(data)?),
            "MESSAGE_DELETE" => Self::MessageDelete(serde_json::from_value(data)?),
            "MESSAGE_DELETE_BULK" => Self::MessageDeleteBulk(serde_json::from_value(data)?),
            "TYPING_START" => Self::TypingStart(serde_json::from_value(data)?),
            "USER_UPDATE" => Self::UserUpdate(serde_json::from_value(data)?),
            _ => Self::Unknown {
                name: name.to_string(),
                data,
            },
        })
    }

    /// Guild the payload is scoped to, used to route it to its shard
    pub fn guild_id(&self) -> Option<Snowflake> {
        match self {
            Self::GuildCreate(guild) | Self::GuildUpdate(guild) => Some(guild.id),
            Self::GuildDelete(guild) => Some(guild.id),
            Self::ChannelCreate(channel)
            | Self::ChannelUpdate(channel)
            | Self::ChannelDelete(channel) => channel.guild_id,
            Self::MemberAdd(member) | Self::MemberUpdate(member) => member.guild_id,
            Self::MemberRemove(remove) => Some(remove.guild_id),
            Self::MembersChunk(chunk) => Some(chunk.guild_id),
            Self::RoleCreate(change) | Self::RoleUpdate(change) => Some(change.guild_id),
            Self::RoleDelete(delete) => Some(delete.guild_id),
            Self::PresenceUpdate(presence) => presence.guild_id,
            Self::VoiceStateUpdate(state) => state.guild_id,
            Self::VoiceServerUpdate(server) => Some(server.guild_id),
            Self::MessageCreate(message) => message.guild_id,
            Self::MessageUpdate(update) => update.guild_id,
            Self::MessageDelete(delete) => delete.guild_id,
            Self::MessageDeleteBulk(delete) => delete.guild_id,
            Self::TypingStart(typing) => typing.guild_id,
            Self::Ready(_) | Self::Resumed | Self::UserUpdate(_) | Self::Unknown { .. } => None,
        }
    }
}
