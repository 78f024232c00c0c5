//! Voice state entity - a user's connection to a voice channel

use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

use super::member::{GuildMember, MemberPayload};

/// Voice state entity, one per (guild, user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceState {
    pub guild_id: Option<Snowflake>,
    /// `None` once the user left voice
    pub channel_id: Option<Snowflake>,
    pub user_id: Snowflake,
    pub session_id: String,
    /// Server-side flags set by moderators
    pub deaf: bool,
    pub mute: bool,
    /// Flags set by the user's own client
    pub self_deaf: bool,
    pub self_mute: bool,
    pub suppress: bool,
}

/// VOICE_STATE_UPDATE payload; voice states are always sent whole
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStatePayload {
    #[serde(default)]
    pub guild_id: Option<Snowflake>,
    #[serde(default)]
    pub channel_id: Option<Snowflake>,
    pub user_id: Snowflake,
    #[serde(default)]
    pub member: Option<MemberPayload>,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub deaf: bool,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub self_deaf: bool,
    #[serde(default)]
    pub self_mute: bool,
    #[serde(default)]
    pub suppress: bool,
}

impl VoiceState {
    pub fn from_payload(guild_id: Option<Snowflake>, payload: &VoiceStatePayload) -> Self {
        Self {
            guild_id: guild_id.or(payload.guild_id),
            channel_id: payload.channel_id,
            user_id: payload.user_id,
            session_id: payload.session_id.clone(),
            deaf: payload.deaf,
            mute: payload.mute,
            self_deaf: payload.self_deaf,
            self_mute: payload.self_mute,
            suppress: payload.suppress,
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.channel_id.is_some()
    }

    /// Muted by the session or, when known, by the member's guild-level flag
    pub fn effective_mute(&self, member: Option<&GuildMember>) -> bool {
        self.self_mute || self.mute || member.is_some_and(|m| m.mute)
    }

    /// Deafened by the session or, when known, by the member's guild-level flag
    pub fn effective_deaf(&self, member: Option<&GuildMember>) -> bool {
        self.self_deaf || self.deaf || member.is_some_and(|m| m.deaf)
    }
}
