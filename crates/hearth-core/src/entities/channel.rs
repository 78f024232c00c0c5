//! Channel entity - text, voice, category, DM or group DM
//!
//! Channels share one field set and carry their kind-specific data in [`ChannelKind`].

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_objects::{Field, Snowflake};

use super::user::UserPayload;

/// Channel type discriminant as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChannelType {
    /// Guild text channel
    GuildText = 0,
    /// Direct message between two users
    Dm = 1,
    /// Guild voice channel
    GuildVoice = 2,
    /// Direct message between several users
    GroupDm = 3,
    /// Guild category for organizing channels
    GuildCategory = 4,
    /// Guild announcement channel, handled as text
    GuildAnnouncement = 5,
}

impl ChannelType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::GuildText),
            1 => Some(Self::Dm),
            2 => Some(Self::GuildVoice),
            3 => Some(Self::GroupDm),
            4 => Some(Self::GuildCategory),
            5 => Some(Self::GuildAnnouncement),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether channels of this type belong to a guild
    #[inline]
    pub fn is_guild(self) -> bool {
        !matches!(self, Self::Dm | Self::GroupDm)
    }
}

/// Kind-specific channel data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelKind {
    GuildText {
        topic: Option<String>,
        nsfw: bool,
        last_message_id: Option<Snowflake>,
        rate_limit_per_user: u32,
        announcement: bool,
    },
    GuildVoice {
        bitrate: u32,
        user_limit: u32,
    },
    GuildCategory,
    Dm {
        recipients: Vec<Snowflake>,
        last_message_id: Option<Snowflake>,
    },
    GroupDm {
        recipients: Vec<Snowflake>,
        owner_id: Option<Snowflake>,
        icon: Option<String>,
        last_message_id: Option<Snowflake>,
    },
}

/// Channel entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub name: Option<String>,
    pub position: i64,
    pub parent_id: Option<Snowflake>,
    pub kind: ChannelKind,
}

/// Channel object as received on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPayload {
    pub id: Snowflake,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub position: Field<i64>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub parent_id: Field<Snowflake>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub topic: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub nsfw: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub last_message_id: Field<Snowflake>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub rate_limit_per_user: Field<u32>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub bitrate: Field<u32>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub user_limit: Field<u32>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub recipients: Field<Vec<UserPayload>>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub owner_id: Field<Snowflake>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub icon: Field<String>,
}

impl Channel {
    /// Build a channel from a full payload.
    ///
    /// `guild_id` overrides the payload's own guild reference, which is absent
    /// for channels nested in a guild object.
    pub fn from_payload(
        guild_id: Option<Snowflake>,
        payload: ChannelPayload,
    ) -> Result<Self, DomainError> {
        let raw = payload.kind.ok_or(DomainError::MissingField("type"))?;
        let channel_type =
            ChannelType::from_u8(raw).ok_or(DomainError::UnknownChannelType(raw))?;

        let kind = match channel_type {
            ChannelType::GuildText | ChannelType::GuildAnnouncement => ChannelKind::GuildText {
                topic: None,
                nsfw: false,
                last_message_id: None,
                rate_limit_per_user: 0,
                announcement: channel_type == ChannelType::GuildAnnouncement,
            },
            ChannelType::GuildVoice => ChannelKind::GuildVoice {
                bitrate: 64_000,
                user_limit: 0,
            },
            ChannelType::GuildCategory => ChannelKind::GuildCategory,
            ChannelType::Dm => ChannelKind::Dm {
                recipients: Vec::new(),
                last_message_id: None,
            },
            ChannelType::GroupDm => ChannelKind::GroupDm {
                recipients: Vec::new(),
                owner_id: None,
                icon: None,
                last_message_id: None,
            },
        };

        let mut channel = Self {
            id: payload.id,
            guild_id: if channel_type.is_guild() {
                guild_id.or(payload.guild_id)
            } else {
                None
            },
            name: None,
            position: 0,
            parent_id: None,
            kind,
        };
        channel.merge(payload);
        Ok(channel)
    }

    /// Apply a partial update. The channel type never changes.
    pub fn merge(&mut self, payload: ChannelPayload) {
        payload.name.apply(&mut self.name);
        payload.position.apply_required(&mut self.position);
        payload.parent_id.apply(&mut self.parent_id);

        match &mut self.kind {
            ChannelKind::GuildText {
                topic,
                nsfw,
                last_message_id,
                rate_limit_per_user,
                ..
            } => {
                payload.topic.apply(topic);
                payload.nsfw.apply_required(nsfw);
                payload.last_message_id.apply(last_message_id);
                payload.rate_limit_per_user.apply_or_default(rate_limit_per_user);
            }
            ChannelKind::GuildVoice { bitrate, user_limit } => {
                payload.bitrate.apply_required(bitrate);
                payload.user_limit.apply_or_default(user_limit);
            }
            ChannelKind::GuildCategory => {}
            ChannelKind::Dm {
                recipients,
                last_message_id,
            } => {
                payload
                    .recipients
                    .map(|users| users.into_iter().map(|u| u.id).collect())
                    .apply_or_default(recipients);
                payload.last_message_id.apply(last_message_id);
            }
            ChannelKind::GroupDm {
                recipients,
                owner_id,
                icon,
                last_message_id,
            } => {
                payload
                    .recipients
                    .map(|users| users.into_iter().map(|u| u.id).collect())
                    .apply_or_default(recipients);
                payload.owner_id.apply(owner_id);
                payload.icon.apply(icon);
                payload.last_message_id.apply(last_message_id);
            }
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        match &self.kind {
            ChannelKind::GuildText { announcement: true, .. } => ChannelType::GuildAnnouncement,
            ChannelKind::GuildText { .. } => ChannelType::GuildText,
            ChannelKind::GuildVoice { .. } => ChannelType::GuildVoice,
            ChannelKind::GuildCategory => ChannelType::GuildCategory,
            ChannelKind::Dm { .. } => ChannelType::Dm,
            ChannelKind::GroupDm { .. } => ChannelType::GroupDm,
        }
    }

    #[inline]
    pub fn is_private(&self) -> bool {
        self.guild_id.is_none()
    }

    #[inline]
    pub fn is_voice(&self) -> bool {
        matches!(self.kind, ChannelKind::GuildVoice { .. })
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(
            self.kind,
            ChannelKind::GuildText { .. } | ChannelKind::Dm { .. } | ChannelKind::GroupDm { .. }
        )
    }

    /// Newest message seen in a text channel
    pub fn last_message_id(&self) -> Option<Snowflake> {
        match &self.kind {
            ChannelKind::GuildText { last_message_id, .. }
            | ChannelKind::Dm { last_message_id, .. }
            | ChannelKind::GroupDm { last_message_id, .. } => *last_message_id,
            ChannelKind::GuildVoice { .. } | ChannelKind::GuildCategory => None,
        }
    }

    /// Mention string for message content
    pub fn mention(&self) -> String {
        format!("<#{}>", self.id)
    }
}
