//! JSON bodies for mutating actions
//!
//! Optional fields are skipped when unset. Fields that the service lets you
//! clear use [`Field`]: `Null` sends an explicit `null`.
//!
//! Bodies with limits the service enforces derive `Validate`; actions check
//! them before anything is queued.

use serde::Serialize;
use validator::{Validate, ValidationError};

use hearth_core::{ChannelType, Embed, Field, Permissions, Snowflake};

/// Longest message content the service accepts
pub const MAX_MESSAGE_LENGTH: usize = 2000;

#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct ModifyCurrentUser {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, max = 32, message = "Username must be 2-32 characters"))]
    pub username: Option<String>,
    /// Image data URI; `Null` removes the avatar
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub avatar: Field<String>,
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct ModifyGuild {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 2, max = 100, message = "Guild name must be 2-100 characters"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub icon: Field<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModifyMember {
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub nick: Field<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<Snowflake>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deaf: Option<bool>,
    /// Move to a voice channel; `Null` disconnects from voice
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub channel_id: Field<Snowflake>,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct CreateChannel {
    #[validate(length(min = 1, max = 100, message = "Channel name must be 1-100 characters"))]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 1024, message = "Topic must be at most 1024 characters"))]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

impl CreateChannel {
    fn of_kind(name: impl Into<String>, kind: ChannelType) -> Self {
        Self {
            name: name.into(),
            kind: kind.as_u8(),
            topic: None,
            bitrate: None,
            user_limit: None,
            parent_id: None,
            position: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::of_kind(name, ChannelType::GuildText)
    }

    pub fn voice(name: impl Into<String>) -> Self {
        Self::of_kind(name, ChannelType::GuildVoice)
    }

    pub fn category(name: impl Into<String>) -> Self {
        Self::of_kind(name, ChannelType::GuildCategory)
    }
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct ModifyChannel {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "Channel name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub topic: Field<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsfw: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_limit: Option<u32>,
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub parent_id: Field<Snowflake>,
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
pub struct CreateRole {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "Role name must be at most 100 characters"))]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Permissions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hoist: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mentionable: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Validate)]
#[validate(schema(function = "validate_message_body"))]
pub struct CreateMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000, message = "Message content must be at most 2000 characters"))]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub tts: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
}

impl CreateMessage {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }
}

/// A message needs something to show
fn validate_message_body(message: &CreateMessage) -> Result<(), ValidationError> {
    let has_content = message.content.as_deref().is_some_and(|content| !content.is_empty());
    if has_content || !message.embeds.is_empty() {
        return Ok(());
    }
    Err(ValidationError::new("empty_message").with_message("Message needs content or an embed".into()))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EditMessage {
    #[serde(skip_serializing_if = "Field::is_missing")]
    pub content: Field<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed>>,
}
