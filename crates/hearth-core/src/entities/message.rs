//! Message entity - never cached, only returned to callers and carried by events

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{Field, Snowflake};

use super::member::MemberPayload;
use super::user::UserPayload;

/// Rich embed attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    pub author: UserPayload,
    /// Present on guild messages received over the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<MemberPayload>,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tts: bool,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub mentions: Vec<UserPayload>,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

/// MESSAGE_UPDATE payload; only `id` and `channel_id` are guaranteed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageUpdate {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub content: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub edited_timestamp: Field<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub pinned: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub embeds: Field<Vec<Embed>>,
}

impl Message {
    /// Apply an edit to a message held by the caller
    pub fn apply_update(&mut self, update: MessageUpdate) {
        update.content.apply_required(&mut self.content);
        update.edited_timestamp.apply(&mut self.edited_timestamp);
        update.pinned.apply_required(&mut self.pinned);
        update.embeds.apply_or_default(&mut self.embeds);
    }

    #[inline]
    pub fn is_private(&self) -> bool {
        self.guild_id.is_none()
    }
}
