//! Member entity - a user's membership in a guild

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{Field, Snowflake};

use super::user::UserPayload;

/// Guild member entity, keyed by (guild id, user id)
///
/// The member refers to its [`User`](super::User) by id; the user itself lives once in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildMember {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    pub nick: Option<String>,
    pub roles: Vec<Snowflake>,
    pub joined_at: Option<DateTime<Utc>>,
    pub deaf: bool,
    pub mute: bool,
}

/// Member object as received on the wire
///
/// `guild_id` is only present on member events; inside a guild or chunk
/// payload it is supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    /// Absent on the member attached to a message; the author stands in
    #[serde(default)]
    pub user: UserPayload,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub nick: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub roles: Field<Vec<Snowflake>>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub joined_at: Field<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub deaf: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub mute: Field<bool>,
}

impl GuildMember {
    /// Create a new GuildMember
    pub fn new(guild_id: Snowflake, user_id: Snowflake) -> Self {
        Self {
            guild_id,
            user_id,
            nick: None,
            roles: Vec::new(),
            joined_at: None,
            deaf: false,
            mute: false,
        }
    }

    pub fn from_payload(guild_id: Snowflake, payload: MemberPayload) -> Self {
        let mut member = Self::new(guild_id, payload.user.id);
        member.merge(payload);
        member
    }

    /// Apply a partial update. The embedded user is merged separately by the cache.
    pub fn merge(&mut self, payload: MemberPayload) {
        payload.nick.apply(&mut self.nick);
        payload.roles.apply_or_default(&mut self.roles);
        payload.joined_at.apply(&mut self.joined_at);
        payload.deaf.apply_required(&mut self.deaf);
        payload.mute.apply_required(&mut self.mute);
    }

    /// Get display name (nickname if set, otherwise fallback)
    pub fn display_name<'a>(&'a self, username: &'a str) -> &'a str {
        self.nick.as_deref().unwrap_or(username)
    }

    /// Check if member has a specific role
    #[inline]
    pub fn has_role(&self, role_id: Snowflake) -> bool {
        self.roles.contains(&role_id)
    }
}
