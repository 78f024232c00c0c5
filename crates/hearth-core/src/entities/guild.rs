//! Guild entity - a server containing members, channels and roles
//!
//! The guild itself only carries its header fields; sub-collections are owned
//! by the cache and keyed by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{Field, Snowflake};

use super::channel::ChannelPayload;
use super::member::MemberPayload;
use super::presence::PresencePayload;
use super::role::RolePayload;
use super::voice_state::VoiceStatePayload;

/// Guild entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: Snowflake,
    pub name: String,
    pub icon: Option<String>,
    pub owner_id: Option<Snowflake>,
    /// Member count reported by the service, independent of how many members are cached
    pub member_count: u64,
    pub large: bool,
    pub joined_at: Option<DateTime<Utc>>,
    /// `false` during an outage; only `id` is meaningful then
    pub available: bool,
}

/// Guild object as received on the wire (GUILD_CREATE, GUILD_UPDATE, REST)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildPayload {
    pub id: Snowflake,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<bool>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub name: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub icon: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub owner_id: Field<Snowflake>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub member_count: Field<u64>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub large: Field<bool>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub joined_at: Field<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<RolePayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub presences: Vec<PresencePayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub voice_states: Vec<VoiceStatePayload>,
}

/// Guild stub sent in READY and on outages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableGuild {
    pub id: Snowflake,
    #[serde(default)]
    pub unavailable: bool,
}

impl Guild {
    /// Placeholder for a guild that is known only by id (outage)
    pub fn unavailable(id: Snowflake) -> Self {
        Self {
            id,
            name: String::new(),
            icon: None,
            owner_id: None,
            member_count: 0,
            large: false,
            joined_at: None,
            available: false,
        }
    }

    /// Build the guild header from a payload; nested collections are ignored
    pub fn from_payload(payload: &GuildPayload) -> Self {
        let mut guild = Self::unavailable(payload.id);
        guild.available = !payload.unavailable.unwrap_or(false);
        guild.merge(payload);
        guild
    }

    /// Apply a partial update to the header fields
    pub fn merge(&mut self, payload: &GuildPayload) {
        payload.name.clone().apply_required(&mut self.name);
        payload.icon.clone().apply(&mut self.icon);
        payload.owner_id.clone().apply(&mut self.owner_id);
        payload.member_count.clone().apply_required(&mut self.member_count);
        payload.large.clone().apply_required(&mut self.large);
        payload.joined_at.clone().apply(&mut self.joined_at);
    }

    #[inline]
    pub fn is_owner(&self, user_id: Snowflake) -> bool {
        self.owner_id == Some(user_id)
    }
}

impl GuildPayload {
    #[inline]
    pub fn is_unavailable(&self) -> bool {
        self.unavailable.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_guild_payload() {
        let payload: GuildPayload = serde_json::from_str(r#"{"id":"123","unavailable":true}"#).unwrap();
        let guild = Guild::from_payload(&payload);

        assert_eq!(guild.id, Snowflake::new(123));
        assert!(!guild.available);
        assert!(payload.roles.is_empty());
    }

    #[test]
    fn test_full_guild_payload() {
        let payload: GuildPayload = serde_json::from_str(
            r#"{"id":"123","name":"Hearth","owner_id":"9","member_count":250,"icon":"abc",
               "roles":[{"id":"123","name":"@everyone","permissions":"1024","position":0}],
               "channels":[{"id":"5","type":0,"name":"general"}],
               "members":[{"user":{"id":"9","username":"owner"},"roles":[]}]}"#,
        )
        .unwrap();
        let guild = Guild::from_payload(&payload);

        assert!(guild.available);
        assert_eq!(guild.name, "Hearth");
        assert_eq!(guild.member_count, 250);
        assert!(guild.is_owner(Snowflake::new(9)));
        assert_eq!(guild.icon.as_deref(), Some("abc"));
        assert_eq!(payload.roles.len(), 1);
        assert_eq!(payload.channels.len(), 1);
        assert_eq!(payload.members.len(), 1);
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut guild = Guild::from_payload(
            &serde_json::from_str(r#"{"id":"1","name":"a","icon":"x","member_count":3}"#).unwrap(),
        );
        guild.merge(&serde_json::from_str(r#"{"id":"1","icon":null}"#).unwrap());

        assert_eq!(guild.name, "a");
        assert_eq!(guild.member_count, 3);
        assert_eq!(guild.icon, None);
    }
}
