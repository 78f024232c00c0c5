//! Presence entity - a user's online status and current activity

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::{Field, Snowflake};

use super::user::UserPayload;

/// User online status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Online,
    Idle,
    Dnd,
    Invisible,
    #[default]
    Offline,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Online => "online",
            Status::Idle => "idle",
            Status::Dnd => "dnd",
            Status::Invisible => "invisible",
            Status::Offline => "offline",
        }
    }

    /// Invisible users appear offline to everyone else
    #[inline]
    pub fn is_visible(&self) -> bool {
        !matches!(self, Status::Invisible | Status::Offline)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ActivityKind {
    #[default]
    Playing,
    Streaming,
    Listening,
    Watching,
    Custom,
    Competing,
}

impl From<u8> for ActivityKind {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::Streaming,
            2 => Self::Listening,
            3 => Self::Watching,
            4 => Self::Custom,
            5 => Self::Competing,
            _ => Self::Playing,
        }
    }
}

impl From<ActivityKind> for u8 {
    fn from(kind: ActivityKind) -> Self {
        kind as u8
    }
}

/// Current activity descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ActivityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Activity {
    pub fn playing(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActivityKind::Playing,
            url: None,
        }
    }

    pub fn streaming(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActivityKind::Streaming,
            url: Some(url.into()),
        }
    }
}

/// Presence entity, one per (guild, user)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub user_id: Snowflake,
    pub guild_id: Option<Snowflake>,
    pub status: Status,
    pub activity: Option<Activity>,
}

/// PRESENCE_UPDATE payload
///
/// The user object is partial; when it carries more than an id the cache merges it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user: UserPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub status: Field<Status>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub activities: Field<Vec<Activity>>,
}

impl Presence {
    pub fn new(user_id: Snowflake, guild_id: Option<Snowflake>) -> Self {
        Self {
            user_id,
            guild_id,
            status: Status::Offline,
            activity: None,
        }
    }

    pub fn from_payload(guild_id: Option<Snowflake>, payload: &PresencePayload) -> Self {
        let mut presence = Self::new(payload.user.id, guild_id.or(payload.guild_id));
        presence.merge(payload);
        presence
    }

    /// Apply a partial update
    pub fn merge(&mut self, payload: &PresencePayload) {
        payload.status.clone().apply_or_default(&mut self.status);
        // Only the first activity is mirrored; an empty list clears it
        match &payload.activities {
            Field::Missing => {}
            Field::Null => self.activity = None,
            Field::Set(activities) => self.activity = activities.first().cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> PresencePayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_presence_from_payload() {
        let presence = Presence::from_payload(
            None,
            &payload(r#"{"user":{"id":"3"},"guild_id":"1","status":"dnd","activities":[{"name":"chess","type":0}]}"#),
        );

        assert_eq!(presence.guild_id, Some(Snowflake::new(1)));
        assert_eq!(presence.status, Status::Dnd);
        assert_eq!(presence.activity, Some(Activity::playing("chess")));
    }

    #[test]
    fn test_empty_activities_clears_activity() {
        let mut presence = Presence::from_payload(
            None,
            &payload(r#"{"user":{"id":"3"},"status":"online","activities":[{"name":"chess"}]}"#),
        );

        presence.merge(&payload(r#"{"user":{"id":"3"},"status":"idle"}"#));
        assert_eq!(presence.status, Status::Idle);
        assert!(presence.activity.is_some());

        presence.merge(&payload(r#"{"user":{"id":"3"},"activities":[]}"#));
        assert_eq!(presence.activity, None);
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&Status::Dnd).unwrap(), "\"dnd\"");
        let status: Status = serde_json::from_str("\"invisible\"").unwrap();
        assert!(!status.is_visible());
    }

    #[test]
    fn test_streaming_activity() {
        let activity = Activity::streaming("live", "https://twitch.tv/x");
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["type"], 1);
        assert_eq!(json["url"], "https://twitch.tv/x");
    }
}
