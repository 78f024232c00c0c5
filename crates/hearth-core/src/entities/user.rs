//! User entity - one per account, shared by every guild membership

use serde::{Deserialize, Serialize};

use crate::value_objects::{Field, Snowflake};

/// User entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    pub discriminator: String,
    pub avatar: Option<String>,
    pub bot: bool,
}

/// User object as received on the wire
///
/// Presence updates only guarantee `id`; every other key may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: Snowflake,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub username: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub discriminator: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub avatar: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_missing")]
    pub bot: Field<bool>,
}

impl User {
    /// Create a placeholder user known only by id
    pub fn new(id: Snowflake) -> Self {
        Self {
            id,
            username: String::new(),
            discriminator: "0".to_string(),
            avatar: None,
            bot: false,
        }
    }

    /// Build a user from a payload, filling absent fields with defaults
    pub fn from_payload(payload: UserPayload) -> Self {
        let mut user = Self::new(payload.id);
        user.merge(payload);
        user
    }

    /// Apply a partial update
    pub fn merge(&mut self, payload: UserPayload) {
        payload.username.apply_required(&mut self.username);
        payload.discriminator.apply_required(&mut self.discriminator);
        payload.avatar.apply(&mut self.avatar);
        payload.bot.apply_required(&mut self.bot);
    }

    /// `username#discriminator`, or the bare username for migrated accounts
    pub fn tag(&self) -> String {
        if self.discriminator == "0" {
            self.username.clone()
        } else {
            format!("{}#{}", self.username, self.discriminator)
        }
    }

    /// Mention string for message content
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

impl UserPayload {
    pub fn new(id: Snowflake) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

impl From<&User> for UserPayload {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: Field::Set(user.username.clone()),
            discriminator: Field::Set(user.discriminator.clone()),
            avatar: user.avatar.clone().into(),
            bot: Field::Set(user.bot),
        }
    }
}
