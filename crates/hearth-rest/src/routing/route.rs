//! REST routes
//!
//! A route knows its HTTP method, its concrete path and the rate-limit bucket
//! it belongs to. Buckets are keyed by method plus the path template, with
//! the major parameters (guild id, channel id) left in and every other id
//! replaced by a placeholder.

use std::fmt;

use hearth_core::Snowflake;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a rate-limit bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey(String);

impl BucketKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Every REST endpoint the client calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    GetGatewayBot,
    GetCurrentUser,
    ModifyCurrentUser,
    GetGuild {
        guild_id: Snowflake,
    },
    ModifyGuild {
        guild_id: Snowflake,
    },
    GetMember {
        guild_id: Snowflake,
        user_id: Snowflake,
    },
    ListMembers {
        guild_id: Snowflake,
        limit: u16,
        after: Option<Snowflake>,
    },
    ModifyMember {
        guild_id: Snowflake,
        user_id: Snowflake,
    },
    ModifyCurrentMember {
        guild_id: Snowflake,
    },
    RemoveMember {
        guild_id: Snowflake,
        user_id: Snowflake,
    },
    CreateChannel {
        guild_id: Snowflake,
    },
    GetChannel {
        channel_id: Snowflake,
    },
    ModifyChannel {
        channel_id: Snowflake,
    },
    CreateRole {
        guild_id: Snowflake,
    },
    CreateMessage {
        channel_id: Snowflake,
    },
    GetMessage {
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    EditMessage {
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    DeleteMessage {
        channel_id: Snowflake,
        message_id: Snowflake,
    },
    BulkDeleteMessages {
        channel_id: Snowflake,
    },
    GetPins {
        channel_id: Snowflake,
    },
}

impl Route {
    pub fn method(&self) -> Method {
        match self {
            Self::GetGatewayBot
            | Self::GetCurrentUser
            | Self::GetGuild { .. }
            | Self::GetMember { .. }
            | Self::ListMembers { .. }
            | Self::GetChannel { .. }
            | Self::GetMessage { .. }
            | Self::GetPins { .. } => Method::Get,
            Self::CreateChannel { .. }
            | Self::CreateRole { .. }
            | Self::CreateMessage { .. }
            | Self::BulkDeleteMessages { .. } => Method::Post,
            Self::ModifyCurrentUser
            | Self::ModifyGuild { .. }
            | Self::ModifyMember { .. }
            | Self::ModifyCurrentMember { .. }
            | Self::ModifyChannel { .. }
            | Self::EditMessage { .. } => Method::Patch,
            Self::RemoveMember { .. } | Self::DeleteMessage { .. } => Method::Delete,
        }
    }

    /// Concrete path, relative to the API base, including any query string
    pub fn path(&self) -> String {
        match self {
            Self::GetGatewayBot => "/gateway/bot".to_string(),
            Self::GetCurrentUser | Self::ModifyCurrentUser => "/users/@me".to_string(),
            Self::GetGuild { guild_id } | Self::ModifyGuild { guild_id } => {
                format!("/guilds/{guild_id}")
            }
            Self::GetMember { guild_id, user_id }
            | Self::ModifyMember { guild_id, user_id }
            | Self::RemoveMember { guild_id, user_id } => {
                format!("/guilds/{guild_id}/members/{user_id}")
            }
            Self::ListMembers {
                guild_id,
                limit,
                after,
            } => match after {
                Some(after) => format!("/guilds/{guild_id}/members?limit={limit}&after={after}"),
                None => format!("/guilds/{guild_id}/members?limit={limit}"),
            },
            Self::ModifyCurrentMember { guild_id } => format!("/guilds/{guild_id}/members/@me"),
            Self::CreateChannel { guild_id } => format!("/guilds/{guild_id}/channels"),
            Self::GetChannel { channel_id } | Self::ModifyChannel { channel_id } => {
                format!("/channels/{channel_id}")
            }
            Self::CreateRole { guild_id } => format!("/guilds/{guild_id}/roles"),
            Self::CreateMessage { channel_id } => format!("/channels/{channel_id}/messages"),
            Self::GetMessage {
                channel_id,
                message_id,
            }
            | Self::EditMessage {
                channel_id,
                message_id,
            }
            | Self::DeleteMessage {
                channel_id,
                message_id,
            } => format!("/channels/{channel_id}/messages/{message_id}"),
            Self::BulkDeleteMessages { channel_id } => {
                format!("/channels/{channel_id}/messages/bulk-delete")
            }
            Self::GetPins { channel_id } => format!("/channels/{channel_id}/pins"),
        }
    }

    /// Rate-limit bucket this route is serialized on
    pub fn bucket_key(&self) -> BucketKey {
        let template = match self {
            Self::GetGatewayBot => "/gateway/bot".to_string(),
            Self::GetCurrentUser | Self::ModifyCurrentUser => "/users/@me".to_string(),
            Self::GetGuild { guild_id } | Self::ModifyGuild { guild_id } => {
                format!("/guilds/{guild_id}")
            }
            Self::GetMember { guild_id, .. }
            | Self::ModifyMember { guild_id, .. }
            | Self::RemoveMember { guild_id, .. } => format!("/guilds/{guild_id}/members/:id"),
            Self::ListMembers { guild_id, .. } => format!("/guilds/{guild_id}/members"),
            Self::ModifyCurrentMember { guild_id } => format!("/guilds/{guild_id}/members/@me"),
            Self::CreateChannel { guild_id } => format!("/guilds/{guild_id}/channels"),
            Self::GetChannel { channel_id } | Self::ModifyChannel { channel_id } => {
                format!("/channels/{channel_id}")
            }
            Self::CreateRole { guild_id } => format!("/guilds/{guild_id}/roles"),
            Self::CreateMessage { channel_id } => format!("/channels/{channel_id}/messages"),
            Self::GetMessage { channel_id, .. }
            | Self::EditMessage { channel_id, .. }
            | Self::DeleteMessage { channel_id, .. } => {
                format!("/channels/{channel_id}/messages/:id")
            }
            Self::BulkDeleteMessages { channel_id } => {
                format!("/channels/{channel_id}/messages/bulk-delete")
            }
            Self::GetPins { channel_id } => format!("/channels/{channel_id}/pins"),
        };
        BucketKey(format!("{} {template}", self.method()))
    }
}
