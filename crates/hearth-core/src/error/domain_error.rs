//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::Snowflake;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Lookup Errors
    // =========================================================================
    #[error("User not found: {0}")]
    UserNotFound(Snowflake),

    #[error("Guild not found: {0}")]
    GuildNotFound(Snowflake),

    #[error("Guild unavailable: {0}")]
    GuildUnavailable(Snowflake),

    #[error("Channel not found: {0}")]
    ChannelNotFound(Snowflake),

    #[error("Role not found: {0}")]
    RoleNotFound(Snowflake),

    #[error("Member {user_id} not found in guild {guild_id}")]
    MemberNotFound {
        guild_id: Snowflake,
        user_id: Snowflake,
    },

    // =========================================================================
    // Payload Errors
    // =========================================================================
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unknown channel type: {0}")]
    UnknownChannelType(u8),

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

impl DomainError {
    /// Check if this is a lookup error
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_)
                | Self::GuildNotFound(_)
                | Self::ChannelNotFound(_)
                | Self::RoleNotFound(_)
                | Self::MemberNotFound { .. }
        )
    }
}
