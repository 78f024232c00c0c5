//! # hearth-core
//!
//! Domain layer containing the cached entities, their wire payloads, value objects
//! and the typed domain events handed to listeners.
//! This crate has no dependency on networking or runtime crates.

pub mod entities;
pub mod error;
pub mod events;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Activity, ActivityKind, Channel, ChannelKind, ChannelPayload, ChannelType, Embed, Guild,
    GuildMember, GuildPayload, MemberPayload, Message, MessageUpdate, Presence, PresencePayload,
    Role, RolePayload, Status, UnavailableGuild, User, UserPayload, VoiceState,
    VoiceStatePayload,
};
pub use error::DomainError;
pub use events::{DomainEvent, EventKind};
pub use value_objects::{Field, Permissions, Snowflake, SnowflakeParseError};
