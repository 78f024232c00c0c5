//! Dispatch decoding and application

mod event;
mod handler;

pub use event::{
    GatewayEvent, MemberRemove, MessageDelete, MessageDeleteBulk, RoleChange, RoleDelete,
    TypingStart, VoiceServerUpdate,
};
pub use handler::DispatchHandler;
