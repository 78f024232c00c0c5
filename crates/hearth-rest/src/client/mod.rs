//! Typed REST actions
//!
//! Each action builds a [`RestRequest`](crate::RestRequest), queues it on its
//! bucket and decodes the response. Entity-carrying responses are merged into
//! the cache by the queue before the action returns.

mod actions;
mod bodies;

pub use actions::{GatewayBotInfo, RestClient, SessionStartLimit};
pub use bodies::{
    CreateChannel, CreateMessage, CreateRole, EditMessage, ModifyChannel, ModifyCurrentUser,
    ModifyGuild, ModifyMember,
};
