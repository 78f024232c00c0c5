//! # hearth-gateway
//!
//! Gateway websocket sessions, dispatch handling, event delivery and sharding.
//!
//! Each shard runs a [`GatewaySession`] that merges dispatches into the
//! shared [`EntityCache`](hearth_cache::EntityCache) and emits one
//! [`DomainEvent`](hearth_core::DomainEvent) per merged dispatch through the
//! [`EventDispatcher`]. The [`ShardManager`] launches and supervises the
//! sessions.

pub mod dispatch;
pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod session;
pub mod shard;
pub mod voice;

pub use dispatch::{DispatchHandler, GatewayEvent};
pub use dispatcher::{EventDispatcher, EventListener};
pub use error::{GatewayError, GatewayResult};
pub use protocol::{
    CloseCode, GatewayMessage, Intents, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    VoiceStateUpdatePayload,
};
pub use session::{GatewaySession, SessionConfig, SessionContext, SessionState};
pub use shard::{IdentifyThrottle, ShardHandle, ShardId, ShardManager};
pub use voice::{frame_pacer, VoiceConnector, VoiceServerInfo, VOICE_FRAME_INTERVAL};
