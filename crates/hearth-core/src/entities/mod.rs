//! Domain entities - the objects mirrored by the cache
//!
//! Every entity comes with a wire payload type. Payload fields use [`Field`](crate::Field)
//! so one type serves both full objects and partial updates.

mod channel;
mod guild;
mod member;
mod message;
mod presence;
mod role;
mod user;
mod voice_state;

pub use channel::{Channel, ChannelKind, ChannelPayload, ChannelType};
pub use guild::{Guild, GuildPayload, UnavailableGuild};
pub use member::{GuildMember, MemberPayload};
pub use message::{Embed, Message, MessageUpdate};
pub use presence::{Activity, ActivityKind, Presence, PresencePayload, Status};
pub use role::{Role, RolePayload};
pub use user::{User, UserPayload};
pub use voice_state::{VoiceState, VoiceStatePayload};
