//! Queued requests and the cache merge applied to their responses

use serde::{Deserialize, Serialize};

use hearth_cache::EntityCache;
use hearth_core::{
    ChannelPayload, Field, GuildPayload, MemberPayload, RolePayload, Snowflake, UserPayload,
};

use crate::error::RestResult;
use crate::routing::Route;

/// How a successful response re-enters the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMerge {
    /// Nothing to merge
    #[default]
    None,
    CurrentUser,
    User,
    /// Guild header and roles
    Guild,
    Member {
        guild_id: Snowflake,
    },
    Members {
        guild_id: Snowflake,
    },
    /// `{ "nick": ... }` for the current user's membership
    CurrentMemberNick {
        guild_id: Snowflake,
    },
    Channel {
        guild_id: Option<Snowflake>,
    },
    Role {
        guild_id: Snowflake,
    },
    /// Messages are not cached; their author and the channel's last message are
    Message,
    Messages,
}

/// One call waiting in a bucket
#[derive(Debug, Clone)]
pub struct RestRequest {
    pub route: Route,
    pub body: Option<Vec<u8>>,
    pub auth: bool,
    /// Audit log reason
    pub reason: Option<String>,
    pub merge: ResponseMerge,
}

impl RestRequest {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            body: None,
            auth: true,
            reason: None,
            merge: ResponseMerge::None,
        }
    }

    /// Attach a JSON body
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> RestResult<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Send without the authorization header
    #[must_use]
    pub fn unauthenticated(mut self) -> Self {
        self.auth = false;
        self
    }

    #[must_use]
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn merge(mut self, merge: ResponseMerge) -> Self {
        self.merge = merge;
        self
    }
}

#[derive(Deserialize)]
struct NickBody {
    #[serde(default)]
    nick: Field<String>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: Snowflake,
    channel_id: Snowflake,
    author: UserPayload,
}

impl ResponseMerge {
    /// Merge a response body into the cache
    pub(crate) fn apply(self, cache: &EntityCache, body: &[u8]) -> Result<(), serde_json::Error> {
        match self {
            Self::None => {}
            Self::CurrentUser => {
                cache.set_current_user(serde_json::from_slice::<UserPayload>(body)?);
            }
            Self::User => {
                cache.merge_user(serde_json::from_slice::<UserPayload>(body)?);
            }
            Self::Guild => {
                let payload: GuildPayload = serde_json::from_slice(body)?;
                if cache.merge_guild(&payload).is_some() {
                    for role in payload.roles {
                        cache.merge_role(payload.id, role);
                    }
                }
            }
            Self::Member { guild_id } => {
                cache.merge_member(guild_id, serde_json::from_slice::<MemberPayload>(body)?);
            }
            Self::Members { guild_id } => {
                for member in serde_json::from_slice::<Vec<MemberPayload>>(body)? {
                    cache.merge_member(guild_id, member);
                }
            }
            Self::CurrentMemberNick { guild_id } => {
                let NickBody { nick } = serde_json::from_slice(body)?;
                if let Some(me) = cache.current_user() {
                    let payload = MemberPayload {
                        user: UserPayload::new(me.id),
                        nick,
                        ..MemberPayload::default()
                    };
                    cache.merge_member(guild_id, payload);
                }
            }
            Self::Channel { guild_id } => {
                cache.merge_channel(guild_id, serde_json::from_slice::<ChannelPayload>(body)?);
            }
            Self::Role { guild_id } => {
                cache.merge_role(guild_id, serde_json::from_slice::<RolePayload>(body)?);
            }
            Self::Message => {
                let message: MessageRef = serde_json::from_slice(body)?;
                cache.merge_user(message.author);
                cache.record_message(message.channel_id, message.id);
            }
            Self::Messages => {
                for message in serde_json::from_slice::<Vec<MessageRef>>(body)? {
                    cache.merge_user(message.author);
                }
            }
        }
        Ok(())
    }
}
