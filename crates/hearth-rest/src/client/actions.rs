//! RestClient and its actions

use serde::{Deserialize, Serialize};
use validator::Validate;

use hearth_cache::EntityCache;
use hearth_core::{
    Channel, ChannelPayload, Guild, GuildMember, GuildPayload, MemberPayload, Message, Role,
    RolePayload, Snowflake, User, UserPayload,
};

use super::bodies::{
    CreateChannel, CreateMessage, CreateRole, EditMessage, ModifyChannel, ModifyCurrentUser,
    ModifyGuild, ModifyMember,
};
use crate::error::{RestError, RestResult};
use crate::queue::{ResponseMerge, RestQueue, RestRequest, RestResponse};
use crate::routing::Route;

/// Largest page `list_members` may request
pub const MAX_MEMBER_PAGE: u16 = 1000;

/// Bulk delete accepts between 2 and 100 messages
const BULK_DELETE_RANGE: std::ops::RangeInclusive<usize> = 2..=100;

/// `GET /gateway/bot`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GatewayBotInfo {
    pub url: String,
    /// Recommended shard count
    pub shards: u32,
    pub session_start_limit: SessionStartLimit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    /// Milliseconds until `remaining` resets
    pub reset_after: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,
}

fn default_max_concurrency() -> u32 {
    1
}

#[derive(Serialize)]
struct NickBody<'a> {
    nick: Option<&'a str>,
}

#[derive(Deserialize)]
struct NickResponse {
    #[serde(default)]
    nick: Option<String>,
}

#[derive(Serialize)]
struct BulkDeleteBody<'a> {
    messages: &'a [Snowflake],
}

/// Typed REST actions on top of a [`RestQueue`]
#[derive(Debug, Clone)]
pub struct RestClient {
    queue: RestQueue,
}

impl RestClient {
    pub fn new(queue: RestQueue) -> Self {
        Self { queue }
    }

    pub fn queue(&self) -> &RestQueue {
        &self.queue
    }

    pub fn cache(&self) -> Option<&EntityCache> {
        self.queue.cache()
    }

    async fn send(&self, request: RestRequest) -> RestResult<RestResponse> {
        self.queue.enqueue(request).await
    }

    // =========================================================================
    // Gateway & users
    // =========================================================================

    pub async fn gateway_bot(&self) -> RestResult<GatewayBotInfo> {
        self.send(RestRequest::new(Route::GetGatewayBot))
            .await?
            .json()
    }

    pub async fn current_user(&self) -> RestResult<User> {
        let request = RestRequest::new(Route::GetCurrentUser).merge(ResponseMerge::CurrentUser);
        let payload: UserPayload = self.send(request).await?.json()?;
        Ok(User::from_payload(payload))
    }

    pub async fn modify_current_user(&self, body: &ModifyCurrentUser) -> RestResult<User> {
        body.validate()?;
        let request = RestRequest::new(Route::ModifyCurrentUser)
            .json(body)?
            .merge(ResponseMerge::CurrentUser);
        let payload: UserPayload = self.send(request).await?.json()?;
        Ok(User::from_payload(payload))
    }

    // =========================================================================
    // Guilds & members
    // =========================================================================

    pub async fn guild(&self, guild_id: Snowflake) -> RestResult<Guild> {
        let request = RestRequest::new(Route::GetGuild { guild_id }).merge(ResponseMerge::Guild);
        let payload: GuildPayload = self.send(request).await?.json()?;
        Ok(Guild::from_payload(&payload))
    }

    pub async fn modify_guild(&self, guild_id: Snowflake, body: &ModifyGuild) -> RestResult<Guild> {
        body.validate()?;
        let request = RestRequest::new(Route::ModifyGuild { guild_id })
            .json(body)?
            .merge(ResponseMerge::Guild);
        let payload: GuildPayload = self.send(request).await?.json()?;
        Ok(Guild::from_payload(&payload))
    }

    pub async fn member(&self, guild_id: Snowflake, user_id: Snowflake) -> RestResult<GuildMember> {
        let request = RestRequest::new(Route::GetMember { guild_id, user_id })
            .merge(ResponseMerge::Member { guild_id });
        let payload: MemberPayload = self.send(request).await?.json()?;
        Ok(GuildMember::from_payload(guild_id, payload))
    }

    /// One page of members ordered by user id; `limit` is clamped to 1..=1000
    pub async fn members(
        &self,
        guild_id: Snowflake,
        limit: u16,
        after: Option<Snowflake>,
    ) -> RestResult<Vec<GuildMember>> {
        let route = Route::ListMembers {
            guild_id,
            limit: limit.clamp(1, MAX_MEMBER_PAGE),
            after,
        };
        let request = RestRequest::new(route).merge(ResponseMerge::Members { guild_id });
        let payloads: Vec<MemberPayload> = self.send(request).await?.json()?;
        Ok(payloads
            .into_iter()
            .map(|payload| GuildMember::from_payload(guild_id, payload))
            .collect())
    }

    pub async fn modify_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        body: &ModifyMember,
    ) -> RestResult<GuildMember> {
        let request = RestRequest::new(Route::ModifyMember { guild_id, user_id })
            .json(body)?
            .merge(ResponseMerge::Member { guild_id });
        let payload: MemberPayload = self.send(request).await?.json()?;
        Ok(GuildMember::from_payload(guild_id, payload))
    }

    /// Set or clear the current user's nickname; returns the new nickname
    pub async fn modify_current_nick(
        &self,
        guild_id: Snowflake,
        nick: Option<&str>,
    ) -> RestResult<Option<String>> {
        let request = RestRequest::new(Route::ModifyCurrentMember { guild_id })
            .json(&NickBody { nick })?
            .merge(ResponseMerge::CurrentMemberNick { guild_id });
        let response: NickResponse = self.send(request).await?.json()?;
        Ok(response.nick)
    }

    pub async fn kick_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        reason: Option<&str>,
    ) -> RestResult<()> {
        let mut request = RestRequest::new(Route::RemoveMember { guild_id, user_id });
        if let Some(reason) = reason {
            request = request.reason(reason);
        }
        self.send(request).await?;
        Ok(())
    }

    pub async fn create_role(&self, guild_id: Snowflake, body: &CreateRole) -> RestResult<Role> {
        body.validate()?;
        let request = RestRequest::new(Route::CreateRole { guild_id })
            .json(body)?
            .merge(ResponseMerge::Role { guild_id });
        let payload: RolePayload = self.send(request).await?.json()?;
        Ok(Role::from_payload(guild_id, payload))
    }

    // =========================================================================
    // Channels
    // =========================================================================

    pub async fn create_channel(
        &self,
        guild_id: Snowflake,
        body: &CreateChannel,
    ) -> RestResult<Channel> {
        body.validate()?;
        let request = RestRequest::new(Route::CreateChannel { guild_id })
            .json(body)?
            .merge(ResponseMerge::Channel {
                guild_id: Some(guild_id),
            });
        let payload: ChannelPayload = self.send(request).await?.json()?;
        Ok(Channel::from_payload(Some(guild_id), payload)?)
    }

    pub async fn channel(&self, channel_id: Snowflake) -> RestResult<Channel> {
        let request = RestRequest::new(Route::GetChannel { channel_id })
            .merge(ResponseMerge::Channel { guild_id: None });
        let payload: ChannelPayload = self.send(request).await?.json()?;
        Ok(Channel::from_payload(None, payload)?)
    }

    pub async fn modify_channel(
        &self,
        channel_id: Snowflake,
        body: &ModifyChannel,
    ) -> RestResult<Channel> {
        body.validate()?;
        let request = RestRequest::new(Route::ModifyChannel { channel_id })
            .json(body)?
            .merge(ResponseMerge::Channel { guild_id: None });
        let payload: ChannelPayload = self.send(request).await?.json()?;
        Ok(Channel::from_payload(None, payload)?)
    }

    // =========================================================================
    // Messages
    // =========================================================================

    pub async fn create_message(
        &self,
        channel_id: Snowflake,
        body: &CreateMessage,
    ) -> RestResult<Message> {
        body.validate()?;
        let request = RestRequest::new(Route::CreateMessage { channel_id })
            .json(body)?
            .merge(ResponseMerge::Message);
        self.send(request).await?.json()
    }

    pub async fn edit_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        body: &EditMessage,
    ) -> RestResult<Message> {
        let request = RestRequest::new(Route::EditMessage {
            channel_id,
            message_id,
        })
        .json(body)?
        .merge(ResponseMerge::Message);
        self.send(request).await?.json()
    }

    pub async fn message(&self, channel_id: Snowflake, message_id: Snowflake) -> RestResult<Message> {
        let request = RestRequest::new(Route::GetMessage {
            channel_id,
            message_id,
        })
        .merge(ResponseMerge::Message);
        self.send(request).await?.json()
    }

    pub async fn delete_message(&self, channel_id: Snowflake, message_id: Snowflake) -> RestResult<()> {
        self.send(RestRequest::new(Route::DeleteMessage {
            channel_id,
            message_id,
        }))
        .await?;
        Ok(())
    }

    pub async fn bulk_delete(&self, channel_id: Snowflake, message_ids: &[Snowflake]) -> RestResult<()> {
        if !BULK_DELETE_RANGE.contains(&message_ids.len()) {
            return Err(RestError::InvalidRequest("bulk delete takes 2 to 100 messages"));
        }
        let request = RestRequest::new(Route::BulkDeleteMessages { channel_id }).json(&BulkDeleteBody {
            messages: message_ids,
        })?;
        self.send(request).await?;
        Ok(())
    }

    pub async fn pinned_messages(&self, channel_id: Snowflake) -> RestResult<Vec<Message>> {
        let request = RestRequest::new(Route::GetPins { channel_id }).merge(ResponseMerge::Messages);
        self.send(request).await?.json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{HttpRequest, HttpTransport};
    use async_trait::async_trait;
    use hearth_common::{RestConfig, Token};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    #[derive(Default)]
    struct Canned {
        responses: Mutex<VecDeque<RestResponse>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpTransport for Canned {
        async fn execute(&self, request: HttpRequest) -> RestResult<RestResponse> {
            self.requests.lock().push(request);
            Ok(self
                .responses
                .lock()
                .pop_front()
                .unwrap_or_else(|| RestResponse::new(204, "")))
        }
    }

    fn client(responses: Vec<RestResponse>, cache: EntityCache) -> (RestClient, Arc<Canned>) {
        let transport = Arc::new(Canned {
            responses: Mutex::new(responses.into()),
            requests: Mutex::default(),
        });
        let queue = RestQueue::with_cache(
            &RestConfig::default(),
            &Token::parse("MTIz.abc.def").unwrap(),
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            cache,
        );
        (RestClient::new(queue), transport)
    }

    fn sf(id: u64) -> Snowflake {
        Snowflake::new(id)
    }

    #[tokio::test]
    async fn test_gateway_bot_decodes() {
        let (client, _) = client(
            vec![RestResponse::new(
                200,
                r#"{"url":"wss://gateway.test","shards":3,
                   "session_start_limit":{"total":1000,"remaining":999,"reset_after":14400000}}"#,
            )],
            EntityCache::new(),
        );
        let info = client.gateway_bot().await.unwrap();
        assert_eq!(info.shards, 3);
        assert_eq!(info.session_start_limit.max_concurrency, 1);
    }

    #[tokio::test]
    async fn test_modify_member_merges_into_cache() {
        let cache = EntityCache::new();
        cache.guild_create(serde_json::from_str(r#"{"id":"1","name":"g"}"#).unwrap());
        let (client, transport) = client(
            vec![RestResponse::new(
                200,
                r#"{"user":{"id":"5","username":"pal"},"nick":"buddy","roles":[]}"#,
            )],
            cache.clone(),
        );

        let body = ModifyMember {
            nick: hearth_core::Field::Set("buddy".into()),
            ..ModifyMember::default()
        };
        let member = client.modify_member(sf(1), sf(5), &body).await.unwrap();

        assert_eq!(member.nick.as_deref(), Some("buddy"));
        assert_eq!(cache.member(sf(1), sf(5)).unwrap().nick.as_deref(), Some("buddy"));
        assert_eq!(cache.user(sf(5)).unwrap().username, "pal");

        let sent = transport.requests.lock();
        assert_eq!(sent[0].body.as_deref(), Some(br#"{"nick":"buddy"}"#.as_slice()));
    }

    #[tokio::test]
    async fn test_invalid_requests_never_reach_transport() {
        let (client, transport) = client(vec![], EntityCache::new());

        assert!(matches!(
            client.bulk_delete(sf(1), &[sf(2)]).await,
            Err(RestError::InvalidRequest(_))
        ));
        assert!(matches!(
            client.create_message(sf(1), &CreateMessage::default()).await,
            Err(RestError::Validation(_))
        ));
        assert!(matches!(
            client.create_channel(sf(1), &CreateChannel::text("")).await,
            Err(RestError::Validation(_))
        ));
        assert!(transport.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_kick_sends_reason() {
        let (client, transport) = client(vec![], EntityCache::new());
        client.kick_member(sf(1), sf(2), Some("raid")).await.unwrap();

        let sent = transport.requests.lock();
        assert_eq!(sent[0].method, crate::routing::Method::Delete);
        assert_eq!(sent[0].headers["x-audit-log-reason"], "raid");
    }
}
