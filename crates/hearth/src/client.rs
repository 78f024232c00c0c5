//! Client context
//!
//! One [`Client`] owns the cache, the REST queue, the event dispatcher and,
//! once connected, the shard manager. Every part is reachable from it; there
//! is no global state.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use hearth_cache::{ChunkSummary, EntityCache};
use hearth_common::ClientConfig;
use hearth_core::{DomainEvent, EventKind, Snowflake, User};
use hearth_gateway::{
    EventDispatcher, EventListener, PresenceUpdatePayload, RequestGuildMembersPayload,
    SessionConfig, SessionContext, ShardManager, VoiceConnector, VoiceStateUpdatePayload,
};
use hearth_rest::{HttpTransport, ReqwestTransport, RestClient, RestQueue};

use crate::error::{ClientError, ClientResult};

/// Client context shared by every part of an application
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    cache: EntityCache,
    rest: RestClient,
    events: EventDispatcher,
    voice: Option<Arc<dyn VoiceConnector>>,
    shards: Arc<Mutex<Option<Arc<ShardManager>>>>,
    delivery: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Client {
    /// Client talking HTTP through `reqwest`
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(&config.rest)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Client with a custom HTTP transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let cache = EntityCache::new();
        let queue = RestQueue::with_cache(&config.rest, &config.token, transport, cache.clone());
        Self {
            config: Arc::new(config),
            cache,
            rest: RestClient::new(queue),
            events: EventDispatcher::new(),
            voice: None,
            shards: Arc::new(Mutex::new(None)),
            delivery: Arc::new(Mutex::new(None)),
        }
    }

    /// Hand voice server details to `connector` when the local user joins voice
    #[must_use]
    pub fn with_voice_connector(mut self, connector: Arc<dyn VoiceConnector>) -> Self {
        self.voice = Some(connector);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Register a listener for every event
    pub fn register(&self, listener: Arc<dyn EventListener>) {
        self.events.register(listener);
    }

    /// Register a closure for one event type
    pub fn on<F>(&self, kind: EventKind, f: F)
    where
        F: Fn(&DomainEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.events.on(kind, f);
    }

    /// Check the token against `GET /users/@me` and cache the current user
    pub async fn login(&self) -> ClientResult<User> {
        let user = self.rest.current_user().await?;
        tracing::info!(user_id = %user.id, username = %user.username, "Logged in");
        Ok(user)
    }

    /// Start event delivery and launch every shard
    pub async fn connect(&self) -> ClientResult<Arc<ShardManager>> {
        if self.shards.lock().is_some() {
            return Err(ClientError::AlreadyConnected);
        }
        let (url, shard_count) = self.resolve_gateway().await?;

        let gateway = &self.config.gateway;
        let session = SessionConfig::from_config(gateway, self.config.token.clone(), url);
        let mut ctx = SessionContext::new(self.cache.clone(), self.events.clone(), gateway.identify_spacing);
        if let Some(voice) = &self.voice {
            ctx = ctx.with_voice_connector(voice.clone());
        }
        let manager = Arc::new(ShardManager::new(gateway, session, shard_count, ctx));

        {
            let mut shards = self.shards.lock();
            if shards.is_some() {
                return Err(ClientError::AlreadyConnected);
            }
            *shards = Some(manager.clone());
        }
        if let Some(delivery) = self.events.start() {
            *self.delivery.lock() = Some(delivery);
        }
        manager.start();
        Ok(manager)
    }

    /// Gateway URL and shard count, from configuration or `GET /gateway/bot`
    async fn resolve_gateway(&self) -> ClientResult<(String, u32)> {
        let gateway = &self.config.gateway;
        if let (Some(url), Some(count)) = (&gateway.url, gateway.shard_count) {
            return Ok((url.clone(), count));
        }

        let info = self.rest.gateway_bot().await?;
        let limit = info.session_start_limit;
        if limit.remaining == 0 {
            tracing::warn!(reset_after_ms = limit.reset_after, "Session start limit exhausted");
        }
        tracing::debug!(url = %info.url, shards = info.shards, remaining = limit.remaining, "Gateway resolved");
        Ok((
            gateway.url.clone().unwrap_or(info.url),
            gateway.shard_count.unwrap_or(info.shards),
        ))
    }

    pub fn shards(&self) -> Option<Arc<ShardManager>> {
        self.shards.lock().clone()
    }

    fn connected(&self) -> ClientResult<Arc<ShardManager>> {
        self.shards().ok_or(ClientError::NotConnected)
    }

    /// Wait until every shard finished its initial guild burst
    pub async fn wait_ready(&self) -> ClientResult<()> {
        self.connected()?.wait_ready().await?;
        Ok(())
    }

    /// Load members of a guild into the cache
    pub fn request_guild_members(
        &self,
        payload: RequestGuildMembersPayload,
    ) -> ClientResult<oneshot::Receiver<ChunkSummary>> {
        Ok(self.connected()?.request_guild_members(payload)?)
    }

    /// Join a voice channel, or leave voice with `channel_id: None`
    pub fn update_voice_state(&self, payload: VoiceStateUpdatePayload) -> ClientResult<()> {
        self.connected()?
            .shard_for(payload.guild_id)
            .update_voice_state(payload)?;
        Ok(())
    }

    /// Set the local user's presence on every shard
    pub fn update_presence(&self, payload: &PresenceUpdatePayload) -> ClientResult<()> {
        for shard in self.connected()?.handles() {
            shard.update_presence(payload.clone())?;
        }
        Ok(())
    }

    /// Leave voice in `guild_id`
    pub fn leave_voice(&self, guild_id: Snowflake) -> ClientResult<()> {
        self.update_voice_state(VoiceStateUpdatePayload::leave(guild_id))
    }

    /// Close every shard, then deliver the events already queued
    pub async fn shutdown(&self) {
        let manager = self.shards.lock().take();
        if let Some(manager) = manager {
            manager.shutdown().await;
        }
        self.events.shutdown();
        let delivery = self.delivery.lock().take();
        if let Some(delivery) = delivery {
            if let Err(err) = delivery.await {
                tracing::error!(error = %err, "Event delivery task panicked");
            }
        }
        tracing::info!("Client shut down");
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("app", &self.config.app.name)
            .field("rest", &self.rest)
            .field("events", &self.events)
            .field("connected", &self.shards.lock().is_some())
            .finish()
    }
}
