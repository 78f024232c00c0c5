//! Outside view of a running shard

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::{mpsc, oneshot, watch};

use hearth_cache::{ChunkSummary, EntityCache};
use hearth_core::Presence;

use super::ShardId;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{
    GatewayMessage, PresenceUpdatePayload, RequestGuildMembersPayload, VoiceStateUpdatePayload,
};
use crate::session::SessionState;

/// Cloneable handle for observing and commanding one shard.
///
/// Commands sent before the session is established are queued and flushed
/// once it is.
#[derive(Debug, Clone)]
pub struct ShardHandle {
    id: ShardId,
    commands: mpsc::UnboundedSender<GatewayMessage>,
    state: watch::Receiver<SessionState>,
    ready: watch::Receiver<bool>,
    cache: EntityCache,
}

impl ShardHandle {
    pub(crate) fn new(
        id: ShardId,
        commands: mpsc::UnboundedSender<GatewayMessage>,
        state: watch::Receiver<SessionState>,
        ready: watch::Receiver<bool>,
        cache: EntityCache,
    ) -> Self {
        Self {
            id,
            commands,
            state,
            ready,
            cache,
        }
    }

    pub fn id(&self) -> ShardId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// The initial guild burst has finished
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Wait until the initial guild burst has finished
    pub async fn wait_ready(&self) -> GatewayResult<()> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| GatewayError::ShardNotRunning(self.id.index()))
    }

    /// Queue a raw command frame
    pub fn send(&self, message: GatewayMessage) -> GatewayResult<()> {
        self.commands
            .send(message)
            .map_err(|_| GatewayError::ShardNotRunning(self.id.index()))
    }

    /// Request members of a guild (op 8). The receiver resolves after the last
    /// chunk has been merged into the cache.
    pub fn request_guild_members(
        &self,
        payload: RequestGuildMembersPayload,
    ) -> GatewayResult<oneshot::Receiver<ChunkSummary>> {
        if !self.id.owns(payload.guild_id) {
            return Err(GatewayError::NoShardForGuild(payload.guild_id));
        }
        let payload = if payload.nonce.is_some() {
            payload
        } else {
            payload.with_nonce(generate_nonce())
        };

        let done = self
            .cache
            .await_member_chunks(payload.guild_id, payload.nonce.clone());
        self.send(GatewayMessage::request_guild_members(&payload)?)?;
        tracing::debug!(shard = %self.id, guild_id = %payload.guild_id, nonce = ?payload.nonce, "Requested guild members");
        Ok(done)
    }

    /// Join, move or leave voice (op 4)
    pub fn update_voice_state(&self, payload: VoiceStateUpdatePayload) -> GatewayResult<()> {
        if !self.id.owns(payload.guild_id) {
            return Err(GatewayError::NoShardForGuild(payload.guild_id));
        }
        self.send(GatewayMessage::voice_state_update(&payload)?)
    }

    /// Change the local user's presence (op 3) and mirror it in the cache
    pub fn update_presence(&self, payload: PresenceUpdatePayload) -> GatewayResult<()> {
        self.send(GatewayMessage::presence_update(&payload)?)?;
        if let Some(user) = self.cache.current_user() {
            self.cache.set_current_presence(Presence {
                user_id: user.id,
                guild_id: None,
                status: payload.status,
                activity: payload.activities.into_iter().next(),
            });
        }
        Ok(())
    }
}

/// Nonce matching chunk responses to their request
fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}
