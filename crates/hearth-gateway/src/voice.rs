//! Voice hand-off
//!
//! Joining voice takes two dispatches: VOICE_STATE_UPDATE for the local user
//! carries the voice session id, VOICE_SERVER_UPDATE carries the endpoint and
//! token. Once both are known for a guild the pair is handed to a
//! [`VoiceConnector`], which owns the voice socket, the secret key and the
//! audio pacing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

use hearth_core::{Snowflake, VoiceStatePayload};

/// One audio frame every 20 ms
pub const VOICE_FRAME_INTERVAL: Duration = Duration::from_millis(20);

/// Everything a voice connection needs from the main gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceServerInfo {
    pub guild_id: Snowflake,
    pub user_id: Snowflake,
    pub session_id: String,
    pub endpoint: String,
    pub token: String,
}

/// External voice implementation
#[async_trait]
pub trait VoiceConnector: Send + Sync + 'static {
    /// Open (or move) the voice connection for `info.guild_id`
    async fn connect(&self, info: VoiceServerInfo) -> anyhow::Result<()>;

    /// The local user left voice in `guild_id`
    async fn disconnect(&self, guild_id: Snowflake) -> anyhow::Result<()>;
}

/// Ticker for sending audio frames; late ticks are skipped rather than bunched
pub fn frame_pacer() -> Interval {
    let mut pacer = tokio::time::interval(VOICE_FRAME_INTERVAL);
    pacer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    pacer
}

#[derive(Debug, Default)]
struct Pending {
    session_id: Option<String>,
    server: Option<(String, String)>,
}

/// Pairs the two halves of a voice join per guild
#[derive(Clone, Default)]
pub(crate) struct VoiceHandoff {
    connector: Option<Arc<dyn VoiceConnector>>,
    pending: Arc<Mutex<HashMap<Snowflake, Pending>>>,
}

impl VoiceHandoff {
    pub fn new(connector: Option<Arc<dyn VoiceConnector>>) -> Self {
        Self {
            connector,
            pending: Arc::default(),
        }
    }

    /// Observe a voice state; only the local user's own states matter
    pub fn observe_state(
        &self,
        current_user: Option<Snowflake>,
        payload: &VoiceStatePayload,
    ) -> Option<VoiceServerInfo> {
        let guild_id = payload.guild_id?;
        let user_id = current_user.filter(|id| *id == payload.user_id)?;

        if payload.channel_id.is_none() {
            self.pending.lock().remove(&guild_id);
            if let Some(connector) = self.connector.clone() {
                tokio::spawn(async move {
                    if let Err(err) = connector.disconnect(guild_id).await {
                        tracing::warn!(guild_id = %guild_id, error = %err, "Voice disconnect failed");
                    }
                });
            }
            return None;
        }

        let info = {
            let mut pending = self.pending.lock();
            let entry = pending.entry(guild_id).or_default();
            entry.session_id = Some(payload.session_id.clone());
            Self::take_complete(&mut pending, guild_id, user_id)
        };
        self.hand_off(info)
    }

    /// Observe VOICE_SERVER_UPDATE. A missing endpoint means the server is
    /// being reallocated and another update will follow.
    pub fn observe_server(
        &self,
        current_user: Option<Snowflake>,
        guild_id: Snowflake,
        endpoint: Option<&str>,
        token: &str,
    ) -> Option<VoiceServerInfo> {
        let endpoint = endpoint?;
        let user_id = current_user?;
        let info = {
            let mut pending = self.pending.lock();
            let entry = pending.entry(guild_id).or_default();
            entry.server = Some((endpoint.to_string(), token.to_string()));
            Self::take_complete(&mut pending, guild_id, user_id)
        };
        self.hand_off(info)
    }

    fn take_complete(
        pending: &mut HashMap<Snowflake, Pending>,
        guild_id: Snowflake,
        user_id: Snowflake,
    ) -> Option<VoiceServerInfo> {
        let entry = pending.get(&guild_id)?;
        if entry.session_id.is_none() || entry.server.is_none() {
            return None;
        }
        let Pending { session_id, server } = pending.remove(&guild_id)?;
        let (endpoint, token) = server?;
        Some(VoiceServerInfo {
            guild_id,
            user_id,
            session_id: session_id?,
            endpoint,
            token,
        })
    }

    fn hand_off(&self, info: Option<VoiceServerInfo>) -> Option<VoiceServerInfo> {
        let info = info?;
        tracing::debug!(guild_id = %info.guild_id, endpoint = %info.endpoint, "Voice server ready");
        if let Some(connector) = self.connector.clone() {
            let handed = info.clone();
            tokio::spawn(async move {
                let guild_id = handed.guild_id;
                if let Err(err) = connector.connect(handed).await {
                    tracing::warn!(guild_id = %guild_id, error = %err, "Voice connect failed");
                }
            });
        }
        Some(info)
    }
}

impl std::fmt::Debug for VoiceHandoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceHandoff")
            .field("connector", &self.connector.is_some())
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    struct Recording(mpsc::UnboundedSender<Result<VoiceServerInfo, Snowflake>>);

    #[async_trait]
    impl VoiceConnector for Recording {
        async fn connect(&self, info: VoiceServerInfo) -> anyhow::Result<()> {
            let _ = self.0.send(Ok(info));
            Ok(())
        }

        async fn disconnect(&self, guild_id: Snowflake) -> anyhow::Result<()> {
            let _ = self.0.send(Err(guild_id));
            Ok(())
        }
    }

    fn state(user: u64, channel: Option<u64>) -> VoiceStatePayload {
        VoiceStatePayload {
            guild_id: Some(Snowflake::new(1)),
            channel_id: channel.map(Snowflake::new),
            user_id: Snowflake::new(user),
            session_id: "voice-session".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_both_halves_hand_off_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handoff = VoiceHandoff::new(Some(Arc::new(Recording(tx))));
        let me = Some(Snowflake::new(10));

        assert!(handoff
            .observe_server(me, Snowflake::new(1), Some("voice.example:443"), "tok")
            .is_none());
        let info = handoff.observe_state(me, &state(10, Some(5))).unwrap();

        assert_eq!(info.session_id, "voice-session");
        assert_eq!(info.endpoint, "voice.example:443");
        assert_eq!(rx.recv().await.unwrap(), Ok(info));

        // The pair was consumed
        assert!(handoff.observe_state(me, &state(10, Some(5))).is_none());
    }

    #[tokio::test]
    async fn test_other_users_and_null_endpoint_are_ignored() {
        let handoff = VoiceHandoff::new(None);
        let me = Some(Snowflake::new(10));

        assert!(handoff.observe_state(me, &state(11, Some(5))).is_none());
        assert!(handoff.observe_server(me, Snowflake::new(1), None, "tok").is_none());
        assert!(handoff.observe_state(me, &state(10, Some(5))).is_none());
    }

    #[tokio::test]
    async fn test_leaving_voice_disconnects() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handoff = VoiceHandoff::new(Some(Arc::new(Recording(tx))));

        handoff.observe_state(Some(Snowflake::new(10)), &state(10, None));
        assert_eq!(rx.recv().await.unwrap(), Err(Snowflake::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_pacer_period() {
        let mut pacer = frame_pacer();
        pacer.tick().await;
        let start = tokio::time::Instant::now();
        pacer.tick().await;
        assert_eq!(start.elapsed(), VOICE_FRAME_INTERVAL);
    }
}
