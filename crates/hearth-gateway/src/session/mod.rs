//! Gateway session
//!
//! One [`GatewaySession`] drives one shard's websocket: connect, HELLO,
//! IDENTIFY or RESUME, heartbeats, dispatches. Connectivity failures are
//! retried with backoff; a run of `max_handshake_failures` failed handshakes
//! or a fatal close code leaves the session [`SessionState::Failed`].

mod backoff;
mod burst;
mod connection;
mod heartbeat;
mod state;

pub use backoff::Backoff;
pub use burst::GuildBurst;
pub use heartbeat::HeartbeatTracker;
pub use state::SessionState;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use hearth_cache::{EntityCache, SessionStore};
use hearth_common::{GatewayConfig, Token};

use crate::dispatch::DispatchHandler;
use crate::dispatcher::EventDispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{GatewayMessage, PresenceUpdatePayload};
use crate::shard::{IdentifyThrottle, ShardHandle, ShardId};
use crate::voice::{VoiceConnector, VoiceHandoff};

/// Per-session settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Gateway URL; `v` and `encoding` query parameters are added when absent
    pub url: String,
    pub token: Token,
    pub intents: u64,
    pub large_threshold: u32,
    pub connect_timeout: Duration,
    pub hello_timeout: Duration,
    pub max_handshake_failures: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    pub guild_ready_timeout: Duration,
    /// Presence sent with IDENTIFY
    pub presence: Option<PresenceUpdatePayload>,
}

impl SessionConfig {
    pub fn from_config(config: &GatewayConfig, token: Token, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token,
            intents: config.intents,
            large_threshold: config.large_threshold,
            connect_timeout: config.connect_timeout,
            hello_timeout: config.hello_timeout,
            max_handshake_failures: config.max_handshake_failures.max(1),
            backoff_base: config.backoff_base,
            backoff_max: config.backoff_max,
            guild_ready_timeout: config.guild_ready_timeout,
            presence: None,
        }
    }

    #[must_use]
    pub fn with_presence(mut self, presence: PresenceUpdatePayload) -> Self {
        self.presence = Some(presence);
        self
    }
}

/// State shared by every session of a client
#[derive(Clone)]
pub struct SessionContext {
    pub cache: EntityCache,
    pub events: EventDispatcher,
    pub sessions: SessionStore,
    pub throttle: IdentifyThrottle,
    pub voice: Option<Arc<dyn VoiceConnector>>,
}

impl SessionContext {
    pub fn new(cache: EntityCache, events: EventDispatcher, identify_spacing: Duration) -> Self {
        Self {
            cache,
            events,
            sessions: SessionStore::new(),
            throttle: IdentifyThrottle::new(identify_spacing),
            voice: None,
        }
    }

    #[must_use]
    pub fn with_voice_connector(mut self, connector: Arc<dyn VoiceConnector>) -> Self {
        self.voice = Some(connector);
        self
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("events", &self.events)
            .field("throttle", &self.throttle)
            .field("voice", &self.voice.is_some())
            .finish()
    }
}

/// How a connection ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Cancelled; do not reconnect
    Shutdown,
    /// Reconnect right away, resuming if possible
    Reconnect,
}

/// One shard's gateway connection, across reconnects
#[derive(Debug)]
pub struct GatewaySession {
    shard: ShardId,
    config: SessionConfig,
    ctx: SessionContext,
    handler: DispatchHandler,
    state: watch::Sender<SessionState>,
    ready: watch::Sender<bool>,
    commands: mpsc::UnboundedReceiver<GatewayMessage>,
    cancel: CancellationToken,
    /// Highest dispatch sequence seen on the current session
    sequence: Option<u64>,
}

impl GatewaySession {
    pub fn new(
        shard: ShardId,
        config: SessionConfig,
        ctx: SessionContext,
        cancel: CancellationToken,
    ) -> (Self, ShardHandle) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(SessionState::Disconnected);
        let (ready, ready_rx) = watch::channel(false);
        let handler = DispatchHandler::new(shard, ctx.cache.clone(), VoiceHandoff::new(ctx.voice.clone()));
        let handle = ShardHandle::new(shard, command_tx, state_rx, ready_rx, ctx.cache.clone());

        let session = Self {
            shard,
            config,
            ctx,
            handler,
            state,
            ready,
            commands,
            cancel,
            sequence: None,
        };
        (session, handle)
    }

    pub fn shard(&self) -> ShardId {
        self.shard
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Run until cancelled or failed.
    ///
    /// Returns `Ok(())` on cancellation. Returns an error after a fatal close
    /// code or once `max_handshake_failures` consecutive handshakes failed; the
    /// state is then [`SessionState::Failed`] and `run` may be called again to
    /// relaunch the shard.
    pub async fn run(&mut self) -> GatewayResult<()> {
        let mut backoff = Backoff::new(self.config.backoff_base, self.config.backoff_max);
        let mut failures = 0u32;
        tracing::info!(shard = %self.shard, "Starting gateway session");

        loop {
            if self.cancel.is_cancelled() {
                self.set_state(SessionState::Disconnected);
                return Ok(());
            }

            match self.connect_once().await {
                Ok(Exit::Shutdown) => {
                    self.set_state(SessionState::Disconnected);
                    tracing::info!(shard = %self.shard, "Gateway session stopped");
                    return Ok(());
                }
                Ok(Exit::Reconnect) => {
                    backoff.reset();
                    failures = 0;
                    self.set_state(SessionState::Disconnected);
                    tracing::info!(shard = %self.shard, "Reconnecting");
                }
                Err(err) if err.is_permanent() => {
                    tracing::error!(shard = %self.shard, error = %err, "Gateway refused the shard");
                    self.set_state(SessionState::Failed);
                    return Err(err);
                }
                Err(err) => {
                    failures += 1;
                    self.set_state(SessionState::Disconnected);
                    if failures >= self.config.max_handshake_failures {
                        tracing::error!(shard = %self.shard, failures, error = %err, "Giving up on gateway handshake");
                        self.set_state(SessionState::Failed);
                        return Err(GatewayError::HandshakeBudgetExhausted(failures));
                    }

                    let delay = backoff.next_delay();
                    tracing::warn!(
                        shard = %self.shard,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Gateway handshake failed"
                    );
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = self.cancel.cancelled() => {}
                    }
                }
            }
        }
    }

    fn set_state(&self, state: SessionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(shard = %self.shard, from = %previous, to = %state, "Session state changed");
        }
    }
}

/// Gateway URL with protocol version and encoding
fn gateway_url(base: &str) -> String {
    if base.contains('?') {
        base.to_string()
    } else {
        format!("{}/?v=10&encoding=json", base.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_url() {
        assert_eq!(gateway_url("wss://gateway.example"), "wss://gateway.example/?v=10&encoding=json");
        assert_eq!(gateway_url("wss://gateway.example/"), "wss://gateway.example/?v=10&encoding=json");
        assert_eq!(gateway_url("ws://127.0.0.1:9/?v=9"), "ws://127.0.0.1:9/?v=9");
    }

    #[test]
    fn test_config_keeps_at_least_one_attempt() {
        let config = GatewayConfig {
            max_handshake_failures: 0,
            ..GatewayConfig::default()
        };
        let token = Token::parse("abc.def.ghi").unwrap();
        let session = SessionConfig::from_config(&config, token, "ws://localhost");
        assert_eq!(session.max_handshake_failures, 1);
        assert_eq!(session.intents, config.intents);
    }

    #[tokio::test]
    async fn test_unreachable_gateway_exhausts_budget() {
        let mut config = SessionConfig::from_config(
            &GatewayConfig::default(),
            Token::parse("abc.def.ghi").unwrap(),
            // Port 9 (discard) is not expected to accept websocket upgrades
            "ws://127.0.0.1:9",
        );
        config.max_handshake_failures = 3;
        config.backoff_base = Duration::from_millis(10);
        config.backoff_max = Duration::from_millis(40);
        let ctx = SessionContext::new(EntityCache::new(), EventDispatcher::new(), Duration::ZERO);
        let (mut session, handle) = GatewaySession::new(ShardId::SINGLE, config, ctx, CancellationToken::new());

        let err = session.run().await.unwrap_err();
        assert!(matches!(err, GatewayError::HandshakeBudgetExhausted(3)));
        assert_eq!(handle.state(), SessionState::Failed);
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn test_silent_upgrade_counts_as_failed_handshake() {
        // Accepts TCP but never answers the websocket upgrade
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = SessionConfig::from_config(&GatewayConfig::default(), Token::parse("abc.def.ghi").unwrap(), url);
        config.connect_timeout = Duration::from_millis(50);
        config.max_handshake_failures = 2;
        config.backoff_base = Duration::from_millis(10);
        config.backoff_max = Duration::from_millis(20);
        let ctx = SessionContext::new(EntityCache::new(), EventDispatcher::new(), Duration::ZERO);
        let (mut session, handle) = GatewaySession::new(ShardId::SINGLE, config, ctx, CancellationToken::new());

        let err = tokio::time::timeout(Duration::from_secs(5), session.run())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, GatewayError::HandshakeBudgetExhausted(2)));
        assert_eq!(handle.state(), SessionState::Failed);
        server.abort();
    }

    #[tokio::test]
    async fn test_cancelled_session_returns_immediately() {
        let config = SessionConfig::from_config(
            &GatewayConfig::default(),
            Token::parse("abc.def.ghi").unwrap(),
            "ws://127.0.0.1:9",
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = SessionContext::new(EntityCache::new(), EventDispatcher::new(), Duration::ZERO);
        let (mut session, handle) = GatewaySession::new(ShardId::SINGLE, config, ctx, cancel);

        session.run().await.unwrap();
        assert_eq!(handle.state(), SessionState::Disconnected);
    }
}
