//! Shard manager
//!
//! Launches one session per shard, spaced by `identify_spacing`, and
//! relaunches a shard that failed after `shard_restart_delay`. A shard the
//! gateway refused outright (bad token, invalid shard or intents) stays down.

use futures::future::try_join_all;
use parking_lot::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use hearth_cache::ChunkSummary;
use hearth_common::GatewayConfig;
use hearth_core::{DomainEvent, Snowflake};

use super::{ShardHandle, ShardId};
use crate::dispatcher::EventDispatcher;
use crate::error::GatewayResult;
use crate::protocol::RequestGuildMembersPayload;
use crate::session::{GatewaySession, SessionConfig, SessionContext};

/// Supervises every shard of a client
#[derive(Debug)]
pub struct ShardManager {
    shard_count: u32,
    launch_spacing: Duration,
    restart_delay: Duration,
    handles: Vec<ShardHandle>,
    pending: Mutex<Vec<GatewaySession>>,
    launcher: Mutex<Option<JoinHandle<()>>>,
    events: EventDispatcher,
    cancel: CancellationToken,
}

impl ShardManager {
    /// Prepare `shard_count` sessions; nothing connects until [`start`](Self::start)
    pub fn new(
        config: &GatewayConfig,
        session: SessionConfig,
        shard_count: u32,
        ctx: SessionContext,
    ) -> Self {
        let cancel = CancellationToken::new();
        let shard_count = shard_count.max(1);
        let events = ctx.events.clone();

        let (sessions, handles): (Vec<_>, Vec<_>) = ShardId::all(shard_count)
            .map(|id| GatewaySession::new(id, session.clone(), ctx.clone(), cancel.child_token()))
            .unzip();

        Self {
            shard_count,
            launch_spacing: config.identify_spacing,
            restart_delay: config.shard_restart_delay,
            handles,
            pending: Mutex::new(sessions),
            launcher: Mutex::new(None),
            events,
            cancel,
        }
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    /// Launch every shard in index order. Calling it again does nothing.
    pub fn start(&self) {
        let sessions = std::mem::take(&mut *self.pending.lock());
        if sessions.is_empty() {
            tracing::warn!("Shards already started");
            return;
        }

        let spacing = self.launch_spacing;
        let restart_delay = self.restart_delay;
        let shard_count = self.shard_count;
        let events = self.events.clone();
        let cancel = self.cancel.clone();

        let launcher = tokio::spawn(async move {
            let mut shards = JoinSet::new();
            for (launched, session) in sessions.into_iter().enumerate() {
                if launched > 0 {
                    tokio::select! {
                        () = tokio::time::sleep(spacing) => {}
                        () = cancel.cancelled() => break,
                    }
                }
                shards.spawn(supervise(session, shard_count, restart_delay, events.clone(), cancel.clone()));
            }
            while let Some(result) = shards.join_next().await {
                if let Err(err) = result {
                    tracing::error!(error = %err, "Shard task panicked");
                }
            }
        });
        *self.launcher.lock() = Some(launcher);
        tracing::info!(shards = self.shard_count, "Launching shards");
    }

    pub fn handles(&self) -> &[ShardHandle] {
        &self.handles
    }

    pub fn handle(&self, index: u32) -> Option<&ShardHandle> {
        self.handles.get(index as usize)
    }

    /// Shard that receives the given guild's events
    pub fn shard_for(&self, guild_id: Snowflake) -> &ShardHandle {
        &self.handles[guild_id.shard_index(self.shard_count) as usize]
    }

    /// Every shard finished its initial guild burst
    pub fn is_ready(&self) -> bool {
        self.handles.iter().all(ShardHandle::is_ready)
    }

    pub async fn wait_ready(&self) -> GatewayResult<()> {
        try_join_all(self.handles.iter().map(ShardHandle::wait_ready)).await?;
        Ok(())
    }

    /// Request guild members through the shard owning the guild
    pub fn request_guild_members(
        &self,
        payload: RequestGuildMembersPayload,
    ) -> GatewayResult<oneshot::Receiver<ChunkSummary>> {
        self.shard_for(payload.guild_id).request_guild_members(payload)
    }

    /// Close every shard and wait for them to stop
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down shards");
        self.cancel.cancel();
        let launcher = self.launcher.lock().take();
        if let Some(launcher) = launcher {
            if let Err(err) = launcher.await {
                tracing::error!(error = %err, "Shard launcher panicked");
            }
        }
    }
}

/// Run one shard, relaunching it after recoverable failures
async fn supervise(
    mut session: GatewaySession,
    shard_count: u32,
    restart_delay: Duration,
    events: EventDispatcher,
    cancel: CancellationToken,
) {
    let shard = session.shard();
    loop {
        events.emit(DomainEvent::ShardLaunched {
            shard_id: shard.index(),
            shard_count,
        });
        match session.run().await {
            Ok(()) => return,
            Err(err) if err.is_permanent() => {
                tracing::error!(shard = %shard, error = %err, "Shard stopped permanently");
                return;
            }
            Err(err) => {
                tracing::warn!(
                    shard = %shard,
                    error = %err,
                    delay_ms = restart_delay.as_millis() as u64,
                    "Shard failed, relaunching"
                );
                tokio::select! {
                    () = tokio::time::sleep(restart_delay) => {}
                    () = cancel.cancelled() => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_cache::EntityCache;
    use hearth_common::Token;

    fn manager(count: u32) -> ShardManager {
        let config = GatewayConfig::default();
        let session = SessionConfig::from_config(&config, Token::parse("abc.def.ghi").unwrap(), "ws://127.0.0.1:9");
        let ctx = SessionContext::new(EntityCache::new(), EventDispatcher::new(), Duration::ZERO);
        ShardManager::new(&config, session, count, ctx)
    }

    #[test]
    fn test_guilds_route_to_owning_shard() {
        let manager = manager(2);
        assert_eq!(manager.handles().len(), 2);
        assert_eq!(manager.shard_for(Snowflake::new(5)).id(), ShardId::new(0, 2).unwrap());
        assert_eq!(manager.shard_for(Snowflake::new(1 << 22)).id(), ShardId::new(1, 2).unwrap());
    }

    #[test]
    fn test_zero_shards_means_one() {
        let manager = manager(0);
        assert_eq!(manager.shard_count(), 1);
        assert_eq!(manager.handle(0).unwrap().id(), ShardId::SINGLE);
    }

    #[tokio::test]
    async fn test_not_ready_before_start() {
        let manager = manager(2);
        assert!(!manager.is_ready());
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_then_shutdown_stops_every_shard() {
        let manager = manager(2);
        let mut stream = manager.events.stream();
        let delivery = manager.events.start();
        manager.start();

        let first = stream.recv().await.unwrap();
        assert!(matches!(first, DomainEvent::ShardLaunched { shard_id: 0, shard_count: 2 }));

        manager.shutdown().await;
        for handle in manager.handles() {
            assert!(!handle.state().is_connected());
        }
        drop(delivery);
    }
}
