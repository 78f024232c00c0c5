//! A single websocket connection of a session
//!
//! HELLO, then IDENTIFY or RESUME, then a select loop over cancellation,
//! the heartbeat ticker, the IDENTIFY slot, queued commands, the guild burst
//! deadline and inbound frames. Heartbeats stop with the loop.
//!
//! IDENTIFY waits for its slot inside the loop, so heartbeats keep flowing
//! while other shards hold the identify spacing.

use futures_util::future::BoxFuture;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use hearth_cache::ResumeInfo;
use hearth_core::DomainEvent;

use super::{gateway_url, Exit, GatewaySession, GuildBurst, HeartbeatTracker, SessionState};
use crate::dispatch::GatewayEvent;
use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{CloseCode, GatewayMessage, IdentifyPayload, OpCode, ResumePayload};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Close code used when we drop the socket but want to resume afterwards
const RESUMABLE_CLOSE: u16 = 4000;
const NORMAL_CLOSE: u16 = 1000;

struct Connection {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
    heartbeat: HeartbeatTracker,
    ticker: Interval,
    /// READY or RESUMED was received on this socket
    established: bool,
    burst: Option<GuildBurst>,
    /// Queued IDENTIFY, resolves when the shared throttle grants the slot
    identify_slot: Option<BoxFuture<'static, ()>>,
}

impl Connection {
    async fn send(&mut self, message: &GatewayMessage) -> GatewayResult<()> {
        tracing::trace!(op = %message.op, "Sending frame");
        self.sink.send(Message::Text(message.to_json()?)).await?;
        Ok(())
    }

    async fn close(&mut self, code: u16, reason: &'static str) {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: reason.into(),
        };
        if let Err(err) = self.sink.send(Message::Close(Some(frame))).await {
            tracing::debug!(code, error = %err, "Close frame not sent");
        }
    }
}

/// Resolves when the queued IDENTIFY may be sent; pending while none is queued
async fn identify_slot(slot: &mut Option<BoxFuture<'static, ()>>) {
    match slot {
        Some(wait) => wait.await,
        None => std::future::pending().await,
    }
}

/// Next gateway frame during the handshake
async fn next_frame(stream: &mut SplitStream<WsStream>) -> GatewayResult<GatewayMessage> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => return Ok(GatewayMessage::from_json(&text)?),
            Some(Ok(Message::Close(frame))) => {
                let code = frame.map(|frame| u16::from(frame.code));
                return Err(close_error(code));
            }
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(err.into()),
            None => return Err(GatewayError::ClosedDuringHandshake(None)),
        }
    }
}

fn close_error(code: Option<u16>) -> GatewayError {
    match code.and_then(CloseCode::from_u16) {
        Some(close) if close.is_fatal() => GatewayError::FatalClose(close),
        _ => GatewayError::ClosedDuringHandshake(code),
    }
}

impl GatewaySession {
    /// Open one socket and drive it until it ends
    pub(super) async fn connect_once(&mut self) -> GatewayResult<Exit> {
        let resume = self.ctx.sessions.get(self.shard.index());
        self.sequence = resume.as_ref().map(|info| info.sequence);
        let url = gateway_url(
            resume
                .as_ref()
                .and_then(|info| info.resume_url.as_deref())
                .unwrap_or(&self.config.url),
        );

        self.set_state(SessionState::Connecting);
        tracing::debug!(shard = %self.shard, url = %url, "Connecting to gateway");
        let connect = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(url.as_str()),
        );
        let socket = tokio::select! {
            result = connect => result.map_err(|_| GatewayError::ConnectTimeout)??.0,
            () = self.cancel.cancelled() => return Ok(Exit::Shutdown),
        };
        let (sink, mut stream) = socket.split();

        self.set_state(SessionState::AwaitingHello);
        let hello = tokio::time::timeout(self.config.hello_timeout, next_frame(&mut stream))
            .await
            .map_err(|_| GatewayError::HelloTimeout)??;
        let interval = hello
            .as_hello()
            .ok_or(GatewayError::UnexpectedFrame {
                expected: OpCode::Hello,
                received: hello.op,
            })?
            .heartbeat_interval;
        tracing::debug!(shard = %self.shard, heartbeat_interval = interval, "Received HELLO");

        let heartbeat = HeartbeatTracker::new(Duration::from_millis(interval.max(1)));
        let ticker = heartbeat.ticker();
        let mut conn = Connection {
            sink,
            stream,
            heartbeat,
            ticker,
            established: false,
            burst: None,
            identify_slot: None,
        };

        let result = match resume {
            Some(info) => self.send_resume(&mut conn, &info).await,
            None => {
                self.queue_identify(&mut conn);
                Ok(())
            }
        };
        let result = match result {
            Ok(()) => self.drive(&mut conn).await,
            Err(err) => Err(err),
        };

        match result {
            // Losing an established session is not a handshake failure
            Err(err) if conn.established && !err.is_permanent() => {
                tracing::warn!(shard = %self.shard, error = %err, "Gateway connection lost");
                Ok(Exit::Reconnect)
            }
            other => other,
        }
    }

    /// Wait for an IDENTIFY slot without blocking the connection loop
    fn queue_identify(&mut self, conn: &mut Connection) {
        self.set_state(SessionState::Identifying);
        let throttle = self.ctx.throttle.clone();
        conn.identify_slot = Some(Box::pin(async move { throttle.acquire().await }));
    }

    async fn send_identify(&mut self, conn: &mut Connection) -> GatewayResult<()> {
        let mut payload = IdentifyPayload::new(
            self.config.token.expose(),
            self.shard.as_array(),
            self.config.intents,
        )
        .with_large_threshold(self.config.large_threshold);
        if let Some(presence) = &self.config.presence {
            payload = payload.with_presence(presence.clone());
        }
        conn.send(&GatewayMessage::identify(&payload)?).await?;
        tracing::debug!(shard = %self.shard, intents = self.config.intents, "Sent IDENTIFY");
        Ok(())
    }

    async fn send_resume(&mut self, conn: &mut Connection, info: &ResumeInfo) -> GatewayResult<()> {
        self.set_state(SessionState::Resuming);
        conn.identify_slot = None;
        let payload = ResumePayload {
            token: self.config.token.expose().to_string(),
            session_id: info.session_id.clone(),
            seq: info.sequence,
        };
        conn.send(&GatewayMessage::resume(&payload)?).await?;
        tracing::debug!(shard = %self.shard, session_id = %info.session_id, seq = info.sequence, "Sent RESUME");
        Ok(())
    }

    async fn drive(&mut self, conn: &mut Connection) -> GatewayResult<Exit> {
        loop {
            let burst_deadline = conn.burst.as_ref().map(GuildBurst::deadline);

            tokio::select! {
                () = self.cancel.cancelled() => {
                    conn.close(NORMAL_CLOSE, "shutting down").await;
                    return Ok(Exit::Shutdown);
                }
                _ = conn.ticker.tick() => {
                    if conn.heartbeat.is_zombie() {
                        tracing::warn!(shard = %self.shard, "Heartbeat not acknowledged, closing zombie connection");
                        conn.close(RESUMABLE_CLOSE, "heartbeat timeout").await;
                        return if conn.established {
                            Ok(Exit::Reconnect)
                        } else {
                            Err(GatewayError::Zombie)
                        };
                    }
                    self.send_heartbeat(conn).await?;
                }
                () = identify_slot(&mut conn.identify_slot), if conn.identify_slot.is_some() => {
                    conn.identify_slot = None;
                    self.send_identify(conn).await?;
                }
                Some(command) = self.commands.recv(), if conn.established => {
                    conn.send(&command).await?;
                }
                () = tokio::time::sleep_until(burst_deadline.unwrap_or_else(Instant::now)), if burst_deadline.is_some() => {
                    tracing::warn!(shard = %self.shard, "Initial guild burst timed out");
                    self.finish_burst(conn);
                }
                frame = conn.stream.next() => {
                    let text = match frame {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(frame))) => {
                            let code = frame.map(|frame| u16::from(frame.code));
                            return self.on_close(conn, code);
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => return Err(err.into()),
                        None => return self.on_close(conn, None),
                    };
                    let message = match GatewayMessage::from_json(&text) {
                        Ok(message) => message,
                        Err(err) => {
                            tracing::warn!(shard = %self.shard, error = %err, "Dropping undecodable frame");
                            continue;
                        }
                    };
                    if let Some(exit) = self.handle_frame(conn, message).await? {
                        return Ok(exit);
                    }
                }
            }
        }
    }

    async fn send_heartbeat(&mut self, conn: &mut Connection) -> GatewayResult<()> {
        conn.send(&GatewayMessage::heartbeat(self.sequence)).await?;
        conn.heartbeat.record_sent();
        Ok(())
    }

    /// The server closed the socket
    fn on_close(&mut self, conn: &Connection, code: Option<u16>) -> GatewayResult<Exit> {
        let close = code.and_then(CloseCode::from_u16);
        tracing::info!(shard = %self.shard, code = ?code, reason = close.map(CloseCode::description), "Gateway closed the connection");

        if let Some(close) = close {
            if close.is_fatal() {
                return Err(GatewayError::FatalClose(close));
            }
            if close.clears_session() {
                self.ctx.sessions.invalidate(self.shard.index());
                self.sequence = None;
            }
        }
        if conn.established {
            Ok(Exit::Reconnect)
        } else {
            Err(GatewayError::ClosedDuringHandshake(code))
        }
    }

    async fn handle_frame(
        &mut self,
        conn: &mut Connection,
        message: GatewayMessage,
    ) -> GatewayResult<Option<Exit>> {
        tracing::trace!(shard = %self.shard, message = %message, "Received frame");
        match message.op {
            OpCode::Dispatch => self.handle_dispatch(conn, message),
            OpCode::Heartbeat => self.send_heartbeat(conn).await?,
            OpCode::HeartbeatAck => {
                conn.heartbeat.record_ack();
                tracing::trace!(shard = %self.shard, latency = ?conn.heartbeat.latency(), "Heartbeat acknowledged");
            }
            OpCode::Reconnect => {
                tracing::info!(shard = %self.shard, "Gateway requested reconnect");
                conn.close(RESUMABLE_CLOSE, "reconnect requested").await;
                return Ok(Some(Exit::Reconnect));
            }
            OpCode::InvalidSession => {
                let resumable = message.as_invalid_session().unwrap_or(false);
                let resume = if resumable {
                    self.ctx.sessions.get(self.shard.index())
                } else {
                    None
                };
                tracing::info!(shard = %self.shard, resumable, "Session invalidated");
                match resume {
                    Some(info) => self.send_resume(conn, &info).await?,
                    None => {
                        self.ctx.sessions.invalidate(self.shard.index());
                        self.sequence = None;
                        conn.established = false;
                        conn.burst = None;
                        self.ready.send_replace(false);
                        self.queue_identify(conn);
                    }
                }
            }
            op => {
                tracing::debug!(shard = %self.shard, op = %op, "Ignoring unexpected opcode");
            }
        }
        Ok(None)
    }

    fn handle_dispatch(&mut self, conn: &mut Connection, message: GatewayMessage) {
        let Some(name) = message.t else {
            tracing::warn!(shard = %self.shard, "Dispatch without event name");
            return;
        };
        if let Some(seq) = message.s {
            self.sequence = Some(self.sequence.map_or(seq, |current| current.max(seq)));
            self.ctx.sessions.observe_sequence(self.shard.index(), seq);
        }

        let event = match GatewayEvent::parse(&name, message.d.unwrap_or(Value::Null)) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(shard = %self.shard, event = %name, error = %err, "Dropping malformed dispatch");
                return;
            }
        };

        match &event {
            GatewayEvent::Ready(ready) => {
                let mut info = ResumeInfo::new(ready.session_id.clone(), self.sequence.unwrap_or(0));
                if let Some(url) = &ready.resume_gateway_url {
                    info = info.with_resume_url(url.clone());
                }
                self.ctx.sessions.save(self.shard.index(), info);
                conn.established = true;
                self.set_state(SessionState::Connected);
                tracing::info!(shard = %self.shard, session_id = %ready.session_id, guilds = ready.guilds.len(), "Session ready");
            }
            GatewayEvent::Resumed => {
                conn.established = true;
                self.set_state(SessionState::Connected);
                self.ready.send_if_modified(|ready| !std::mem::replace(ready, true));
                tracing::info!(shard = %self.shard, seq = ?self.sequence, "Session resumed");
            }
            _ => {}
        }

        let Some(domain) = self.handler.apply(event) else {
            return;
        };
        let domain = self.track_burst(conn, domain);
        self.ctx.events.emit(domain);

        if conn.burst.as_ref().is_some_and(GuildBurst::is_complete) {
            self.finish_burst(conn);
        }
    }

    /// Follow the initial guild burst. A guild listed in READY reports as
    /// created, not as returning from an outage.
    fn track_burst(&mut self, conn: &mut Connection, domain: DomainEvent) -> DomainEvent {
        if let DomainEvent::Ready { guild_ids, .. } = &domain {
            conn.burst = Some(GuildBurst::new(guild_ids.iter().copied(), self.config.guild_ready_timeout));
            self.ready.send_replace(false);
            return domain;
        }
        let Some(burst) = conn.burst.as_mut() else {
            return domain;
        };
        match domain {
            DomainEvent::GuildAvailable { guild } if burst.is_pending(guild.id) => {
                burst.arrived(guild.id, true);
                DomainEvent::GuildCreate { guild }
            }
            DomainEvent::GuildCreate { ref guild } => {
                burst.arrived(guild.id, true);
                domain
            }
            DomainEvent::GuildUnavailable { guild_id } => {
                burst.arrived(guild_id, false);
                domain
            }
            other => other,
        }
    }

    fn finish_burst(&mut self, conn: &mut Connection) {
        let Some(burst) = conn.burst.take() else {
            return;
        };
        let unavailable_guilds = burst.finish();
        tracing::info!(shard = %self.shard, unavailable = unavailable_guilds.len(), "Shard ready");
        self.ctx.events.emit(DomainEvent::ShardReady {
            shard_id: self.shard.index(),
            unavailable_guilds,
        });
        self.ready.send_replace(true);
    }
}
