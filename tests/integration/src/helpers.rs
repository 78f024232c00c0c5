//! Test helpers for integration tests
//!
//! Provides a scripted gateway server, a scripted HTTP transport and a
//! client wired to both.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, ensure, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use hearth::Client;
use hearth_common::{ClientConfig, Token};
use hearth_core::{DomainEvent, EventKind};
use hearth_gateway::protocol::IdentifyPayload;
use hearth_gateway::{GatewayMessage, OpCode};
use hearth_rest::{HttpRequest, HttpTransport, Method, RestResponse, RestResult};

pub const TEST_TOKEN: &str = "MTIz.abc.def";
pub const API_BASE: &str = "http://api.test";

/// Upper bound for any single step of a scenario
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Heartbeat interval long enough that no beat is due during a test
pub const QUIET_HEARTBEAT: u64 = 45_000;

// ============================================================================
// Gateway
// ============================================================================

/// Websocket server standing in for the gateway
pub struct FakeGateway {
    listener: TcpListener,
    url: String,
}

impl FakeGateway {
    pub async fn bind() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let url = format!("ws://{}", listener.local_addr()?);
        Ok(Self { listener, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Accept the next client and greet it with HELLO
    pub async fn accept(&self, heartbeat_interval: u64) -> Result<GatewayPeer> {
        let (stream, _) = timeout(STEP_TIMEOUT, self.listener.accept()).await??;
        let ws = tokio_tungstenite::accept_async(stream).await?;
        let mut peer = GatewayPeer {
            ws,
            sequence: 0,
            ack_heartbeats: true,
            heartbeats: 0,
        };
        peer.send(&GatewayMessage::hello(heartbeat_interval)).await?;
        Ok(peer)
    }

    /// No client connects within `wait`
    pub async fn stays_idle(&self, wait: Duration) -> bool {
        timeout(wait, self.listener.accept()).await.is_err()
    }
}

/// What the client sent next
#[derive(Debug)]
pub enum Frame {
    Message(GatewayMessage),
    Closed(Option<u16>),
}

/// Server side of one client connection
pub struct GatewayPeer {
    ws: WebSocketStream<TcpStream>,
    sequence: u64,
    ack_heartbeats: bool,
    heartbeats: usize,
}

impl GatewayPeer {
    /// Stop acknowledging heartbeats, turning the connection into a zombie
    pub fn ignore_heartbeats(&mut self) {
        self.ack_heartbeats = false;
    }

    /// Heartbeats received so far
    pub fn heartbeats(&self) -> usize {
        self.heartbeats
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number the next dispatch after `sequence`, as a resumed session does
    pub fn continue_from(&mut self, sequence: u64) {
        self.sequence = sequence;
    }

    pub async fn send(&mut self, message: &GatewayMessage) -> Result<()> {
        self.ws.send(Message::Text(message.to_json()?)).await?;
        Ok(())
    }

    /// Send a dispatch with the next sequence number
    pub async fn dispatch(&mut self, name: &str, data: Value) -> Result<u64> {
        self.sequence += 1;
        self.send(&GatewayMessage::dispatch(name, self.sequence, data)).await?;
        Ok(self.sequence)
    }

    /// Next non-heartbeat frame from the client
    pub async fn next_frame(&mut self) -> Result<Frame> {
        loop {
            match timeout(STEP_TIMEOUT, self.ws.next()).await? {
                Some(Ok(Message::Text(text))) => {
                    let message = GatewayMessage::from_json(&text)?;
                    if message.op == OpCode::Heartbeat {
                        self.heartbeats += 1;
                        if self.ack_heartbeats {
                            self.send(&GatewayMessage::heartbeat_ack()).await?;
                        }
                        continue;
                    }
                    return Ok(Frame::Message(message));
                }
                Some(Ok(Message::Close(frame))) => {
                    return Ok(Frame::Closed(frame.map(|frame| u16::from(frame.code))));
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => return Err(err.into()),
                None => return Ok(Frame::Closed(None)),
            }
        }
    }

    pub async fn expect(&mut self, op: OpCode) -> Result<GatewayMessage> {
        match self.next_frame().await? {
            Frame::Message(message) => {
                ensure!(message.op == op, "expected {op}, received {}", message.op);
                Ok(message)
            }
            Frame::Closed(code) => bail!("expected {op}, connection closed with {code:?}"),
        }
    }

    /// Wait for the client's close frame, skipping anything sent before it
    pub async fn expect_close(&mut self) -> Result<Option<u16>> {
        loop {
            if let Frame::Closed(code) = self.next_frame().await? {
                return Ok(code);
            }
        }
    }

    pub async fn close(&mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: "".into(),
        };
        self.ws.close(Some(frame)).await?;
        Ok(())
    }

    /// Read IDENTIFY and answer with READY
    pub async fn identify(&mut self, session_id: &str, guild_ids: &[u64]) -> Result<IdentifyPayload> {
        let identify = self.expect(OpCode::Identify).await?;
        let payload = identify
            .as_identify()
            .ok_or_else(|| anyhow::anyhow!("IDENTIFY without payload"))?;
        self.dispatch("READY", crate::fixtures::ready(session_id, guild_ids)).await?;
        Ok(payload)
    }
}

// ============================================================================
// REST
// ============================================================================

/// One request the transport received
#[derive(Debug, Clone)]
pub struct SentRequest {
    pub method: Method,
    pub path: String,
    pub at: Instant,
}

/// Replays scripted responses per path; anything unscripted gets `200 {}`
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<RestResponse>>>,
    sent: Mutex<Vec<SentRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a response for the next request to `path`
    pub fn script(&self, path: &str, response: RestResponse) {
        self.scripts
            .lock()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.lock().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.sent.lock().iter().map(|sent| sent.path.clone()).collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> RestResult<RestResponse> {
        let path = request
            .url
            .strip_prefix(API_BASE)
            .unwrap_or(&request.url)
            .to_string();
        let response = self
            .scripts
            .lock()
            .get_mut(&path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| RestResponse::new(200, "{}"));
        self.sent.lock().push(SentRequest {
            method: request.method,
            path,
            at: Instant::now(),
        });
        Ok(response)
    }
}

// ============================================================================
// Client
// ============================================================================

/// Configuration pointing at a fake gateway, with fast retries
pub fn test_config(gateway_url: &str, shard_count: u32) -> ClientConfig {
    let mut config = ClientConfig::new(Token::parse(TEST_TOKEN).expect("valid test token"));
    config.gateway.url = Some(gateway_url.to_string());
    config.gateway.shard_count = Some(shard_count);
    config.gateway.identify_spacing = Duration::from_millis(20);
    config.gateway.connect_timeout = Duration::from_secs(2);
    config.gateway.hello_timeout = Duration::from_secs(2);
    config.gateway.backoff_base = Duration::from_millis(20);
    config.gateway.backoff_max = Duration::from_millis(100);
    config.gateway.guild_ready_timeout = Duration::from_secs(2);
    config.gateway.shard_restart_delay = Duration::from_millis(50);
    config.rest.api_base = API_BASE.to_string();
    config
}

/// Client talking to `gateway` and to a scripted REST transport
pub fn test_client(gateway: &FakeGateway, shard_count: u32) -> (Client, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new();
    let client = Client::with_transport(test_config(gateway.url(), shard_count), transport.clone());
    (client, transport)
}

/// Delivered events, in order
pub struct EventLog {
    rx: mpsc::UnboundedReceiver<DomainEvent>,
    seen: Vec<DomainEvent>,
}

impl EventLog {
    pub fn attach(client: &Client) -> Self {
        Self {
            rx: client.events().stream(),
            seen: Vec::new(),
        }
    }

    /// Wait for the next event of `kind`
    pub async fn next_of(&mut self, kind: EventKind) -> Result<DomainEvent> {
        loop {
            let Some(event) = timeout(STEP_TIMEOUT, self.rx.recv()).await? else {
                bail!("event stream closed while waiting for {kind:?}");
            };
            self.seen.push(event.clone());
            if event.kind() == kind {
                return Ok(event);
            }
        }
    }

    /// Every event received so far
    pub fn seen(&self) -> &[DomainEvent] {
        &self.seen
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.seen.iter().filter(|event| event.kind() == kind).count()
    }
}
