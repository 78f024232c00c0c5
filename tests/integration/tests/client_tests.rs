//! Client tests spanning REST and the gateway
//!
//! REST goes through a scripted transport; the gateway is a scripted
//! websocket server on localhost.
//!
//! Run with: cargo test -p integration-tests --test client_tests

use std::time::Duration;

use hearth::{Client, ClientError};
use hearth_core::Snowflake;
use hearth_gateway::OpCode;
use hearth_rest::{CreateMessage, RestResponse};
use integration_tests::*;
use serde_json::json;
use tokio::time::timeout;

// ============================================================================
// Login and gateway discovery
// ============================================================================

#[tokio::test]
async fn test_connect_uses_recommended_shard_count() {
    let gateway = FakeGateway::bind().await.unwrap();
    let transport = ScriptedTransport::new();
    transport.script(
        "/gateway/bot",
        RestResponse::new(
            200,
            json!({
                "url": "wss://unused.example",
                "shards": 2,
                "session_start_limit": { "total": 1000, "remaining": 998, "reset_after": 0, "max_concurrency": 1 },
            })
            .to_string(),
        ),
    );
    let mut config = test_config(gateway.url(), 1);
    config.gateway.shard_count = None;
    let client = Client::with_transport(config, transport.clone());

    let manager = client.connect().await.unwrap();
    assert_eq!(manager.shard_count(), 2);
    assert_eq!(transport.paths(), vec!["/gateway/bot"]);

    // The configured URL wins over the recommended one
    let mut shards = Vec::new();
    for _ in 0..2 {
        let mut peer = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
        let identify = peer.expect(OpCode::Identify).await.unwrap().as_identify().unwrap();
        shards.push(identify.shard);
    }
    shards.sort_unstable();
    assert_eq!(shards, vec![[0, 2], [1, 2]]);

    assert!(matches!(client.connect().await, Err(ClientError::AlreadyConnected)));
    client.shutdown().await;
}

#[tokio::test]
async fn test_rejected_token_never_opens_gateway() {
    let gateway = FakeGateway::bind().await.unwrap();
    let (client, transport) = test_client(&gateway, 1);
    transport.script(
        "/users/@me",
        RestResponse::new(401, r#"{"message":"401: Unauthorized","code":0}"#),
    );

    assert!(matches!(client.login().await, Err(ClientError::AuthenticationFailed)));
    assert!(client.cache().current_user().is_none());
    assert!(client.shards().is_none());
    assert!(gateway.stays_idle(Duration::from_millis(200)).await);
}

// ============================================================================
// Rate limits
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_global_rate_limit_holds_other_buckets() {
    let transport = ScriptedTransport::new();
    transport.script("/channels/1", rate_limited(1.0, true));
    transport.script("/channels/1", RestResponse::new(200, text_channel(1, 10, "one").to_string()));
    transport.script("/channels/2", RestResponse::new(200, text_channel(2, 10, "two").to_string()));
    let client = Client::with_transport(test_config("ws://127.0.0.1:9", 1), transport.clone());

    let rest = client.rest().clone();
    let first = tokio::spawn(async move { rest.channel(Snowflake::new(1)).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = client.rest().channel(Snowflake::new(2)).await.unwrap();
    assert_eq!(second.name.as_deref(), Some("two"));
    assert_eq!(first.await.unwrap().unwrap().name.as_deref(), Some("one"));

    let sent = transport.sent();
    let limited = sent.iter().find(|s| s.path == "/channels/1").unwrap().at;
    let other = sent.iter().find(|s| s.path == "/channels/2").unwrap().at;
    assert!(other - limited >= Duration::from_secs(1));
    assert_eq!(sent.iter().filter(|s| s.path == "/channels/1").count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_route_limit_leaves_other_routes_alone() {
    let transport = ScriptedTransport::new();
    transport.script("/channels/1", rate_limited(5.0, false));
    transport.script("/channels/1", RestResponse::new(200, text_channel(1, 10, "one").to_string()));
    transport.script("/channels/2", RestResponse::new(200, text_channel(2, 10, "two").to_string()));
    let client = Client::with_transport(test_config("ws://127.0.0.1:9", 1), transport.clone());

    let rest = client.rest().clone();
    let first = tokio::spawn(async move { rest.channel(Snowflake::new(1)).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    client.rest().channel(Snowflake::new(2)).await.unwrap();
    first.await.unwrap().unwrap();

    let sent = transport.sent();
    let limited = sent.iter().find(|s| s.path == "/channels/1").unwrap().at;
    let other = sent.iter().find(|s| s.path == "/channels/2").unwrap().at;
    assert!(other - limited < Duration::from_secs(1));
    let retried = sent.iter().filter(|s| s.path == "/channels/1").nth(1).unwrap().at;
    assert!(retried - limited >= Duration::from_secs(5));
}

// ============================================================================
// Shared cache
// ============================================================================

#[tokio::test]
async fn test_rest_and_gateway_share_one_cache() {
    let gateway = FakeGateway::bind().await.unwrap();
    let (client, transport) = test_client(&gateway, 1);
    client.connect().await.unwrap();

    let mut peer = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
    peer.identify("session-1", &[10]).await.unwrap();
    peer.dispatch("GUILD_CREATE", guild(10, "Den", 3)).await.unwrap();
    timeout(STEP_TIMEOUT, client.wait_ready()).await.unwrap().unwrap();

    transport.script(
        "/channels/11",
        RestResponse::new(200, text_channel(11, 10, "renamed").to_string()),
    );
    client.rest().channel(Snowflake::new(11)).await.unwrap();
    let channel = client.cache().channel(Snowflake::new(11)).unwrap();
    assert_eq!(channel.name.as_deref(), Some("renamed"));
    assert_eq!(client.cache().guild_channels(Snowflake::new(10)).len(), 1);

    transport.script(
        "/channels/11/messages",
        RestResponse::new(200, message(100, 11, 10, SELF_ID, "hi").to_string()),
    );
    let body = CreateMessage {
        content: Some("hi".into()),
        ..CreateMessage::default()
    };
    let sent = client.rest().create_message(Snowflake::new(11), &body).await.unwrap();
    assert_eq!(sent.id, Snowflake::new(100));
    assert_eq!(
        client.cache().channel(Snowflake::new(11)).unwrap().last_message_id(),
        Some(Snowflake::new(100))
    );

    client.shutdown().await;
}
