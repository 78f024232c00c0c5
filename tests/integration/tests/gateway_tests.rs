//! Gateway session tests
//!
//! Each test runs the full client against a scripted websocket server on
//! localhost. No external services are needed.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use hearth_core::{DomainEvent, EventKind, Snowflake};
use hearth_gateway::{GatewayMessage, OpCode, RequestGuildMembersPayload, SessionState, VoiceStateUpdatePayload};
use integration_tests::*;
use serde_json::Value;
use tokio::time::timeout;

// ============================================================================
// Handshake
// ============================================================================

#[tokio::test]
async fn test_handshake_fills_cache_and_reports_ready() {
    let gateway = FakeGateway::bind().await.unwrap();
    let (client, _) = test_client(&gateway, 1);
    let mut events = EventLog::attach(&client);
    client.connect().await.unwrap();

    let mut peer = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
    let identify = peer.identify("session-1", &[10]).await.unwrap();
    assert_eq!(identify.token, TEST_TOKEN);
    assert_eq!(identify.shard, [0, 1]);
    peer.dispatch("GUILD_CREATE", guild(10, "Den", 3)).await.unwrap();

    let ready = events.next_of(EventKind::ShardReady).await.unwrap();
    assert!(matches!(
        ready,
        DomainEvent::ShardReady { shard_id: 0, ref unavailable_guilds } if unavailable_guilds.is_empty()
    ));
    timeout(STEP_TIMEOUT, client.wait_ready()).await.unwrap().unwrap();

    let kinds: Vec<EventKind> = events.seen().iter().map(DomainEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::ShardLaunched,
            EventKind::Ready,
            EventKind::GuildCreate,
            EventKind::ShardReady,
        ]
    );

    let cache = client.cache();
    let den = cache.guild(Snowflake::new(10)).unwrap();
    assert_eq!(den.name, "Den");
    assert_eq!(den.member_count, 3);
    assert_eq!(cache.channel(Snowflake::new(11)).unwrap().name.as_deref(), Some("general"));
    assert_eq!(cache.members(Snowflake::new(10)).len(), 1);
    assert_eq!(cache.guild_owner(Snowflake::new(10)).unwrap().id, Snowflake::new(SELF_ID));
    assert_eq!(cache.current_user().unwrap().username, "hearth");

    let (_, close) = tokio::join!(client.shutdown(), peer.expect_close());
    assert_eq!(close.unwrap(), Some(1000));
}

#[tokio::test]
async fn test_authentication_failure_stops_shard() {
    let gateway = FakeGateway::bind().await.unwrap();
    let (client, _) = test_client(&gateway, 1);
    let manager = client.connect().await.unwrap();
    let mut state = manager.handle(0).unwrap().subscribe_state();

    let mut peer = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
    peer.expect(OpCode::Identify).await.unwrap();
    peer.close(4004).await.unwrap();

    timeout(STEP_TIMEOUT, state.wait_for(|state| state.is_failed()))
        .await
        .unwrap()
        .unwrap();
    assert!(gateway.stays_idle(Duration::from_millis(300)).await);

    client.shutdown().await;
}

// ============================================================================
// Reconnect and resume
// ============================================================================

#[tokio::test]
async fn test_reconnect_request_resumes_session() {
    let gateway = FakeGateway::bind().await.unwrap();
    let (client, _) = test_client(&gateway, 1);
    let mut events = EventLog::attach(&client);
    client.connect().await.unwrap();

    let mut first = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
    first.identify("session-1", &[]).await.unwrap();
    events.next_of(EventKind::ShardReady).await.unwrap();
    first.dispatch("GUILD_CREATE", guild(10, "Den", 3)).await.unwrap();
    events.next_of(EventKind::GuildCreate).await.unwrap();

    first.send(&GatewayMessage::reconnect()).await.unwrap();
    assert_eq!(first.expect_close().await.unwrap(), Some(4000));

    let mut second = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
    let resume = second.expect(OpCode::Resume).await.unwrap().as_resume().unwrap();
    assert_eq!(resume.session_id, "session-1");
    assert_eq!(resume.seq, 2);
    assert_eq!(resume.token, TEST_TOKEN);

    second.continue_from(resume.seq);
    second.dispatch("RESUMED", Value::Null).await.unwrap();
    events.next_of(EventKind::Resumed).await.unwrap();

    // Resuming keeps what was cached before the drop
    assert!(client.cache().guild(Snowflake::new(10)).is_some());
    assert_eq!(events.count(EventKind::Ready), 1);
    assert_eq!(events.count(EventKind::ShardLaunched), 1);

    client.shutdown().await;
}

#[tokio::test]
async fn test_zombie_connection_reconnects_once() {
    let gateway = FakeGateway::bind().await.unwrap();
    let (client, _) = test_client(&gateway, 1);
    let mut events = EventLog::attach(&client);
    client.connect().await.unwrap();

    let mut first = gateway.accept(200).await.unwrap();
    first.ignore_heartbeats();
    first.identify("session-1", &[]).await.unwrap();
    assert_eq!(first.expect_close().await.unwrap(), Some(4000));

    let mut second = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
    let resume = second.expect(OpCode::Resume).await.unwrap().as_resume().unwrap();
    assert_eq!(resume.session_id, "session-1");
    assert_eq!(resume.seq, 1);
    second.continue_from(resume.seq);
    second.dispatch("RESUMED", Value::Null).await.unwrap();
    events.next_of(EventKind::Resumed).await.unwrap();

    assert!(gateway.stays_idle(Duration::from_millis(500)).await);
    assert_eq!(
        client.shards().unwrap().handle(0).unwrap().state(),
        SessionState::Connected
    );

    client.shutdown().await;
}

#[tokio::test]
async fn test_invalid_session_identifies_again_on_same_socket() {
    let gateway = FakeGateway::bind().await.unwrap();
    let (client, _) = test_client(&gateway, 1);
    let mut events = EventLog::attach(&client);
    client.connect().await.unwrap();

    let mut peer = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
    peer.identify("session-1", &[]).await.unwrap();
    events.next_of(EventKind::Ready).await.unwrap();

    peer.send(&GatewayMessage::invalid_session(false)).await.unwrap();
    peer.identify("session-2", &[]).await.unwrap();

    let ready = events.next_of(EventKind::Ready).await.unwrap();
    assert!(matches!(ready, DomainEvent::Ready { ref session_id, .. } if session_id == "session-2"));
    assert!(gateway.stays_idle(Duration::from_millis(200)).await);

    client.shutdown().await;
}

#[tokio::test]
async fn test_heartbeats_continue_while_identify_waits_for_slot() {
    let gateway = FakeGateway::bind().await.unwrap();
    let mut config = test_config(gateway.url(), 1);
    config.gateway.identify_spacing = Duration::from_millis(1500);
    let client = hearth::Client::with_transport(config, ScriptedTransport::new());
    let mut events = EventLog::attach(&client);
    client.connect().await.unwrap();

    let mut peer = gateway.accept(100).await.unwrap();
    peer.identify("session-1", &[]).await.unwrap();
    events.next_of(EventKind::Ready).await.unwrap();

    peer.send(&GatewayMessage::invalid_session(false)).await.unwrap();
    let before = peer.heartbeats();
    let waited = std::time::Instant::now();
    peer.identify("session-2", &[]).await.unwrap();

    assert!(waited.elapsed() >= Duration::from_millis(1000));
    assert!(peer.heartbeats() - before >= 5);
    events.next_of(EventKind::Ready).await.unwrap();

    client.shutdown().await;
}

// ============================================================================
// Sharding
// ============================================================================

#[tokio::test]
async fn test_shard_ignores_guilds_it_does_not_own() {
    const HOME: u64 = 5;
    const FOREIGN: u64 = 1 << 22;

    let gateway = FakeGateway::bind().await.unwrap();
    let (client, _) = test_client(&gateway, 2);
    let mut events = EventLog::attach(&client);
    client.connect().await.unwrap();

    let mut peers = Vec::new();
    for _ in 0..2 {
        let mut peer = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
        let identify = peer.expect(OpCode::Identify).await.unwrap().as_identify().unwrap();
        peers.push((identify.shard, peer));
    }
    peers.sort_by_key(|(shard, _)| shard[0]);
    assert_eq!(peers[0].0, [0, 2]);
    assert_eq!(peers[1].0, [1, 2]);

    let (_, shard_one) = &mut peers[1];
    shard_one.dispatch("READY", ready("session-b", &[])).await.unwrap();

    let (_, shard_zero) = &mut peers[0];
    shard_zero.dispatch("READY", ready("session-a", &[HOME])).await.unwrap();
    shard_zero.dispatch("GUILD_CREATE", guild(HOME, "Home", 2)).await.unwrap();
    shard_zero.dispatch("GUILD_CREATE", guild(FOREIGN, "Elsewhere", 2)).await.unwrap();
    shard_zero
        .dispatch("MESSAGE_CREATE", message(100, HOME + 1, HOME, 2, "hello"))
        .await
        .unwrap();

    events.next_of(EventKind::MessageCreate).await.unwrap();
    assert!(client.cache().guild(Snowflake::new(HOME)).is_some());
    assert!(client.cache().guild(Snowflake::new(FOREIGN)).is_none());
    assert!(events
        .seen()
        .iter()
        .all(|event| event.guild_id() != Some(Snowflake::new(FOREIGN))));

    let manager = client.shards().unwrap();
    assert_eq!(manager.shard_for(Snowflake::new(FOREIGN)).id().index(), 1);

    client.shutdown().await;
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_member_request_resolves_after_last_chunk() {
    let gateway = FakeGateway::bind().await.unwrap();
    let (client, _) = test_client(&gateway, 1);
    client.connect().await.unwrap();

    let mut peer = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
    peer.identify("session-1", &[10]).await.unwrap();
    peer.dispatch("GUILD_CREATE", guild(10, "Den", 3)).await.unwrap();
    timeout(STEP_TIMEOUT, client.wait_ready()).await.unwrap().unwrap();

    let done = client
        .request_guild_members(RequestGuildMembersPayload::all(Snowflake::new(10)))
        .unwrap();
    let request = peer.expect(OpCode::RequestGuildMembers).await.unwrap();
    let data = request.d.unwrap();
    assert_eq!(data["guild_id"], "10");
    let nonce = data["nonce"].as_str().unwrap().to_string();

    peer.dispatch("GUILD_MEMBERS_CHUNK", members_chunk(10, &[member(2, "ash", &[])], 0, 2, &nonce))
        .await
        .unwrap();
    peer.dispatch("GUILD_MEMBERS_CHUNK", members_chunk(10, &[member(3, "birch", &[])], 1, 2, &nonce))
        .await
        .unwrap();

    let summary = timeout(STEP_TIMEOUT, done).await.unwrap().unwrap();
    assert_eq!(summary.guild_id, Snowflake::new(10));
    assert_eq!(summary.nonce.as_deref(), Some(nonce.as_str()));
    assert_eq!(summary.user_ids.len(), 2);
    assert_eq!(client.cache().members(Snowflake::new(10)).len(), 3);
    assert_eq!(client.cache().user(Snowflake::new(3)).unwrap().username, "birch");

    client.shutdown().await;
}

#[tokio::test]
async fn test_voice_join_is_sent_by_owning_shard() {
    let gateway = FakeGateway::bind().await.unwrap();
    let (client, _) = test_client(&gateway, 1);
    client.connect().await.unwrap();

    let mut peer = gateway.accept(QUIET_HEARTBEAT).await.unwrap();
    peer.identify("session-1", &[]).await.unwrap();
    timeout(STEP_TIMEOUT, client.wait_ready()).await.unwrap().unwrap();

    client
        .update_voice_state(VoiceStateUpdatePayload::join(Snowflake::new(10), Snowflake::new(12)))
        .unwrap();
    let update = peer.expect(OpCode::VoiceStateUpdate).await.unwrap();
    let data = update.d.unwrap();
    assert_eq!(data["guild_id"], "10");
    assert_eq!(data["channel_id"], "12");

    client.leave_voice(Snowflake::new(10)).unwrap();
    let leave = peer.expect(OpCode::VoiceStateUpdate).await.unwrap();
    assert!(leave.d.unwrap()["channel_id"].is_null());

    client.shutdown().await;
}
