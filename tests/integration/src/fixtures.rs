//! Wire payload fixtures
//!
//! Builders for the JSON the service sends, kept minimal so each test shows
//! only the fields it cares about.

use reqwest::header::HeaderValue;
use serde_json::{json, Value};

use hearth_rest::RestResponse;

/// Id of the local user in every READY
pub const SELF_ID: u64 = 1;

pub fn user(id: u64, username: &str) -> Value {
    json!({ "id": id.to_string(), "username": username })
}

/// READY listing `guild_ids` as unavailable
pub fn ready(session_id: &str, guild_ids: &[u64]) -> Value {
    let guilds: Vec<Value> = guild_ids
        .iter()
        .map(|id| json!({ "id": id.to_string(), "unavailable": true }))
        .collect();
    json!({
        "session_id": session_id,
        "user": user(SELF_ID, "hearth"),
        "guilds": guilds,
    })
}

pub fn text_channel(id: u64, guild_id: u64, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "type": 0,
        "guild_id": guild_id.to_string(),
        "name": name,
        "position": 0,
    })
}

pub fn role(id: u64, name: &str, permissions: u64) -> Value {
    json!({
        "id": id.to_string(),
        "name": name,
        "permissions": permissions.to_string(),
        "position": 1,
    })
}

pub fn member(user_id: u64, username: &str, roles: &[u64]) -> Value {
    let roles: Vec<String> = roles.iter().map(ToString::to_string).collect();
    json!({
        "user": user(user_id, username),
        "roles": roles,
        "joined_at": "2024-01-01T00:00:00Z",
    })
}

/// Full GUILD_CREATE for an available guild
pub fn guild(id: u64, name: &str, member_count: u64) -> Value {
    json!({
        "id": id.to_string(),
        "name": name,
        "owner_id": SELF_ID.to_string(),
        "member_count": member_count,
        "roles": [role(id, "@everyone", 1024)],
        "channels": [text_channel(id + 1, id, "general")],
        "members": [member(SELF_ID, "hearth", &[])],
    })
}

pub fn members_chunk(guild_id: u64, members: &[Value], index: u32, count: u32, nonce: &str) -> Value {
    json!({
        "guild_id": guild_id.to_string(),
        "members": members,
        "chunk_index": index,
        "chunk_count": count,
        "nonce": nonce,
    })
}

pub fn message(id: u64, channel_id: u64, guild_id: u64, author: u64, content: &str) -> Value {
    json!({
        "id": id.to_string(),
        "channel_id": channel_id.to_string(),
        "guild_id": guild_id.to_string(),
        "author": user(author, "author"),
        "content": content,
        "timestamp": "2024-01-01T00:00:00Z",
    })
}

/// 429 with the retry hint in the body
pub fn rate_limited(retry_after: f64, global: bool) -> RestResponse {
    let body = json!({
        "message": "You are being rate limited.",
        "retry_after": retry_after,
        "global": global,
    });
    let response = RestResponse::new(429, body.to_string());
    if global {
        with_header(response, "x-ratelimit-global", "true")
    } else {
        response
    }
}

pub fn with_header(mut response: RestResponse, name: &'static str, value: &'static str) -> RestResponse {
    response.headers.insert(name, HeaderValue::from_static(value));
    response
}
