//! Test fixtures and frame builders
//!
//! Provides the server frames and dispatch payloads integration tests send.

use serde_json::{json, Value};

/// Hello frame
pub fn hello(heartbeat_interval_ms: u64) -> Value {
    json!({ "op": 10, "d": { "heartbeat_interval": heartbeat_interval_ms } })
}

/// Dispatch frame
pub fn dispatch(event_type: &str, seq: i64, data: Value) -> Value {
    json!({ "op": 0, "s": seq, "t": event_type, "d": data })
}

/// READY payload
pub fn ready(session_id: &str) -> Value {
    json!({
        "version": 1,
        "session_id": session_id,
        "user": { "id": "11586990140073229091", "username": "cyan-test", "bot": true },
        "shard": [0, 1]
    })
}

/// CHANNEL_* payload for a text channel
pub fn text_channel(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "guild_id": "2020131",
        "name": name,
        "type": 0,
        "sub_type": 0,
        "position": 1,
        "parent_id": "1111",
        "owner_id": "0"
    })
}

/// CHANNEL_* payload for a channel group
pub fn channel_group(id: &str) -> Value {
    json!({ "id": id, "guild_id": "2020131", "name": "group", "type": 4 })
}

/// AT_MESSAGE_CREATE payload
pub fn at_message(id: &str, content: &str) -> Value {
    json!({
        "id": id,
        "channel_id": "1234",
        "guild_id": "2020131",
        "content": content,
        "timestamp": "2021-11-24T10:43:12+08:00",
        "author": { "id": "42", "username": "alice", "bot": false },
        "seq": 3
    })
}
