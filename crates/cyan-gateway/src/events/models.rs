//! Event payload definitions
//!
//! Data structures carried in the `d` field of dispatch frames.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// === Connection Events ===

/// READY event payload
///
/// Sent after a successful Identify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ready {
    /// Gateway protocol version
    #[serde(default)]
    pub version: i32,

    /// Session ID for resuming
    pub session_id: String,

    /// The bot user
    pub user: User,

    /// Shard this session serves, `[index, count]`
    #[serde(default)]
    pub shard: Option<[u32; 2]>,
}

// === User Payload ===

/// User data included in events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

// === Guild Events ===

/// GUILD_CREATE / GUILD_UPDATE / GUILD_DELETE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guild {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub member_count: u64,
    #[serde(default)]
    pub max_members: u64,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<FixedOffset>>,
}

// === Channel Events ===

/// Channel kind, from the numeric `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Text,
    Voice,
    /// Channel group, a container for other channels
    Group,
    Live,
    Application,
    Forum,
    Other(u32),
}

impl ChannelType {
    #[must_use]
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => Self::Text,
            2 => Self::Voice,
            4 => Self::Group,
            10005 => Self::Live,
            10006 => Self::Application,
            10007 => Self::Forum,
            other => Self::Other(other),
        }
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Text => 0,
            Self::Voice => 2,
            Self::Group => 4,
            Self::Live => 10005,
            Self::Application => 10006,
            Self::Forum => 10007,
            Self::Other(value) => value,
        }
    }
}

impl Serialize for ChannelType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.as_u32())
    }
}

impl<'de> Deserialize<'de> for ChannelType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_u32)
    }
}

/// CHANNEL_CREATE / CHANNEL_UPDATE / CHANNEL_DELETE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub guild_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ChannelType,
    #[serde(default)]
    pub sub_type: u32,
    #[serde(default)]
    pub position: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default)]
    pub private_type: u32,
    #[serde(default)]
    pub speak_permission: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
}

impl Channel {
    /// Whether this is a channel group rather than a channel
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.kind == ChannelType::Group
    }
}

// === Member Events ===

/// GUILD_MEMBER_ADD / GUILD_MEMBER_UPDATE / GUILD_MEMBER_REMOVE payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub guild_id: String,
    pub user: User,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub op_user_id: Option<String>,
}

// === Message Events ===

/// Message payload for channel and direct messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,
    pub author: User,
    #[serde(default)]
    pub mentions: Vec<User>,
    #[serde(default)]
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_guild_id: Option<String>,
}

/// MESSAGE_AUDIT_PASS / MESSAGE_AUDIT_REJECT payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageAudit {
    pub audit_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub guild_id: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<FixedOffset>>,
}
