//! Control payload definitions
//!
//! Payloads carried by the handshake and hello frames.

use serde::{Deserialize, Serialize};

/// Payload for op 10 (ConnectionAck / Hello)
///
/// Sent by the server immediately after the socket opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// Payload for op 2 (Identify)
///
/// Sent by the client to open a new session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    /// Bot token, `Bot {app_id}.{token}`
    pub token: String,

    /// Bitmask of subscribed intents
    pub intents: u32,

    /// Shard this connection serves, `[index, count]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<[u32; 2]>,

    /// Client properties
    pub properties: IdentifyProperties,
}

/// Client connection properties
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    /// Operating system
    #[serde(rename = "$os", skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    /// Client library name
    #[serde(rename = "$browser", skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    /// Device name
    #[serde(rename = "$device", skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

impl IdentifyProperties {
    /// Create empty properties
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Properties describing this library on the current platform
    #[must_use]
    pub fn detect() -> Self {
        Self::new()
            .with_os(std::env::consts::OS)
            .with_browser(concat!("cyan-gateway/", env!("CARGO_PKG_VERSION")))
            .with_device("cyan-gateway")
    }

    /// Set operating system
    #[must_use]
    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }

    /// Set browser
    #[must_use]
    pub fn with_browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    /// Set device type
    #[must_use]
    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }
}

/// Payload for op 6 (Resume)
///
/// Sent by the client to reattach to a dropped session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    /// Bot token
    pub token: String,

    /// Session ID to resume
    pub session_id: String,

    /// Last received sequence number
    pub seq: i64,
}
