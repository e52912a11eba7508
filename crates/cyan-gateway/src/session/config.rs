//! Gateway client configuration

use crate::protocol::IdentifyProperties;
use cyan_common::AppConfig;
use std::time::Duration;

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_RESUME_ATTEMPTS: u32 = 5;
const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for one gateway client
#[derive(Clone)]
pub struct GatewayConfig {
    /// Value of the Identify/Resume `token` field, `Bot {app_id}.{token}`
    pub token: String,
    /// Client properties sent with Identify
    pub properties: IdentifyProperties,
    /// Shard served by this client, `[index, count]`
    pub shard: Option<[u32; 2]>,
    /// Delay between attempts to reopen a dropped socket
    pub reconnect_delay: Duration,
    /// Attempts to reopen a dropped socket before giving up
    pub max_resume_attempts: u32,
    /// How long `disconnect()` waits for the session task to close the socket
    pub close_timeout: Duration,
}

impl GatewayConfig {
    /// Configuration with default timings
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            properties: IdentifyProperties::detect(),
            shard: None,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            max_resume_attempts: DEFAULT_MAX_RESUME_ATTEMPTS,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
        }
    }

    pub fn with_properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_shard(mut self, index: u32, count: u32) -> Self {
        self.shard = Some([index, count]);
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_max_resume_attempts(mut self, attempts: u32) -> Self {
        self.max_resume_attempts = attempts;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("token", &"<redacted>")
            .field("properties", &self.properties)
            .field("shard", &self.shard)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("max_resume_attempts", &self.max_resume_attempts)
            .field("close_timeout", &self.close_timeout)
            .finish()
    }
}

impl From<&AppConfig> for GatewayConfig {
    fn from(config: &AppConfig) -> Self {
        Self::new(config.bot.authorization())
            .with_reconnect_delay(Duration::from_millis(config.gateway.reconnect_delay_ms))
            .with_max_resume_attempts(config.gateway.max_resume_attempts)
            .with_close_timeout(Duration::from_millis(config.gateway.close_timeout_ms))
    }
}
