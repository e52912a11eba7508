//! WebSocket close codes
//!
//! Close codes the bot gateway uses when it drops a connection.

/// Gateway WebSocket close codes
///
/// Codes outside this list are carried around as raw `u16` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum CloseCode {
    /// Invalid opcode sent
    InvalidOpcode = 4001,
    /// Invalid payload
    InvalidPayload = 4002,
    /// Session id is no longer valid
    InvalidSessionId = 4006,
    /// Invalid sequence number for Resume
    InvalidSequence = 4007,
    /// Frames sent too fast
    RateLimited = 4008,
    /// Session has timed out, reconnect and resume
    SessionTimeout = 4009,
    /// Invalid shard configuration
    InvalidShard = 4010,
    /// Too many guilds for a single connection
    ShardingRequired = 4011,
    /// Invalid gateway version
    InvalidVersion = 4012,
    /// Invalid intents
    InvalidIntents = 4013,
    /// Intents the bot is not permitted to use
    DisallowedIntents = 4014,
    /// Bot has been taken offline
    BotOffline = 4914,
    /// Bot has been banned
    BotBanned = 4915,
}

impl CloseCode {
    /// Create a `CloseCode` from a raw u16 value
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            4001 => Some(Self::InvalidOpcode),
            4002 => Some(Self::InvalidPayload),
            4006 => Some(Self::InvalidSessionId),
            4007 => Some(Self::InvalidSequence),
            4008 => Some(Self::RateLimited),
            4009 => Some(Self::SessionTimeout),
            4010 => Some(Self::InvalidShard),
            4011 => Some(Self::ShardingRequired),
            4012 => Some(Self::InvalidVersion),
            4013 => Some(Self::InvalidIntents),
            4014 => Some(Self::DisallowedIntents),
            4914 => Some(Self::BotOffline),
            4915 => Some(Self::BotBanned),
            _ => None,
        }
    }

    /// Get the raw u16 value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check if the session survives this close and may be resumed
    #[must_use]
    pub const fn is_resumable(self) -> bool {
        matches!(self, Self::SessionTimeout)
    }

    /// Classify a raw close code received from the server
    #[must_use]
    pub fn is_resumable_code(code: u16) -> bool {
        Self::from_u16(code).is_some_and(Self::is_resumable)
    }

    /// Get the description for this close code
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::InvalidOpcode => "Invalid opcode",
            Self::InvalidPayload => "Invalid payload",
            Self::InvalidSessionId => "Invalid session id",
            Self::InvalidSequence => "Invalid sequence number",
            Self::RateLimited => "Rate limited",
            Self::SessionTimeout => "Session timed out",
            Self::InvalidShard => "Invalid shard",
            Self::ShardingRequired => "Sharding required",
            Self::InvalidVersion => "Invalid gateway version",
            Self::InvalidIntents => "Invalid intents",
            Self::DisallowedIntents => "Intents not permitted",
            Self::BotOffline => "Bot is offline",
            Self::BotBanned => "Bot is banned",
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.description(), self.as_u16())
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.as_u16()
    }
}
