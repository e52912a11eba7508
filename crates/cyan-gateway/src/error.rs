//! Gateway error types

use crate::intents::Intents;
use std::sync::Arc;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors surfaced by the gateway client
///
/// Cloneable so every caller waiting on a session sees the error that ended it.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// `connect()` was called while a session is already running
    #[error("Gateway is already connected")]
    AlreadyConnected,

    /// `disconnect()` was called with no running session
    #[error("Gateway is not connected")]
    NotConnected,

    /// A new intent was requested after identification
    #[error("Cannot subscribe to {event} after connecting: intent {intent:?} was not negotiated")]
    CannotSubscribeAfterConnect {
        event: &'static str,
        intent: Intents,
    },

    /// Inbound frame could not be decoded
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Server closed the connection with a code that does not allow resuming
    #[error("Gateway closed the connection (code {code:?}): {reason}")]
    NonResumableDisconnect { code: Option<u16>, reason: String },

    /// Every attempt to reopen the socket for a resume failed
    #[error("Failed to resume session after {attempts} attempts: {last_error}")]
    ResumeFailed { attempts: u32, last_error: String },

    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(#[source] Arc<tungstenite::Error>),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[source] Arc<reqwest::Error>),

    /// OpenAPI returned an error body
    #[error("OpenAPI error {code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },

    /// `GET /gateway` returned something other than `{ "url": ... }`
    #[error("Invalid gateway response: {0}")]
    InvalidGatewayResponse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[source] Arc<serde_json::Error>),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tungstenite::Error> for GatewayError {
    fn from(e: tungstenite::Error) -> Self {
        Self::WebSocket(Arc::new(e))
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(Arc::new(e))
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(Arc::new(e))
    }
}

/// Gateway result type
pub type GatewayResult<T> = Result<T, GatewayError>;
