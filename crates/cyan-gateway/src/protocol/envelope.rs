//! Gateway frame format
//!
//! Every frame on the socket is a JSON object `{"op", "d", "s", "t"}`.

use super::{HelloPayload, OpCode};
use crate::error::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single gateway frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Raw operation code; unknown values are kept as-is
    pub op: u64,

    /// Sequence number (server dispatches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<i64>,

    /// Event type (server dispatches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Payload; omitted on the wire when empty
    #[serde(default, skip_serializing_if = "is_empty_payload")]
    pub d: Value,
}

/// `null`, `{}`, `[]` and `""` are sent as an absent `d`.
fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

impl Envelope {
    /// Build an outbound frame
    #[must_use]
    pub fn new(op: OpCode, d: Value) -> Self {
        Self {
            op: u64::from(op.as_u8()),
            s: None,
            t: None,
            d,
        }
    }

    /// Heartbeat carrying the last sequence number seen, `null` if none yet
    #[must_use]
    pub fn heartbeat(last_sequence: Option<i64>) -> Self {
        Self::new(OpCode::Heartbeat, last_sequence.map_or(Value::Null, Value::from))
    }

    /// The known op code, or `None` for values this client does not handle
    #[must_use]
    pub fn opcode(&self) -> Option<OpCode> {
        u8::try_from(self.op).ok().and_then(OpCode::from_u8)
    }

    /// Encode to a text frame
    pub fn encode(&self) -> GatewayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a text frame
    ///
    /// Fails with [`GatewayError::MalformedFrame`] when the text is not JSON or has no
    /// integer `op`.
    pub fn decode(frame: &str) -> GatewayResult<Self> {
        serde_json::from_str(frame).map_err(|e| GatewayError::MalformedFrame(e.to_string()))
    }

    /// Payload of a hello frame, `None` when `d` is not one
    #[must_use]
    pub fn hello(&self) -> Option<HelloPayload> {
        HelloPayload::deserialize(&self.d).ok()
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.opcode() {
            Some(op) => write!(f, "Envelope(op={op}")?,
            None => write!(f, "Envelope(op=unknown {})", self.op)?,
        }
        if let Some(t) = &self.t {
            write!(f, ", t={t}")?;
        }
        if let Some(s) = self.s {
            write!(f, ", s={s}")?;
        }
        write!(f, ")")
    }
}
