//! Gateway events
//!
//! An event type names one dispatch (`t`) the gateway pushes, the intent needed to
//! receive it, and how its raw payload is decoded.

mod kinds;
mod models;

use crate::intents::Intents;
use serde_json::Value;

pub use kinds::{
    ChannelCreated, ChannelDeleted, ChannelMessageReceived, ChannelUpdated, DirectMessageReceived,
    GuildCreated, GuildDeleted, GuildUpdated, MemberJoined, MemberLeft, MemberUpdated,
    MessageAuditPassed, MessageAuditRejected, RawEvent, ReadyEvent, ResumedEvent,
};
pub use models::{Channel, ChannelType, Guild, Member, Message, MessageAudit, Ready, User};

/// Wire name and intent of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventDescriptor {
    /// Value of the `t` field
    pub wire_name: &'static str,
    /// Intent that must be negotiated to receive it
    pub intent: Intents,
}

/// Outcome of decoding a raw dispatch payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded<T> {
    /// The payload belongs to this event
    Applicable(T),
    /// The payload shares the wire name but is not meant for this event
    NotApplicable,
}

impl<T> Decoded<T> {
    /// The payload, if it belongs to this event
    pub fn into_applicable(self) -> Option<T> {
        match self {
            Self::Applicable(payload) => Some(payload),
            Self::NotApplicable => None,
        }
    }
}

/// A typed gateway event
pub trait Event: Send + Sync + 'static {
    /// Decoded payload handed to handlers
    type Payload: Send + Sync + 'static;

    /// Value of the `t` field
    const NAME: &'static str;

    /// Intent that must be negotiated to receive this event
    const INTENT: Intents;

    /// Decode the raw `d` of a dispatch frame
    fn decode(raw: &Value) -> Result<Decoded<Self::Payload>, serde_json::Error>;

    /// Descriptor of this event
    fn descriptor() -> EventDescriptor {
        EventDescriptor {
            wire_name: Self::NAME,
            intent: Self::INTENT,
        }
    }
}
