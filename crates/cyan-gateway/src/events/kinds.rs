//! Event catalogue

use super::models::{Channel, Guild, Member, Message, MessageAudit, Ready};
use super::{Decoded, Event};
use crate::intents::Intents;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::marker::PhantomData;

fn decode_as<T: DeserializeOwned>(raw: &Value) -> Result<Decoded<T>, serde_json::Error> {
    T::deserialize(raw).map(Decoded::Applicable)
}

macro_rules! event {
    ($(#[$doc:meta])* $name:ident, $wire:literal, $intent:expr, $payload:ty) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Event for $name {
            type Payload = $payload;
            const NAME: &'static str = $wire;
            const INTENT: Intents = $intent;

            fn decode(raw: &Value) -> Result<Decoded<Self::Payload>, serde_json::Error> {
                decode_as(raw)
            }
        }
    };
}

event!(
    /// Session established; carries the session id
    ReadyEvent, "READY", Intents::DEFAULT, Ready
);
event!(
    /// Session resumed after a reconnect
    ResumedEvent, "RESUMED", Intents::DEFAULT, Value
);
event!(
    /// Bot joined a guild
    GuildCreated, "GUILD_CREATE", Intents::GUILDS, Guild
);
event!(GuildUpdated, "GUILD_UPDATE", Intents::GUILDS, Guild);
event!(
    /// Bot left a guild or the guild was removed
    GuildDeleted, "GUILD_DELETE", Intents::GUILDS, Guild
);
event!(
    /// Someone joined a guild the bot is in
    MemberJoined, "GUILD_MEMBER_ADD", Intents::GUILD_MEMBERS, Member
);
event!(MemberUpdated, "GUILD_MEMBER_UPDATE", Intents::GUILD_MEMBERS, Member);
event!(MemberLeft, "GUILD_MEMBER_REMOVE", Intents::GUILD_MEMBERS, Member);
event!(
    /// A channel message that mentions the bot
    ChannelMessageReceived, "AT_MESSAGE_CREATE", Intents::MENTION, Message
);
event!(
    /// A direct message sent to the bot
    DirectMessageReceived, "DIRECT_MESSAGE_CREATE", Intents::DIRECT_MESSAGE, Message
);
event!(
    /// A message sent by the bot passed audit
    MessageAuditPassed, "MESSAGE_AUDIT_PASS", Intents::MESSAGE_AUDIT, MessageAudit
);
event!(
    /// A message sent by the bot was rejected by audit
    MessageAuditRejected, "MESSAGE_AUDIT_REJECT", Intents::MESSAGE_AUDIT, MessageAudit
);

// Channel events share their wire names with channel groups, which are skipped.
macro_rules! channel_event {
    ($(#[$doc:meta])* $name:ident, $wire:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Event for $name {
            type Payload = Channel;
            const NAME: &'static str = $wire;
            const INTENT: Intents = Intents::GUILDS;

            fn decode(raw: &Value) -> Result<Decoded<Self::Payload>, serde_json::Error> {
                decode_channel(raw)
            }
        }
    };
}

fn decode_channel(raw: &Value) -> Result<Decoded<Channel>, serde_json::Error> {
    let channel = Channel::deserialize(raw)?;
    if channel.is_group() {
        return Ok(Decoded::NotApplicable);
    }
    Ok(Decoded::Applicable(channel))
}

channel_event!(
    /// A channel was created in a guild
    ChannelCreated, "CHANNEL_CREATE"
);
channel_event!(ChannelUpdated, "CHANNEL_UPDATE");
channel_event!(ChannelDeleted, "CHANNEL_DELETE");

/// Any event, delivered with its undecoded payload
///
/// Useful for fields the typed payload does not model.
pub struct RawEvent<E>(PhantomData<fn() -> E>);

impl<E: Event> Event for RawEvent<E> {
    type Payload = Value;
    const NAME: &'static str = E::NAME;
    const INTENT: Intents = E::INTENT;

    fn decode(raw: &Value) -> Result<Decoded<Self::Payload>, serde_json::Error> {
        Ok(Decoded::Applicable(raw.clone()))
    }
}
