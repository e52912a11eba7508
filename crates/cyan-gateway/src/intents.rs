//! Gateway intents
//!
//! Intents select which event families the server pushes over a session. They are
//! negotiated once in the Identify payload and cannot be widened afterwards.

use crate::error::{GatewayError, GatewayResult};
use crate::events::EventDescriptor;
use bitflags::bitflags;

bitflags! {
    /// Event families a bot can subscribe to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Intents: u32 {
        /// Guild and channel lifecycle events
        const GUILDS = 1 << 0;
        /// Guild member join/update/leave events
        const GUILD_MEMBERS = 1 << 1;
        /// Message reaction events
        const GUILD_EXPRESSION = 1 << 10;
        /// Direct message events
        const DIRECT_MESSAGE = 1 << 12;
        /// Message audit results
        const MESSAGE_AUDIT = 1 << 27;
        /// Forum events
        const FORUM = 1 << 28;
        /// Audio events
        const VOICE = 1 << 29;
        /// Messages that mention the bot
        const MENTION = 1 << 30;
    }
}

impl Intents {
    /// Events every session receives without subscribing, such as `READY`
    pub const DEFAULT: Self = Self::empty();
}

/// Tracks the intents requested by registered events
///
/// The registry is sealed while a session is open: from then on only events whose
/// intent was already negotiated may be registered.
#[derive(Debug, Default)]
pub struct IntentRegistry {
    active: Intents,
    sealed: bool,
}

impl IntentRegistry {
    /// Create an empty, unsealed registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the intent an event needs
    ///
    /// Leaves the registry untouched when it fails.
    pub fn admit(&mut self, descriptor: &EventDescriptor) -> GatewayResult<()> {
        if self.sealed && !self.active.contains(descriptor.intent) {
            return Err(GatewayError::CannotSubscribeAfterConnect {
                event: descriptor.wire_name,
                intent: descriptor.intent,
            });
        }
        self.active |= descriptor.intent;
        Ok(())
    }

    /// Union of every active intent
    #[must_use]
    pub fn bitmask(&self) -> u32 {
        (self.active | Intents::DEFAULT).bits()
    }

    /// Active intents
    #[must_use]
    pub fn active(&self) -> Intents {
        self.active
    }

    /// Freeze the set of intents for the lifetime of a session
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Allow new intents again once the session is gone
    pub fn unseal(&mut self) {
        self.sealed = false;
    }
}
