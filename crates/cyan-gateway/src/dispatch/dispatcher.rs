//! Event dispatcher
//!
//! Routes dispatch frames by wire name to every event type registered under it.

use super::handler::{ErasedEvent, EventHandle, EventSlot};
use crate::error::GatewayResult;
use crate::events::Event;
use crate::intents::{IntentRegistry, Intents};
use parking_lot::RwLock;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

struct Tables<C> {
    by_type: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    by_name: HashMap<&'static str, Vec<Arc<dyn ErasedEvent<C>>>>,
    intents: IntentRegistry,
}

/// Registered events and their handlers
///
/// `C` is the context handed to every handler alongside the payload, normally the
/// client that received the event.
pub struct EventDispatcher<C> {
    tables: RwLock<Tables<C>>,
}

impl<C> Default for EventDispatcher<C>
where
    C: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C> EventDispatcher<C>
where
    C: Clone + Send + Sync + 'static,
{
    /// Create an empty dispatcher
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                by_type: HashMap::new(),
                by_name: HashMap::new(),
                intents: IntentRegistry::new(),
            }),
        }
    }

    /// Get the registration handle for `E`, creating it on first use
    ///
    /// Creating an entry requests `E`'s intent, which fails once the intents are
    /// sealed unless that intent was already negotiated.
    pub fn get_or_create<E: Event>(&self) -> GatewayResult<EventHandle<E, C>> {
        if let Some(slot) = Self::lookup::<E>(&self.tables.read()) {
            return Ok(EventHandle::new(slot));
        }

        let mut tables = self.tables.write();
        // Another caller may have created it between the two locks.
        if let Some(slot) = Self::lookup::<E>(&tables) {
            return Ok(EventHandle::new(slot));
        }

        tables.intents.admit(&E::descriptor())?;

        let slot = Arc::new(EventSlot::<E, C>::new());
        tables
            .by_type
            .insert(TypeId::of::<E>(), Arc::clone(&slot) as Arc<dyn Any + Send + Sync>);
        tables
            .by_name
            .entry(E::NAME)
            .or_default()
            .push(Arc::clone(&slot) as Arc<dyn ErasedEvent<C>>);

        tracing::debug!(event = E::NAME, intent = ?E::INTENT, "Event registered");

        Ok(EventHandle::new(slot))
    }

    fn lookup<E: Event>(tables: &Tables<C>) -> Option<Arc<EventSlot<E, C>>> {
        tables
            .by_type
            .get(&TypeId::of::<E>())
            .cloned()
            .and_then(|slot| slot.downcast::<EventSlot<E, C>>().ok())
    }

    /// Hand a dispatch payload to every event registered under `event_type`
    ///
    /// Handlers run on their own tasks; this returns once they are spawned.
    pub fn dispatch(&self, event_type: &str, raw: &Value, client: &C) {
        let entries = self.tables.read().by_name.get(event_type).cloned();

        let Some(entries) = entries else {
            tracing::trace!(event = event_type, "No handlers registered for event");
            return;
        };

        for entry in entries {
            tracing::trace!(event = entry.descriptor().wire_name, "Distributing event");
            entry.distribute(raw, client);
        }
    }

    /// Union of the intents of every registered event
    #[must_use]
    pub fn intent_bitmask(&self) -> u32 {
        self.tables.read().intents.bitmask()
    }

    /// Intents of every registered event
    #[must_use]
    pub fn intents(&self) -> Intents {
        self.tables.read().intents.active()
    }

    /// Freeze the negotiated intents
    pub fn seal(&self) {
        self.tables.write().intents.seal();
    }

    /// Allow new intents again
    pub fn unseal(&self) {
        self.tables.write().intents.unseal();
    }
}
