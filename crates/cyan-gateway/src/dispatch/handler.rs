//! Handler registration for a single event type

use crate::events::{Decoded, Event, EventDescriptor};
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// A bound callback: decoded payload plus the client that received it
pub type Handler<P, C> = Arc<dyn Fn(Arc<P>, C) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Handlers bound to one event type
pub struct EventSlot<E: Event, C> {
    handlers: RwLock<Vec<Handler<E::Payload, C>>>,
}

impl<E: Event, C> EventSlot<E, C> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }
}

/// Type-erased view of an [`EventSlot`], used to route by wire name
pub(crate) trait ErasedEvent<C>: Send + Sync {
    fn descriptor(&self) -> EventDescriptor;

    /// Decode `raw` for this event and spawn every bound handler
    fn distribute(&self, raw: &Value, client: &C);
}

impl<E, C> ErasedEvent<C> for EventSlot<E, C>
where
    E: Event,
    C: Clone + Send + Sync + 'static,
{
    fn descriptor(&self) -> EventDescriptor {
        E::descriptor()
    }

    fn distribute(&self, raw: &Value, client: &C) {
        let handlers = self.handlers.read().clone();
        if handlers.is_empty() {
            return;
        }

        let payload = match E::decode(raw) {
            Ok(Decoded::Applicable(payload)) => Arc::new(payload),
            Ok(Decoded::NotApplicable) => {
                tracing::trace!(event = E::NAME, "Payload not applicable, skipping");
                return;
            }
            Err(e) => {
                tracing::warn!(event = E::NAME, error = %e, "Failed to decode event payload");
                return;
            }
        };

        for handler in handlers {
            spawn_handler(E::NAME, handler, Arc::clone(&payload), client.clone());
        }
    }
}

/// Run one handler invocation on its own task, reporting errors and panics
fn spawn_handler<P, C>(event: &'static str, handler: Handler<P, C>, payload: Arc<P>, client: C)
where
    P: Send + Sync + 'static,
    C: Send + 'static,
{
    tokio::spawn(async move {
        let invocation = AssertUnwindSafe(async move { handler(payload, client).await });
        match invocation.catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(event, error = %e, "Event handler returned an error");
            }
            Err(panic) => {
                tracing::warn!(
                    event,
                    panic = panic_message(panic.as_ref()),
                    "Event handler panicked"
                );
            }
        }
    });
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Registration handle for one event type
///
/// Handles are cheap to clone and refer to the same handler list.
pub struct EventHandle<E: Event, C> {
    slot: Arc<EventSlot<E, C>>,
}

impl<E: Event, C> Clone for EventHandle<E, C> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<E, C> EventHandle<E, C>
where
    E: Event,
    C: Send + 'static,
{
    pub(crate) fn new(slot: Arc<EventSlot<E, C>>) -> Self {
        Self { slot }
    }

    /// Bind a handler receiving the payload and the client
    pub fn bind<F, Fut>(&self, handler: F) -> &Self
    where
        F: Fn(Arc<E::Payload>, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: Handler<E::Payload, C> =
            Arc::new(move |payload, client| handler(payload, client).boxed());
        self.slot.handlers.write().push(handler);
        self
    }

    /// Bind a handler that only needs the payload
    pub fn bind_payload<F, Fut>(&self, handler: F) -> &Self
    where
        F: Fn(Arc<E::Payload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.bind(move |payload, _client| handler(payload))
    }

    /// Number of bound handlers
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.slot.handlers.read().len()
    }
}
