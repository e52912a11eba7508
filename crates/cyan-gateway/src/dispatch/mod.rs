//! Event dispatch
//!
//! Maps dispatch frames to the typed handlers bound by the caller.

mod dispatcher;
mod handler;

pub use dispatcher::EventDispatcher;
pub use handler::{EventHandle, EventSlot, Handler};
pub(crate) use handler::panic_message;
