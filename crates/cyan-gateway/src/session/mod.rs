//! Gateway session
//!
//! Session lifecycle: connect, identify or resume, receive loop, disconnect.

mod client;
mod config;
mod driver;
mod state;

pub use client::{GatewayClient, StartedHook};
pub use config::GatewayConfig;
pub use state::{Handshake, SequenceTracker, SessionRecord, SessionState};
