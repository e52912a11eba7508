//! Session state
//!
//! The record shared between the client handle, the receive loop and the
//! heartbeat task.

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle state of a gateway session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No socket, nothing running
    Disconnected,
    /// Resolving the gateway or opening the socket
    Connecting,
    /// Socket open, waiting for the server hello
    AwaitingHello,
    /// Identify sent, waiting for `READY`
    Identifying,
    /// Resume sent, waiting for `RESUMED`
    Resuming,
    /// Session established
    Active,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingHello => "awaiting_hello",
            Self::Identifying => "identifying",
            Self::Resuming => "resuming",
            Self::Active => "active",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Highest sequence number seen in the current session
///
/// Starts at `-1` and never moves backwards.
#[derive(Debug)]
pub struct SequenceTracker {
    value: AtomicI64,
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: AtomicI64::new(-1),
        }
    }

    /// Record a sequence number from an inbound frame
    pub fn observe(&self, seq: i64) {
        self.value.fetch_max(seq, Ordering::AcqRel);
    }

    /// Current value, `-1` if nothing was observed
    #[must_use]
    pub fn current(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Last observed sequence number
    #[must_use]
    pub fn last(&self) -> Option<i64> {
        let value = self.current();
        (value >= 0).then_some(value)
    }

    pub fn reset(&self) {
        self.value.store(-1, Ordering::Release);
    }
}

/// Handshake to send once the server hello arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Open a new session
    Identify,
    /// Reattach to an existing one
    Resume { session_id: String },
}

impl Handshake {
    /// Resume when a session id is known, identify otherwise
    #[must_use]
    pub fn for_session(session_id: Option<String>) -> Self {
        match session_id {
            Some(session_id) => Self::Resume { session_id },
            None => Self::Identify,
        }
    }
}

/// Per-client session record
#[derive(Debug)]
pub struct SessionRecord {
    session_id: RwLock<Option<String>>,
    sequence: Arc<SequenceTracker>,
    connected: Arc<AtomicBool>,
    state: RwLock<SessionState>,
    heartbeat_interval_ms: AtomicU64,
    gateway_url: RwLock<Option<String>>,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRecord {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: RwLock::new(None),
            sequence: Arc::new(SequenceTracker::new()),
            connected: Arc::new(AtomicBool::new(false)),
            state: RwLock::new(SessionState::Disconnected),
            heartbeat_interval_ms: AtomicU64::new(0),
            gateway_url: RwLock::new(None),
        }
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    pub fn set_session_id(&self, session_id: impl Into<String>) {
        *self.session_id.write() = Some(session_id.into());
    }

    pub fn sequence(&self) -> &Arc<SequenceTracker> {
        &self.sequence
    }

    pub fn connected_flag(&self) -> &Arc<AtomicBool> {
        &self.connected
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    pub fn set_state(&self, state: SessionState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Session state changed");
        }
    }

    /// Interval negotiated by the last hello, zero before the first one
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.load(Ordering::Acquire))
    }

    pub fn set_heartbeat_interval(&self, interval: Duration) {
        let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self.heartbeat_interval_ms.store(millis, Ordering::Release);
    }

    /// Gateway URL resolved by the last `connect()`, reused when resuming
    pub fn gateway_url(&self) -> Option<String> {
        self.gateway_url.read().clone()
    }

    pub fn set_gateway_url(&self, url: impl Into<String>) {
        *self.gateway_url.write() = Some(url.into());
    }

    /// End of a session that cannot be resumed
    pub fn mark_stopped(&self) {
        *self.session_id.write() = None;
        self.set_connected(false);
        self.set_state(SessionState::Disconnected);
    }

    /// Forget everything about the session
    pub fn reset(&self) {
        self.mark_stopped();
        self.sequence.reset();
        self.heartbeat_interval_ms.store(0, Ordering::Release);
        *self.gateway_url.write() = None;
    }
}
