//! Heartbeat scheduler
//!
//! Sends op 1 frames at the interval the server announced in its hello, carrying
//! the last sequence number seen.

use crate::connection::FrameSink;
use crate::error::GatewayError;
use crate::protocol::Envelope;
use crate::session::SequenceTracker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// What a running heartbeat needs from the session
#[derive(Clone)]
pub struct HeartbeatContext {
    /// Write half of the current socket
    pub sink: Arc<dyn FrameSink>,
    /// Sequence numbers seen by the receive loop
    pub sequence: Arc<SequenceTracker>,
    /// Whether the socket is usable
    pub connected: Arc<AtomicBool>,
    /// Where send failures are reported
    pub failures: mpsc::UnboundedSender<GatewayError>,
}

/// Periodic heartbeat task
///
/// At most one heartbeat runs at a time; starting again replaces the running one.
#[derive(Debug, Default)]
pub struct HeartbeatScheduler {
    task: Option<JoinHandle<()>>,
    interval: Option<Duration>,
}

impl HeartbeatScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start sending heartbeats every `interval`, the first one `interval` from now
    pub fn start(&mut self, interval: Duration, context: HeartbeatContext) {
        self.stop();

        if interval.is_zero() {
            tracing::warn!("Heartbeat interval is zero, not starting heartbeat");
            return;
        }

        tracing::debug!(interval_ms = interval.as_millis() as u64, "Heartbeat started");
        self.task = Some(tokio::spawn(run(interval, context)));
        self.interval = Some(interval);
    }

    /// Stop the heartbeat; a no-op when idle
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("Heartbeat stopped");
        }
        self.interval = None;
    }

    /// Whether a heartbeat task is running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Interval of the running heartbeat
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn run(period: Duration, context: HeartbeatContext) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if !context.connected.load(Ordering::Acquire) {
            tracing::trace!("Socket not connected, skipping heartbeat");
            continue;
        }

        let last_sequence = context.sequence.last();
        if let Err(e) = context.sink.send(&Envelope::heartbeat(last_sequence)).await {
            tracing::warn!(error = %e, "Failed to send heartbeat");
            // The receive loop may already be gone.
            let _ = context.failures.send(e);
            return;
        }

        tracing::trace!(seq = ?last_sequence, "Heartbeat sent");
    }
}
