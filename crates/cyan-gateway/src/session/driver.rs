//! Session receive loop
//!
//! Owns the receive half of the socket for the lifetime of a logical session,
//! including every socket reopened to resume it.

use super::config::GatewayConfig;
use super::state::{Handshake, SessionRecord, SessionState};
use crate::connection::{open_socket, read_frame, FrameSink, FrameStream, Inbound};
use crate::dispatch::EventDispatcher;
use crate::error::{GatewayError, GatewayResult};
use crate::events::{Event, ReadyEvent, ResumedEvent};
use crate::heartbeat::{HeartbeatContext, HeartbeatScheduler};
use crate::protocol::{CloseCode, Envelope, IdentifyPayload, OpCode, ResumePayload};
use futures_util::Stream;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::{self, Message};

/// What the loop should do after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    /// Drop this socket and resume on a new one
    Reconnect,
}

/// Why a socket stopped being read
#[derive(Debug)]
enum SocketOutcome {
    /// `disconnect()` was requested
    Shutdown,
    /// The socket dropped in a way the session survives
    Resume(String),
    /// The session is over
    Fatal(GatewayError),
}

pub(crate) struct Driver<C> {
    record: Arc<SessionRecord>,
    dispatcher: Arc<EventDispatcher<C>>,
    client: C,
    config: GatewayConfig,
    shutdown: watch::Receiver<bool>,
    heartbeat: HeartbeatScheduler,
    failures_tx: mpsc::UnboundedSender<GatewayError>,
    failures_rx: mpsc::UnboundedReceiver<GatewayError>,
}

impl<C> Driver<C>
where
    C: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        record: Arc<SessionRecord>,
        dispatcher: Arc<EventDispatcher<C>>,
        client: C,
        config: GatewayConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (failures_tx, failures_rx) = mpsc::unbounded_channel();
        Self {
            record,
            dispatcher,
            client,
            config,
            shutdown,
            heartbeat: HeartbeatScheduler::new(),
            failures_tx,
            failures_rx,
        }
    }

    /// Run the session until `disconnect()` or a fatal error
    pub(crate) async fn run(
        mut self,
        sink: Arc<dyn FrameSink>,
        stream: FrameStream,
    ) -> GatewayResult<()> {
        let (mut sink, mut stream) = (sink, stream);
        let mut handshake = Handshake::Identify;

        loop {
            let outcome = self.run_socket(&sink, &mut stream, handshake).await;
            self.heartbeat.stop();
            if let Err(e) = sink.close().await {
                tracing::debug!(error = %e, "Error closing gateway socket");
            }

            match outcome {
                SocketOutcome::Shutdown => {
                    tracing::info!("Gateway session stopped");
                    return Ok(());
                }
                SocketOutcome::Fatal(e) => return Err(self.stop_fatally(e)),
                SocketOutcome::Resume(reason) => {
                    tracing::info!(
                        reason = %reason,
                        session_id = ?self.record.session_id(),
                        seq = self.record.sequence().current(),
                        "Gateway connection lost, resuming"
                    );
                    // `connected` stays set while resuming.
                    self.record.set_state(SessionState::Connecting);

                    match self.reopen().await {
                        Ok(Some((new_sink, new_stream))) => {
                            sink = new_sink;
                            stream = new_stream;
                            self.record.set_state(SessionState::AwaitingHello);
                            handshake = Handshake::for_session(self.record.session_id());
                        }
                        Ok(None) => {
                            tracing::info!("Gateway session stopped while resuming");
                            return Ok(());
                        }
                        Err(e) => return Err(self.stop_fatally(e)),
                    }
                }
            }
        }
    }

    fn stop_fatally(&self, error: GatewayError) -> GatewayError {
        tracing::error!(error = %error, "Gateway session ended");
        self.record.mark_stopped();
        self.dispatcher.unseal();
        error
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    async fn run_socket<S>(
        &mut self,
        sink: &Arc<dyn FrameSink>,
        stream: &mut S,
        handshake: Handshake,
    ) -> SocketOutcome
    where
        S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        // Failures reported by a heartbeat on a previous socket.
        while self.failures_rx.try_recv().is_ok() {}

        let mut pending = Some(handshake);

        loop {
            if self.shutdown_requested() {
                return SocketOutcome::Shutdown;
            }

            tokio::select! {
                biased;

                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        return SocketOutcome::Shutdown;
                    }
                }

                Some(error) = self.failures_rx.recv() => {
                    return SocketOutcome::Resume(format!("heartbeat failed: {error}"));
                }

                inbound = read_frame(stream) => {
                    if let Some(outcome) = self.on_inbound(inbound, sink, &mut pending).await {
                        return outcome;
                    }
                }
            }
        }
    }

    async fn on_inbound(
        &mut self,
        inbound: Inbound,
        sink: &Arc<dyn FrameSink>,
        pending: &mut Option<Handshake>,
    ) -> Option<SocketOutcome> {
        match inbound {
            Inbound::Text(text) => {
                let envelope = match Envelope::decode(&text) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        tracing::warn!(frame = %text, "Received malformed frame");
                        return Some(SocketOutcome::Fatal(e));
                    }
                };

                match self.handle_envelope(envelope, sink, pending).await {
                    Ok(Flow::Continue) => None,
                    Ok(Flow::Reconnect) => Some(SocketOutcome::Resume(
                        "server requested reconnect".to_string(),
                    )),
                    Err(e @ GatewayError::WebSocket(_)) => {
                        Some(SocketOutcome::Resume(e.to_string()))
                    }
                    Err(e) => Some(SocketOutcome::Fatal(e)),
                }
            }
            Inbound::Closed(Some((code, reason))) => {
                let known = CloseCode::from_u16(code);
                if CloseCode::is_resumable_code(code) {
                    return Some(SocketOutcome::Resume(format!(
                        "closed with code {code} ({})",
                        known.map_or("unknown", CloseCode::description)
                    )));
                }
                let reason = match (reason.is_empty(), known) {
                    (true, Some(known)) => known.description().to_string(),
                    _ => reason,
                };
                Some(SocketOutcome::Fatal(GatewayError::NonResumableDisconnect {
                    code: Some(code),
                    reason,
                }))
            }
            Inbound::Closed(None) => Some(SocketOutcome::Resume(
                "closed without a close code".to_string(),
            )),
            Inbound::Error(e) => Some(SocketOutcome::Resume(e.to_string())),
            Inbound::Ended => Some(SocketOutcome::Resume("stream ended".to_string())),
        }
    }

    /// Handle one decoded frame
    pub(crate) async fn handle_envelope(
        &mut self,
        envelope: Envelope,
        sink: &Arc<dyn FrameSink>,
        pending: &mut Option<Handshake>,
    ) -> GatewayResult<Flow> {
        if let Some(seq) = envelope.s {
            self.record.sequence().observe(seq);
        }

        let Some(op) = envelope.opcode() else {
            tracing::debug!(op = envelope.op, "Ignoring unknown op code");
            return Ok(Flow::Continue);
        };
        tracing::trace!(frame = %envelope, "Frame received");

        match op {
            OpCode::Dispatch => self.on_dispatch(&envelope),
            OpCode::ConnectionAck => {
                self.on_hello(&envelope, sink);
                if let Some(handshake) = pending.take() {
                    self.send_handshake(handshake, sink).await?;
                }
            }
            OpCode::Heartbeat => {
                sink.send(&Envelope::heartbeat(self.record.sequence().last()))
                    .await?;
            }
            OpCode::Reconnect => {
                tracing::info!("Server requested reconnect");
                return Ok(Flow::Reconnect);
            }
            OpCode::HeartbeatAck => {
                tracing::trace!("Heartbeat acknowledged");
            }
            OpCode::InvalidSession => {
                tracing::warn!(
                    session_id = ?self.record.session_id(),
                    "Server reported an invalid session"
                );
            }
            OpCode::Identify | OpCode::Resume => {
                tracing::debug!(op = %op, "Ignoring client-only op code");
            }
        }

        Ok(Flow::Continue)
    }

    fn on_dispatch(&self, envelope: &Envelope) {
        let Some(event_type) = envelope.t.as_deref() else {
            tracing::warn!("Dispatch frame without an event type");
            return;
        };

        if event_type == ReadyEvent::NAME {
            match envelope.d.get("session_id").and_then(Value::as_str) {
                Some(session_id) => {
                    self.record.set_session_id(session_id);
                    tracing::info!(session_id = %session_id, "Gateway session ready");
                }
                None => tracing::warn!("READY without a session id"),
            }
            self.record.set_state(SessionState::Active);
        } else if event_type == ResumedEvent::NAME {
            self.record.set_state(SessionState::Active);
            tracing::info!(
                session_id = ?self.record.session_id(),
                seq = self.record.sequence().current(),
                "Gateway session resumed"
            );
        }

        self.dispatcher.dispatch(event_type, &envelope.d, &self.client);
    }

    fn on_hello(&mut self, envelope: &Envelope, sink: &Arc<dyn FrameSink>) {
        let Some(interval_ms) = envelope.hello().map(|hello| hello.heartbeat_interval) else {
            tracing::warn!("Hello frame without a heartbeat interval");
            return;
        };

        let interval = Duration::from_millis(interval_ms);
        self.record.set_heartbeat_interval(interval);
        self.heartbeat.start(
            interval,
            HeartbeatContext {
                sink: Arc::clone(sink),
                sequence: Arc::clone(self.record.sequence()),
                connected: Arc::clone(self.record.connected_flag()),
                failures: self.failures_tx.clone(),
            },
        );
    }

    async fn send_handshake(
        &self,
        handshake: Handshake,
        sink: &Arc<dyn FrameSink>,
    ) -> GatewayResult<()> {
        match handshake {
            Handshake::Identify => {
                let payload = IdentifyPayload {
                    token: self.config.token.clone(),
                    intents: self.dispatcher.intent_bitmask(),
                    shard: self.config.shard,
                    properties: self.config.properties.clone(),
                };
                let intents = payload.intents;
                sink.send(&Envelope::new(OpCode::Identify, serde_json::to_value(payload)?))
                    .await?;
                self.record.set_state(SessionState::Identifying);
                tracing::info!(intents, "Identify sent");
            }
            Handshake::Resume { session_id } => {
                let seq = self.record.sequence().last().unwrap_or(0);
                tracing::info!(session_id = %session_id, seq, "Sending resume");
                let payload = ResumePayload {
                    token: self.config.token.clone(),
                    session_id,
                    seq,
                };
                sink.send(&Envelope::new(OpCode::Resume, serde_json::to_value(payload)?))
                    .await?;
                self.record.set_state(SessionState::Resuming);
            }
        }
        Ok(())
    }

    /// Reopen the cached gateway URL, `None` if shutdown was requested meanwhile
    async fn reopen(&mut self) -> GatewayResult<Option<(Arc<dyn FrameSink>, FrameStream)>> {
        let url = self
            .record
            .gateway_url()
            .ok_or_else(|| GatewayError::Internal("no gateway URL to resume against".to_string()))?;

        let attempts = self.config.max_resume_attempts;
        let mut last_error = String::from("no attempt was made");

        for attempt in 1..=attempts {
            if self.shutdown_requested() {
                return Ok(None);
            }

            let opened = tokio::select! {
                biased;
                _ = self.shutdown.changed() => return Ok(None),
                opened = open_socket(&url) => opened,
            };

            match opened {
                Ok((sink, stream)) => {
                    tracing::info!(attempt, "Gateway socket reopened");
                    return Ok(Some((sink as Arc<dyn FrameSink>, stream)));
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "Failed to reopen gateway socket"
                    );
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                tokio::select! {
                    biased;
                    _ = self.shutdown.changed() => return Ok(None),
                    () = tokio::time::sleep(self.config.reconnect_delay) => {}
                }
            }
        }

        Err(GatewayError::ResumeFailed {
            attempts,
            last_error,
        })
    }
}
