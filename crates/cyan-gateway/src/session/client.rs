//! Gateway client
//!
//! The handle callers use to register handlers and drive the session lifecycle.

use super::config::GatewayConfig;
use super::driver::Driver;
use super::state::{SessionRecord, SessionState};
use crate::connection::{open_socket, HttpTransport, RestTransport};
use crate::dispatch::{panic_message, EventDispatcher, EventHandle};
use crate::error::{GatewayError, GatewayResult};
use crate::events::Event;
use crate::intents::Intents;
use cyan_common::AppConfig;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

/// Callback run once a session has been opened
pub type StartedHook =
    Arc<dyn Fn(GatewayClient) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Lifecycle operations hold this while they run
#[derive(Default)]
struct Control {
    task: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

struct Inner {
    transport: Arc<dyn RestTransport>,
    config: GatewayConfig,
    record: Arc<SessionRecord>,
    dispatcher: Arc<EventDispatcher<GatewayClient>>,
    control: Mutex<Control>,
    started: parking_lot::RwLock<Vec<StartedHook>>,
    /// `true` while a session task is alive
    running: watch::Sender<bool>,
    /// Error that ended the last session, reported to every `wait_until_stopped()`
    outcome: parking_lot::Mutex<Option<GatewayError>>,
}

/// Client for the bot gateway
///
/// Cheap to clone; every clone drives the same session. Handlers receive a clone
/// alongside each payload.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<Inner>,
}

impl GatewayClient {
    /// Create a client over the given transport
    pub fn new(transport: Arc<dyn RestTransport>, config: GatewayConfig) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                transport,
                config,
                record: Arc::new(SessionRecord::new()),
                dispatcher: Arc::new(EventDispatcher::new()),
                control: Mutex::new(Control::default()),
                started: parking_lot::RwLock::new(Vec::new()),
                running,
                outcome: parking_lot::Mutex::new(None),
            }),
        }
    }

    /// Create a client talking HTTPS to the configured OpenAPI
    pub fn from_config(config: &AppConfig) -> GatewayResult<Self> {
        let transport = HttpTransport::new(&config.bot)?;
        Ok(Self::new(Arc::new(transport), GatewayConfig::from(config)))
    }

    /// Registration handle for `E`
    ///
    /// Fails with [`GatewayError::CannotSubscribeAfterConnect`] when connected and
    /// `E` needs an intent that was not negotiated.
    pub fn get_event<E: Event>(&self) -> GatewayResult<EventHandle<E, GatewayClient>> {
        self.inner.dispatcher.get_or_create::<E>()
    }

    /// Bind a handler for `E`
    pub fn listen<E, F, Fut>(&self, handler: F) -> GatewayResult<()>
    where
        E: Event,
        F: Fn(Arc<E::Payload>, GatewayClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.get_event::<E>()?.bind(handler);
        Ok(())
    }

    /// Bind a handler for `E` that only needs the payload
    pub fn listen_payload<E, F, Fut>(&self, handler: F) -> GatewayResult<()>
    where
        E: Event,
        F: Fn(Arc<E::Payload>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.get_event::<E>()?.bind_payload(handler);
        Ok(())
    }

    /// Run `hook` after every successful [`connect`](Self::connect)
    ///
    /// Hooks run one after another; an error or panic in one is logged and the
    /// next still runs.
    pub fn on_started<F, Fut>(&self, hook: F)
    where
        F: Fn(GatewayClient) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let hook: StartedHook = Arc::new(move |client| hook(client).boxed());
        self.inner.started.write().push(hook);
    }

    /// Open the gateway session
    ///
    /// Returns once the socket is open and the started hooks have run;
    /// identification and the rest of the session run on a background task.
    pub async fn connect(&self) -> GatewayResult<()> {
        self.open_session().await?;
        self.run_started_hooks().await;
        Ok(())
    }

    async fn open_session(&self) -> GatewayResult<()> {
        let mut control = self.inner.control.lock().await;
        let record = &self.inner.record;

        // A task that just stopped fatally may still be publishing its outcome.
        if record.state() != SessionState::Disconnected || *self.inner.running.borrow() {
            return Err(GatewayError::AlreadyConnected);
        }

        record.set_state(SessionState::Connecting);
        let opened = async {
            let url = self.inner.transport.resolve_gateway_url().await?;
            let (sink, stream) = open_socket(&url).await?;
            Ok::<_, GatewayError>((url, sink, stream))
        }
        .await;

        let (url, sink, stream) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to connect to gateway");
                record.set_state(SessionState::Disconnected);
                return Err(e);
            }
        };

        tracing::info!(url = %url, "Connected to gateway");
        record.sequence().reset();
        record.set_gateway_url(url);
        record.set_connected(true);
        record.set_state(SessionState::AwaitingHello);
        self.inner.dispatcher.seal();
        *self.inner.outcome.lock() = None;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = Driver::new(
            Arc::clone(record),
            Arc::clone(&self.inner.dispatcher),
            self.clone(),
            self.inner.config.clone(),
            shutdown_rx,
        );

        self.inner.running.send_replace(true);
        let client = self.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = driver.run(sink, stream).await {
                *client.inner.outcome.lock() = Some(e);
            }
            client.inner.running.send_replace(false);
        });

        control.task = Some(task);
        control.shutdown = Some(shutdown_tx);
        Ok(())
    }

    async fn run_started_hooks(&self) {
        let hooks = self.inner.started.read().clone();
        for (index, hook) in hooks.into_iter().enumerate() {
            match AssertUnwindSafe(hook(self.clone())).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(hook = index, error = %e, "Started hook failed"),
                Err(panic) => tracing::warn!(
                    hook = index,
                    panic = panic_message(panic.as_ref()),
                    "Started hook panicked"
                ),
            }
        }
    }

    /// Close the session and forget its state
    pub async fn disconnect(&self) -> GatewayResult<()> {
        let mut control = self.inner.control.lock().await;
        let running = *self.inner.running.borrow();

        if !running && self.inner.record.state() == SessionState::Disconnected {
            return Err(GatewayError::NotConnected);
        }

        tracing::info!(session_id = ?self.inner.record.session_id(), "Disconnecting from gateway");

        if let Some(shutdown) = control.shutdown.take() {
            // The task may already have exited.
            let _ = shutdown.send(true);
        }

        if let Some(mut task) = control.task.take() {
            match tokio::time::timeout(self.inner.config.close_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Session task ended abnormally"),
                Err(_) => {
                    tracing::warn!("Session task did not stop in time, aborting");
                    task.abort();
                }
            }
        }

        self.inner.record.reset();
        self.inner.dispatcher.unseal();
        *self.inner.outcome.lock() = None;
        self.inner.running.send_replace(false);
        Ok(())
    }

    /// Wait for the running session to end
    ///
    /// Resolves with `Ok(())` after [`disconnect`](Self::disconnect) or when nothing is
    /// running, and with the error that ended the session otherwise. Every waiter,
    /// including later ones, sees that error until the next `connect()` or
    /// `disconnect()`. Resumes happen inside the session and do not end it.
    pub async fn wait_until_stopped(&self) -> GatewayResult<()> {
        let mut running = self.inner.running.subscribe();
        running
            .wait_for(|running| !*running)
            .await
            .map(|_| ())
            .map_err(|_| GatewayError::Internal("session state channel closed".to_string()))?;

        match self.inner.outcome.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Whether a socket is currently open
    pub fn is_connected(&self) -> bool {
        self.inner.record.is_connected()
    }

    /// Lifecycle state of the session
    pub fn state(&self) -> SessionState {
        self.inner.record.state()
    }

    /// Id assigned by the last `READY`
    pub fn session_id(&self) -> Option<String> {
        self.inner.record.session_id()
    }

    /// Highest sequence number received, `-1` before the first one
    pub fn last_sequence(&self) -> i64 {
        self.inner.record.sequence().current()
    }

    /// Intents requested by the registered events
    pub fn intents(&self) -> Intents {
        self.inner.dispatcher.intents()
    }

    /// Heartbeat interval announced by the server, zero before the first hello
    pub fn heartbeat_interval(&self) -> Duration {
        self.inner.record.heartbeat_interval()
    }

    /// Transport used for OpenAPI requests
    pub fn transport(&self) -> &Arc<dyn RestTransport> {
        &self.inner.transport
    }

    /// Settings the client was created with
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("state", &self.state())
            .field("session_id", &self.session_id())
            .field("last_sequence", &self.last_sequence())
            .field("intents", &self.intents())
            .finish_non_exhaustive()
    }
}
