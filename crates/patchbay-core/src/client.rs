// ── Hub client ──
//
// Full lifecycle management for one hub connection: the push channel,
// the registry mirror it drives, the connectivity flags the presentation
// layer renders, and the fire-and-forget command surface.

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HubConfig;
use crate::error::CoreError;
use crate::registry::RegistryStore;
use crate::select::exclusive_select;
use crate::stream::DeviceStream;
use crate::sync::SyncEngine;

use patchbay_api::model::Terminal;
use patchbay_api::stream::{ws_url_for, StreamEvent, StreamHandle};
use patchbay_api::{CommandClient, FetchClient};

/// The main entry point for consumers.
///
/// Cheaply cloneable. Owns the registry mirror and all background tasks;
/// the presentation layer subscribes to [`devices`](Self::devices) for
/// rendering and to [`connected`](Self::connected)/
/// [`settled`](Self::settled) for the connectivity indicator, and calls
/// the command methods on user gestures.
#[derive(Clone)]
pub struct HubClient {
    inner: Arc<HubClientInner>,
}

struct HubClientInner {
    config: HubConfig,
    registry: Arc<RegistryStore>,
    fetch: Arc<FetchClient>,
    command: CommandClient,
    connected: watch::Sender<bool>,
    settled: watch::Sender<bool>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl HubClient {
    /// Create a client from configuration. Does NOT connect — call
    /// [`connect()`](Self::connect) to open the push channel.
    pub fn new(config: HubConfig) -> Result<Self, CoreError> {
        // One HTTP client shared between the fetch and command sides.
        let http = config.transport().build_client()?;
        let fetch = Arc::new(FetchClient::with_client(http.clone(), config.url.clone()));
        let command = CommandClient::with_client(http, config.url.clone());

        let (connected, _) = watch::channel(false);
        let (settled, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(HubClientInner {
                config,
                registry: Arc::new(RegistryStore::new()),
                fetch,
                command,
                connected,
                settled,
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Access the client configuration.
    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    /// Access the registry mirror.
    pub fn registry(&self) -> &Arc<RegistryStore> {
        &self.inner.registry
    }

    /// Subscribe to the ordered device listing.
    pub fn devices(&self) -> DeviceStream {
        self.inner.registry.subscribe()
    }

    /// Observe push channel connectivity.
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.inner.connected.subscribe()
    }

    /// Observe the settled display flag: set a short while after a
    /// connection opens, cleared immediately on close.
    pub fn settled(&self) -> watch::Receiver<bool> {
        self.inner.settled.subscribe()
    }

    // ── Connection lifecycle ─────────────────────────────────────────

    /// Open the push channel and start mirroring.
    ///
    /// The hub replays `add` notifications for every registered device
    /// on each (re)connect, so the mirror self-populates; reconnection
    /// is automatic and unbounded until [`shutdown`](Self::shutdown).
    pub async fn connect(&self) -> Result<(), CoreError> {
        let ws_url = ws_url_for(&self.inner.config.url)?;

        let stream = StreamHandle::connect(
            ws_url,
            self.inner.config.reconnect.clone(),
            self.inner.cancel.child_token(),
        );

        let inner = Arc::clone(&self.inner);
        let rx = stream.subscribe();
        let handle = tokio::spawn(event_loop(inner, rx));
        self.inner.task_handles.lock().await.push(handle);

        info!(url = %self.inner.config.url, "hub client started");
        Ok(())
    }

    /// Tear down the push channel and all background tasks.
    ///
    /// In-flight hydrates and commands are cancelled; the mirror is
    /// cleared since its contents can no longer be trusted.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        let _ = self.inner.connected.send(false);
        let _ = self.inner.settled.send(false);
        self.inner.registry.clear();
        debug!("hub client shut down");
    }

    // ── Commands (fire-and-forget) ───────────────────────────────────

    /// Request one terminal's state. The mirror is not touched: the
    /// change only appears once the hub echoes an `update` notification.
    /// Failures are logged and never retried.
    pub fn set_terminal(&self, device: &str, port: &str, terminal: &str, state: bool) {
        let inner = Arc::clone(&self.inner);
        let (device, port, terminal) = (device.to_owned(), port.to_owned(), terminal.to_owned());

        self.spawn_command(async move {
            inner
                .command
                .set_terminal(&device, &port, &terminal, state)
                .await
        });
    }

    /// Request an explicit, complete terminal set for a port.
    pub fn set_port(&self, device: &str, port: &str, terminals: Vec<Terminal>) {
        let inner = Arc::clone(&self.inner);
        let (device, port) = (device.to_owned(), port.to_owned());

        self.spawn_command(async move { inner.command.set_port(&device, &port, terminals).await });
    }

    /// Activate exactly one terminal in a port, deactivating the others.
    ///
    /// Computes the full-port terminal set from the current mirror and
    /// submits it as a single whole-port command. Fails synchronously if
    /// the device, port, or terminal is not currently mirrored.
    pub fn select_exclusive(
        &self,
        device: &str,
        port: &str,
        terminal: &str,
    ) -> Result<(), CoreError> {
        let mirrored = self
            .inner
            .registry
            .get(device)
            .ok_or_else(|| CoreError::DeviceNotFound {
                name: device.to_owned(),
            })?;

        let mirrored_port = mirrored
            .ports
            .iter()
            .find(|p| p.name == port)
            .ok_or_else(|| CoreError::PortNotFound {
                device: device.to_owned(),
                port: port.to_owned(),
            })?;

        if !mirrored_port.terminals.iter().any(|t| t.name == terminal) {
            return Err(CoreError::TerminalNotFound {
                device: device.to_owned(),
                port: port.to_owned(),
                terminal: terminal.to_owned(),
            });
        }

        let terminals = exclusive_select(&mirrored_port.terminals, terminal);
        self.set_port(device, port, terminals);
        Ok(())
    }

    /// Run a command in the background, logging any failure. No retry,
    /// no registry change: the hub's `update` echo is the only source of
    /// mirrored state.
    fn spawn_command<F>(&self, fut: F)
    where
        F: std::future::Future<Output = Result<(), patchbay_api::Error>> + Send + 'static,
    {
        let cancel = self.inner.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                result = fut => {
                    if let Err(e) = result {
                        warn!(error = %e, "command failed");
                    }
                }
            }
        });
    }
}

// ── Event loop ───────────────────────────────────────────────────────

/// Consume push channel events and drive the registry.
///
/// Runs until shutdown. Each connection gets its own settle guard token
/// so a close always cancels the pending settle timer — the flag can
/// never be set by a connection that has already dropped.
async fn event_loop(inner: Arc<HubClientInner>, mut rx: broadcast::Receiver<StreamEvent>) {
    let engine = SyncEngine::new(
        Arc::clone(&inner.registry),
        Arc::clone(&inner.fetch),
        inner.cancel.clone(),
    );
    let mut settle_guard: Option<CancellationToken> = None;

    loop {
        tokio::select! {
            biased;
            _ = inner.cancel.cancelled() => break,
            event = rx.recv() => match event {
                Ok(StreamEvent::Open) => {
                    debug!("push channel open");
                    let _ = inner.connected.send(true);

                    let guard = inner.cancel.child_token();
                    if let Some(old) = settle_guard.replace(guard.clone()) {
                        old.cancel();
                    }
                    tokio::spawn(settle_after(
                        Arc::clone(&inner),
                        guard,
                        inner.config.settle_delay,
                    ));
                }
                Ok(StreamEvent::Closed) => {
                    debug!("push channel closed, clearing mirror");
                    if let Some(guard) = settle_guard.take() {
                        guard.cancel();
                    }
                    let _ = inner.connected.send(false);
                    let _ = inner.settled.send(false);
                    inner.registry.clear();
                }
                Ok(StreamEvent::Notification(note)) => engine.apply(note),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "event loop lagged behind the push channel");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

/// Set the settled flag once the delay elapses, unless the guard fires
/// first (connection closed or client shut down).
async fn settle_after(
    inner: Arc<HubClientInner>,
    guard: CancellationToken,
    delay: std::time::Duration,
) {
    tokio::select! {
        biased;
        _ = guard.cancelled() => {}
        _ = tokio::time::sleep(delay) => {
            let _ = inner.settled.send(true);
        }
    }
}
