//! Resilient WebSocket push channel.
//!
//! Connects to the hub's `/ws` endpoint and streams decoded
//! [`Notification`]s plus connectivity transitions through a
//! [`tokio::sync::broadcast`] channel. Reconnects automatically with
//! exponential backoff until the cancellation token fires.
//!
//! The channel is strictly inbound: all mutation happens via REST.
//!
//! # Example
//!
//! ```rust,ignore
//! use patchbay_api::stream::{ws_url_for, ReconnectConfig, StreamEvent, StreamHandle};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let ws_url = ws_url_for(&"http://hub:7010".parse()?)?;
//!
//! let handle = StreamHandle::connect(ws_url, ReconnectConfig::default(), cancel.clone());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//!
//! handle.shutdown();
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::model::Notification;

// ── Broadcast channel capacity ───────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── StreamEvent ──────────────────────────────────────────────────────

/// An event delivered by the push channel.
///
/// `Open`/`Closed` bracket each established connection; consumers treat
/// `Closed` as "all device state unknown" and wait for the hub to replay
/// `add` notifications after the next `Open`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A connection to the hub was established.
    Open,
    /// An established connection dropped (clean close or error).
    Closed,
    /// A decoded device notification.
    Notification(Notification),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` (the default) means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── URL derivation ───────────────────────────────────────────────────

/// Derive the push channel URL from the hub base URL.
///
/// The WebSocket scheme mirrors the base scheme: `http` → `ws`,
/// `https` → `wss`. The endpoint is always `/ws`.
pub fn ws_url_for(base: &Url) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(Error::UnsupportedScheme(other.to_owned())),
    };

    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::UnsupportedScheme(base.scheme().to_owned()))?;
    url.set_path("/ws");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

// ── StreamHandle ─────────────────────────────────────────────────────

/// Handle to a running push channel.
///
/// Dropping the handle does not stop the background task; call
/// [`shutdown`](Self::shutdown) (or cancel the token) to tear it down.
pub struct StreamHandle {
    event_rx: broadcast::Receiver<StreamEvent>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Spawn the reconnection loop against the given WebSocket URL.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background. Subscribe to the event receiver to observe it.
    pub fn connect(ws_url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            ws_loop(ws_url, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// Multiple consumers can subscribe concurrently. A consumer that
    /// falls behind receives [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.event_rx.resubscribe()
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on drop, backoff → reconnect.
async fn ws_loop(
    ws_url: Url,
    event_tx: broadcast::Sender<StreamEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &event_tx, &cancel) => {
                match result {
                    // Clean disconnect (close frame or stream end).
                    // Reset the attempt counter, but still wait one
                    // initial delay: a hub in a restart loop would
                    // otherwise be hammered with instant reconnects.
                    Ok(()) => {
                        tracing::info!("push channel disconnected cleanly, reconnecting");
                        attempt = 0;

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(reconnect.initial_delay) => {}
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempt, "push channel error");

                        if let Some(max) = reconnect.max_retries {
                            if attempt >= max {
                                tracing::error!(
                                    max_retries = max,
                                    "push channel reconnection limit reached, giving up"
                                );
                                break;
                            }
                        }

                        let delay = backoff_delay(attempt, &reconnect);
                        tracing::debug!(
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            attempt,
                            "waiting before reconnect"
                        );

                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }

                        attempt = attempt.saturating_add(1);
                    }
                }
            }
        }
    }

    tracing::debug!("push channel loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket connection and read until it drops.
///
/// Emits `Open` after a successful handshake and `Closed` once the
/// connection terminates for any reason, so consumers see connectivity
/// transitions exactly once per established connection. A failed
/// handshake emits neither.
async fn connect_and_read(
    url: &Url,
    event_tx: &broadcast::Sender<StreamEvent>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::debug!(url = %url, "connecting to push channel");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("push channel connected");
    let _ = event_tx.send(StreamEvent::Open);

    // The channel is inbound-only; the write half is never used.
    let (_write, mut read) = ws_stream.split();

    let result = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        decode_and_send(&text, event_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pings automatically
                        tracing::trace!("push channel ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "push channel close frame received"
                            );
                        } else {
                            tracing::info!("push channel close frame received (no payload)");
                        }
                        break Ok(());
                    }
                    Some(Err(e)) => {
                        break Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        // Stream ended without a close frame
                        tracing::info!("push channel stream ended");
                        break Ok(());
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    };

    let _ = event_tx.send(StreamEvent::Closed);
    result
}

// ── Message decoding ─────────────────────────────────────────────────

/// Decode a text frame as a [`Notification`] and broadcast it.
///
/// Frames with an unknown or missing variant tag are dropped silently:
/// no state change, no error surfaced.
fn decode_and_send(text: &str, event_tx: &broadcast::Sender<StreamEvent>) {
    match serde_json::from_str::<Notification>(text) {
        Ok(note) => {
            // Send errors just mean there are no subscribers right now
            let _ = event_tx.send(StreamEvent::Notification(note));
        }
        Err(e) => {
            tracing::debug!(error = %e, "dropping undecodable push message");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with spread.
///
/// `delay = min(initial * 2^attempt, max) * spread`
///
/// The spread factor is +-25%, derived deterministically from the attempt
/// number so tests stay reproducible while clients still desynchronize.
fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    #[allow(clippy::cast_possible_wrap)]
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(24) as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    let spread = 1.0 + 0.25 * (f64::from(attempt) * 5.7).sin();
    Duration::from_secs_f64((capped * spread).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────
