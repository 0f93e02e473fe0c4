// ── Core error types ──
//
// Domain-level errors for patchbay-core. Consumers never see raw HTTP
// status codes or JSON parse failures; the `From<patchbay_api::Error>`
// impl translates wire-layer errors into these variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to hub at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Hub disconnected")]
    HubDisconnected,

    // ── Lookup errors ────────────────────────────────────────────────
    #[error("Device not found: {name}")]
    DeviceNotFound { name: String },

    #[error("Port not found: {port} on device {device}")]
    PortNotFound { device: String, port: String },

    #[error("Terminal not found: {terminal} on port {port} of device {device}")]
    TerminalNotFound {
        device: String,
        port: String,
        terminal: String,
    },

    // ── Wire errors (wrapped, not exposed raw) ───────────────────────
    #[error("Hub API error: {message}")]
    Api {
        message: String,
        /// HTTP status code, if the hub answered at all.
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from wire-layer errors ────────────────────────────────

impl From<patchbay_api::Error> for CoreError {
    fn from(err: patchbay_api::Error) -> Self {
        match err {
            patchbay_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e.url().map(ToString::to_string).unwrap_or_default(),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            patchbay_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            patchbay_api::Error::UnsupportedScheme(scheme) => CoreError::Config {
                message: format!("Unsupported URL scheme: {scheme}"),
            },
            patchbay_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            patchbay_api::Error::Status { status, body } => CoreError::Api {
                message: body,
                status: Some(status),
            },
            patchbay_api::Error::Deserialization { message, body: _ } => CoreError::Api {
                message: format!("undecodable hub response: {message}"),
                status: None,
            },
            patchbay_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push channel failed: {reason}"),
            },
        }
    }
}
