use thiserror::Error;

/// Top-level error type for the `patchbay-api` crate.
///
/// Covers every failure mode of the wire layer: HTTP transport, hub
/// rejections, payload decoding, and the WebSocket push channel.
/// `patchbay-core` maps these into domain-level errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing or construction error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The hub base URL uses a scheme the push channel cannot mirror.
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// TLS setup error (bad CA certificate, client build failure).
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Hub responses ───────────────────────────────────────────────
    /// Non-success HTTP status from the hub, with the response body.
    #[error("Hub returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed or dropped with an error.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::WebSocketConnect(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the hub reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Status { status: 404, .. } => true,
            _ => false,
        }
    }
}
