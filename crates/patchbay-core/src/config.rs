// ── Runtime connection configuration ──
//
// Describes *how* to reach a hub. Built by the consumer (or by
// patchbay-config from a profile) and handed to `HubClient`; core never
// touches disk.

use std::time::Duration;

use url::Url;

use patchbay_api::stream::ReconnectConfig;
use patchbay_api::transport::{TlsMode, TransportConfig};

/// Configuration for connecting to a single hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Hub base URL (e.g., `http://127.0.0.1:7010`).
    pub url: Url,
    /// TLS verification strategy for HTTPS hubs.
    pub tls: TlsMode,
    /// REST request timeout.
    pub timeout: Duration,
    /// Delay before the connectivity indicator is considered settled
    /// after a connection opens.
    pub settle_delay: Duration,
    /// Push channel reconnection backoff.
    pub reconnect: ReconnectConfig,
}

impl HubConfig {
    /// Config for a hub at the given base URL, defaults elsewhere.
    pub fn for_url(url: Url) -> Self {
        Self {
            url,
            ..Self::default()
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: self.tls.clone(),
            timeout: self.timeout,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            // The hub's stock web server listens on 7010.
            url: Url::parse("http://127.0.0.1:7010").expect("static URL is valid"),
            tls: TlsMode::System,
            timeout: Duration::from_secs(10),
            settle_delay: Duration::from_millis(1500),
            reconnect: ReconnectConfig::default(),
        }
    }
}
