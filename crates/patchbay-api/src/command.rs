// Outbound mutation requests.
//
// Commands never touch local state: the hub is the sole authority, and
// the resulting change comes back asynchronously as an `update`
// notification on the push channel. Callers that want fire-and-forget
// semantics wrap these calls and log the error.

use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::fetch::ensure_trailing_slash;
use crate::model::{PortCommand, Terminal};
use crate::transport::TransportConfig;

/// Write-side REST client for port/terminal mutations.
pub struct CommandClient {
    http: reqwest::Client,
    base_url: Url,
}

impl CommandClient {
    /// Create a new command client against the hub's base URL.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a command client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: ensure_trailing_slash(base_url),
        }
    }

    /// Submit the desired state of exactly one terminal within a port.
    ///
    /// The hub merges a single-terminal list into the port; the other
    /// terminals keep their current state.
    pub async fn set_terminal(
        &self,
        device_name: &str,
        port_name: &str,
        terminal_name: &str,
        state: bool,
    ) -> Result<(), Error> {
        self.put_port(
            device_name,
            port_name,
            vec![Terminal::new(terminal_name, state)],
        )
        .await
    }

    /// Submit a desired state for an explicit, complete terminal list.
    ///
    /// Used for exclusive selection, where every terminal's state is
    /// dictated in one request.
    pub async fn set_port(
        &self,
        device_name: &str,
        port_name: &str,
        terminals: Vec<Terminal>,
    ) -> Result<(), Error> {
        self.put_port(device_name, port_name, terminals).await
    }

    async fn put_port(
        &self,
        device_name: &str,
        port_name: &str,
        terminals: Vec<Terminal>,
    ) -> Result<(), Error> {
        let url = self
            .base_url
            .join(&format!("api/switch/{device_name}/port/{port_name}"))?;
        let body = PortCommand {
            name: port_name.to_owned(),
            terminals,
        };

        debug!("PUT {}", url);

        let resp = self
            .http
            .put(url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}
