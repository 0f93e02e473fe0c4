// One-shot device state fetches.
//
// `GET /api/switch/{name}` hydrates a single device after an `add`
// notification; `GET /api/switches` returns everything the hub knows.
// No retry policy lives here — the sync layer decides what a failed
// fetch means (the device simply stays absent).

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::model::Device;
use crate::transport::TransportConfig;

/// Read-only REST client for device state.
pub struct FetchClient {
    http: reqwest::Client,
    base_url: Url,
}

impl FetchClient {
    /// Create a new fetch client against the hub's base URL.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a fetch client with a pre-built `reqwest::Client`.
    ///
    /// Use this to share one HTTP client between fetch and command sides.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            http,
            base_url: ensure_trailing_slash(base_url),
        }
    }

    /// The hub base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetch the full serialized state of a single device by name.
    pub async fn get(&self, name: &str) -> Result<Device, Error> {
        let url = self.base_url.join(&format!("api/switch/{name}"))?;
        self.get_json(url).await
    }

    /// Fetch all devices currently registered with the hub, keyed by name.
    pub async fn list(&self) -> Result<HashMap<String, Device>, Error> {
        let url = self.base_url.join("api/switches")?;
        self.get_json(url).await
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;

        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Normalize a base URL so `Url::join` treats its path as a directory.
pub(crate) fn ensure_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
