// ── Notification application ──
//
// Translates push notifications into registry mutations. Notifications
// are applied serially in arrival order; only hydrates (fetches
// triggered by `add`) run as background tasks and may land late. The
// registry's generation guard makes late completions harmless.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::registry::RegistryStore;
use patchbay_api::model::Notification;
use patchbay_api::FetchClient;

/// Applies notifications to the registry, hydrating on demand.
pub(crate) struct SyncEngine {
    registry: Arc<RegistryStore>,
    fetch: Arc<FetchClient>,
    /// Bound to client teardown: cancels in-flight hydrates so no
    /// fetch completion outlives the client.
    cancel: CancellationToken,
}

impl SyncEngine {
    pub(crate) fn new(
        registry: Arc<RegistryStore>,
        fetch: Arc<FetchClient>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            fetch,
            cancel,
        }
    }

    /// Apply one notification. Synchronous except for `add`, which
    /// spawns a hydrate task.
    pub(crate) fn apply(&self, note: Notification) {
        match note {
            Notification::Add { device_name } => self.hydrate(device_name),
            Notification::Remove { device_name } => {
                debug!(device = %device_name, "device removed");
                self.registry.remove(&device_name);
            }
            Notification::Update {
                device_name,
                device,
            } => {
                if !self.registry.replace(&device_name, device) {
                    debug!(device = %device_name, "update for unknown device ignored");
                }
            }
        }
    }

    /// Fetch a device's full state and insert it into the registry.
    ///
    /// The generation counter is captured before the fetch starts; if a
    /// `remove` (or disconnect) intervenes, the result is discarded. A
    /// failed fetch only logs — the device stays absent until the hub
    /// announces it again.
    fn hydrate(&self, name: String) {
        if self.registry.contains(&name) {
            return;
        }

        let generation = self.registry.generation(&name);
        let registry = Arc::clone(&self.registry);
        let fetch = Arc::clone(&self.fetch);
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                result = fetch.get(&name) => match result {
                    Ok(device) => {
                        if registry.insert_hydrated(device, generation) {
                            debug!(device = %name, "device hydrated");
                        }
                    }
                    Err(e) => {
                        warn!(device = %name, error = %e, "hydrate failed, device stays absent");
                    }
                }
            }
        });
    }
}
