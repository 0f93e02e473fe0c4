// patchbay-core: client-side mirror and sync engine for patch switch hubs.

pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod select;
pub mod stream;

mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::HubClient;
pub use config::HubConfig;
pub use error::CoreError;
pub use registry::{Generation, RegistryStore};
pub use select::exclusive_select;
pub use stream::{DeviceStream, DeviceWatchStream};

// Wire types double as the domain model; re-export them at the root.
pub use patchbay_api::model::{Device, Notification, Port, PortCommand, Terminal};
