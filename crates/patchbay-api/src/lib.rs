// patchbay-api: wire-level clients for a patch switch hub (REST + WebSocket)

pub mod command;
pub mod error;
pub mod fetch;
pub mod model;
pub mod stream;
pub mod transport;

pub use command::CommandClient;
pub use error::Error;
pub use fetch::FetchClient;
pub use model::{Device, Notification, Port, PortCommand, Terminal};
pub use stream::{ReconnectConfig, StreamEvent, StreamHandle};
