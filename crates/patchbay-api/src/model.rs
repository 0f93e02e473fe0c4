//! Wire types shared by the REST and WebSocket surfaces of a hub.
//!
//! The hub serializes with "omit empty" semantics, so every field except
//! the identifying `name` carries a serde default.

use serde::{Deserialize, Serialize};

// ── Device tree ──────────────────────────────────────────────────────

/// A patch/switch device as the hub serializes it.
///
/// `name` is the unique key within a hub; `index` is the display order
/// across devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,

    #[serde(default)]
    pub index: i64,

    #[serde(default)]
    pub ports: Vec<Port>,
}

/// A named group of terminals on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub name: String,

    /// Display order within the device.
    #[serde(default)]
    pub index: i64,

    #[serde(default)]
    pub terminals: Vec<Terminal>,
}

/// An individually toggleable contact within a port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    pub name: String,

    /// Display order within the port. Zero on the wire means "omitted".
    #[serde(default, skip_serializing_if = "index_is_omitted")]
    pub index: i64,

    #[serde(default)]
    pub state: bool,
}

impl Terminal {
    pub fn new(name: impl Into<String>, state: bool) -> Self {
        Self {
            name: name.into(),
            index: 0,
            state,
        }
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn index_is_omitted(index: &i64) -> bool {
    *index == 0
}

// ── Push notifications ───────────────────────────────────────────────

/// A server-pushed lifecycle/update event for a device.
///
/// The hub tags messages with a `name` field: `add` and `remove` carry
/// only the device name, `update` carries the full replacement device
/// tree. Payloads with an unknown or missing tag fail to decode and are
/// dropped by the stream layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum Notification {
    Add { device_name: String },
    Remove { device_name: String },
    Update { device_name: String, device: Device },
}

impl Notification {
    /// The device this notification refers to.
    pub fn device_name(&self) -> &str {
        match self {
            Self::Add { device_name }
            | Self::Remove { device_name }
            | Self::Update { device_name, .. } => device_name,
        }
    }
}

// ── Outbound commands ────────────────────────────────────────────────

/// PUT body for `/api/switch/{name}/port/{portName}`.
///
/// Carries the desired state for either a single terminal or an explicit
/// complete terminal list; the hub applies whatever subset it receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCommand {
    pub name: String,
    pub terminals: Vec<Terminal>,
}

// ── Tests ────────────────────────────────────────────────────────────
