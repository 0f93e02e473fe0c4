// ── Device registry ──
//
// The client's local mirror of known devices. Thread-safe storage with
// push-based change notification via a `watch` channel. The registry is
// the single owner of device lifetime on the client: devices appear via
// hydrate, are replaced wholesale by updates, and vanish on remove or
// disconnect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::stream::DeviceStream;
use patchbay_api::model::Device;

/// An opaque marker for "the registry's view of one name at one point in
/// time". Captured before a hydrate fetch starts; the fetch result is
/// applied only while the marker still matches, so a `remove` or a
/// disconnect `clear` in between discards the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    /// Advances on every `clear`, invalidating all names at once --
    /// including names that were never inserted.
    epoch: u64,

    /// Advances on every `remove` of this name.
    removals: u64,
}

/// In-memory mapping from device name to device state.
///
/// All mutating operations are idempotent guards against the races a
/// push-driven mirror sees: duplicate `add`s, `update`s for unknown
/// devices, `remove`s for devices that never hydrated. Each call that
/// actually changes state notifies subscribers exactly once.
pub struct RegistryStore {
    devices: DashMap<String, Arc<Device>>,

    /// Per-name removal counters; see [`Generation`]. Pruned on every
    /// `clear`, since the epoch bump already invalidates everything.
    removals: DashMap<String, u64>,

    /// Registry-wide clear epoch; see [`Generation`].
    clear_epoch: AtomicU64,

    /// Ordered snapshot, rebuilt on mutation for cheap subscription.
    snapshot: watch::Sender<Arc<Vec<Arc<Device>>>>,
}

impl RegistryStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            devices: DashMap::new(),
            removals: DashMap::new(),
            clear_epoch: AtomicU64::new(0),
            snapshot,
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Add a device. No-op if the name is already present, which absorbs
    /// duplicate-add races. Returns `true` if the device was added.
    pub fn insert(&self, device: Device) -> bool {
        if self.devices.contains_key(&device.name) {
            return false;
        }

        self.devices
            .insert(device.name.clone(), Arc::new(device));
        self.rebuild_snapshot();
        true
    }

    /// Add a hydrated device, unless its generation advanced since the
    /// hydrate began. Returns `true` if the device was added.
    pub fn insert_hydrated(&self, device: Device, generation: Generation) -> bool {
        if self.generation(&device.name) != generation {
            tracing::debug!(device = %device.name, "discarding stale hydrate result");
            return false;
        }
        self.insert(device)
    }

    /// Remove a device by name. No-op if absent. Bumps the name's
    /// removal counter so in-flight hydrates are invalidated.
    pub fn remove(&self, name: &str) -> Option<Arc<Device>> {
        *self.removals.entry(name.to_owned()).or_insert(0) += 1;

        let removed = self.devices.remove(name).map(|(_, v)| v);
        if removed.is_some() {
            self.rebuild_snapshot();
        }
        removed
    }

    /// Wholesale-replace a stored device. No-op if `name` is absent,
    /// which guards an `update` racing ahead of its lifecycle events or
    /// referring to a device this client never hydrated.
    pub fn replace(&self, name: &str, device: Device) -> bool {
        let Some(mut entry) = self.devices.get_mut(name) else {
            return false;
        };
        *entry = Arc::new(device);
        drop(entry);

        self.rebuild_snapshot();
        true
    }

    /// Remove all devices, e.g. on disconnect ("unknown connectivity"
    /// means "unknown device state").
    ///
    /// Advances the clear epoch even when the mirror is already empty:
    /// a hydrate may be in flight for a name that never landed, and its
    /// result must not survive the disconnect.
    pub fn clear(&self) {
        self.clear_epoch.fetch_add(1, Ordering::Relaxed);
        self.removals.clear();

        if self.devices.is_empty() {
            return;
        }
        self.devices.clear();
        self.rebuild_snapshot();
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Whether a device with this name is currently mirrored.
    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name)
    }

    /// Look up a device by name.
    pub fn get(&self, name: &str) -> Option<Arc<Device>> {
        self.devices.get(name).map(|r| Arc::clone(r.value()))
    }

    /// All devices, ordered ascending by `index`; equal indexes
    /// tie-break lexicographically by name.
    pub fn list(&self) -> Arc<Vec<Arc<Device>>> {
        self.snapshot.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// The current generation for a name.
    pub fn generation(&self, name: &str) -> Generation {
        Generation {
            epoch: self.clear_epoch.load(Ordering::Relaxed),
            removals: self.removals.get(name).map_or(0, |r| *r.value()),
        }
    }

    /// Subscribe to ordered snapshot changes.
    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.snapshot.subscribe())
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Collect, sort, and broadcast the ordered snapshot.
    fn rebuild_snapshot(&self) {
        let mut values: Vec<Arc<Device>> =
            self.devices.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.name.cmp(&b.name)));

        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

impl Default for RegistryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn device(name: &str, index: i64) -> Device {
        Device {
            name: name.into(),
            index,
            ports: Vec::new(),
        }
    }

    #[test]
    fn insert_returns_true_for_new_name() {
        let reg = RegistryStore::new();
        assert!(reg.insert(device("sw1", 1)));
        assert!(reg.contains("sw1"));
    }

    #[test]
    fn insert_is_idempotent() {
        let reg = RegistryStore::new();
        assert!(reg.insert(device("sw1", 1)));
        assert!(!reg.insert(device("sw1", 99)));

        assert_eq!(reg.len(), 1);
        // The second insert must not have touched the stored entry.
        assert_eq!(reg.get("sw1").unwrap().index, 1);
    }

    #[test]
    fn remove_on_absent_name_is_a_noop() {
        let reg = RegistryStore::new();
        assert!(reg.remove("ghost").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn replace_on_absent_name_is_a_noop() {
        let reg = RegistryStore::new();
        assert!(!reg.replace("ghost", device("ghost", 1)));
        assert!(reg.is_empty());
    }

    #[test]
    fn replace_is_wholesale() {
        let reg = RegistryStore::new();
        let mut initial = device("sw1", 1);
        initial.ports = vec![patchbay_api::model::Port {
            name: "A".into(),
            index: 1,
            terminals: Vec::new(),
        }];
        reg.insert(initial);

        assert!(reg.replace("sw1", device("sw1", 5)));

        let stored = reg.get("sw1").unwrap();
        assert_eq!(stored.index, 5);
        assert!(stored.ports.is_empty(), "replace must not merge fields");
    }

    #[test]
    fn list_orders_by_index_then_name() {
        let reg = RegistryStore::new();
        reg.insert(device("c", 3));
        reg.insert(device("a", 1));
        reg.insert(device("b", 2));

        let list = reg.list();
        let names: Vec<&str> = list.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[test]
    fn equal_indexes_tie_break_by_name() {
        let reg = RegistryStore::new();
        reg.insert(device("zeta", 1));
        reg.insert(device("alpha", 1));
        reg.insert(device("mid", 1));

        let list = reg.list();
        let names: Vec<&str> = list.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn names_stay_pairwise_unique_under_event_sequences() {
        let reg = RegistryStore::new();

        reg.insert(device("sw1", 1));
        reg.insert(device("sw1", 1));
        reg.replace("sw1", device("sw1", 2));
        reg.insert(device("sw2", 3));
        reg.remove("sw1");
        reg.insert(device("sw1", 1));

        let list = reg.list();
        let mut names: Vec<&str> = list.iter().map(|d| d.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), list.len());
    }

    #[test]
    fn clear_empties_the_mirror() {
        let reg = RegistryStore::new();
        reg.insert(device("sw1", 1));
        reg.insert(device("sw2", 2));
        assert_eq!(reg.len(), 2);

        reg.clear();
        assert!(reg.is_empty());
        assert!(reg.list().is_empty());
    }

    #[test]
    fn remove_advances_generation() {
        let reg = RegistryStore::new();
        let g0 = reg.generation("sw1");

        reg.insert(device("sw1", 1));
        reg.remove("sw1");
        let g1 = reg.generation("sw1");
        assert_ne!(g1, g0);

        // Removing an absent name still advances: the lifecycle event
        // happened, whether or not the hydrate had landed yet.
        reg.remove("sw1");
        assert_ne!(reg.generation("sw1"), g1);
    }

    #[test]
    fn generations_are_per_name() {
        let reg = RegistryStore::new();
        let other = reg.generation("sw2");

        reg.insert(device("sw1", 1));
        reg.remove("sw1");

        // Removing sw1 must not invalidate an in-flight sw2 hydrate.
        assert_eq!(reg.generation("sw2"), other);
    }

    #[test]
    fn stale_hydrate_is_discarded_after_remove() {
        let reg = RegistryStore::new();

        // Hydrate starts...
        let generation = reg.generation("sw1");
        // ...remove arrives before it completes...
        reg.remove("sw1");
        // ...then the fetch result lands.
        assert!(!reg.insert_hydrated(device("sw1", 1), generation));
        assert!(!reg.contains("sw1"));
    }

    #[test]
    fn stale_hydrate_is_discarded_after_clear() {
        let reg = RegistryStore::new();
        reg.insert(device("sw1", 1));

        let generation = reg.generation("sw2");
        reg.insert(device("sw2", 2));
        reg.clear();

        assert!(!reg.insert_hydrated(device("sw2", 2), generation));
        assert!(reg.is_empty());
    }

    #[test]
    fn clear_invalidates_hydrates_for_names_that_never_landed() {
        let reg = RegistryStore::new();

        // Hydrate in flight for a name nothing ever inserted, then the
        // mirror is wiped while it is still empty (disconnect before
        // any device arrived).
        let generation = reg.generation("sw1");
        reg.clear();

        assert!(!reg.insert_hydrated(device("sw1", 1), generation));
        assert!(reg.is_empty());
    }

    #[test]
    fn fresh_generation_after_clear_is_usable() {
        let reg = RegistryStore::new();
        reg.insert(device("sw1", 1));
        reg.remove("sw1");
        reg.clear();

        // The hub replays `add` after a reconnect; a hydrate captured
        // after the clear must land even though the name was removed in
        // the previous epoch.
        let generation = reg.generation("sw1");
        assert!(reg.insert_hydrated(device("sw1", 1), generation));
        assert!(reg.contains("sw1"));
    }

    #[test]
    fn current_hydrate_is_applied() {
        let reg = RegistryStore::new();
        let generation = reg.generation("sw1");
        assert!(reg.insert_hydrated(device("sw1", 1), generation));
        assert!(reg.contains("sw1"));
    }

    #[tokio::test]
    async fn subscribers_are_notified_on_actual_change_only() {
        let reg = RegistryStore::new();
        let mut sub = reg.subscribe();

        reg.insert(device("sw1", 1));
        let snap = sub.changed().await.unwrap();
        assert_eq!(snap.len(), 1);

        // No-ops must not wake subscribers.
        reg.insert(device("sw1", 1));
        reg.remove("ghost");
        reg.replace("ghost", device("ghost", 1));

        reg.remove("sw1");
        let snap = sub.changed().await.unwrap();
        assert!(snap.is_empty(), "the next wakeup must be the real change");
    }
}
