//! Neighbor-exchange boundary
//!
//! The interface through which a device publishes its round's exports and
//! retrieves what neighbors exported for their previous round, keyed by
//! aligned call-stack path. The physical transport lives behind this
//! boundary; the implementations here cover the no-network case and the
//! in-process simulation case.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::device::DeviceId;
use crate::interpreter::path::Path;
use crate::interpreter::value::Value;

/// One round's exported annotations, keyed by aligned path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Export {
    values: BTreeMap<Path, Value>,
}

impl Export {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, path: Path, value: Value) {
        self.values.insert(path, value);
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        self.values.get(path)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &Value)> {
        self.values.iter()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Boundary contract. Absence of a neighbor's value at a path is not an
/// error here; it means "no aligned state at this position" and is handled
/// by the consuming node semantics.
pub trait NetworkManager {
    /// Make this round's exports available to neighbors for their next
    /// round. Atomic with respect to a single round.
    fn publish(&mut self, export: Export);

    /// The most recently received export per known neighbor. Callers
    /// snapshot this once per round; the returned map is already detached
    /// from later arrivals.
    fn neighbor_state(&self) -> BTreeMap<DeviceId, Export>;
}

/// A device with no neighbors: publishes vanish, the neighborhood is empty.
#[derive(Debug, Default)]
pub struct NullNetwork;

impl NetworkManager for NullNetwork {
    fn publish(&mut self, _export: Export) {}

    fn neighbor_state(&self) -> BTreeMap<DeviceId, Export> {
        BTreeMap::new()
    }
}

/// In-process mailbox shared by simulated devices, fully connected: every
/// device sees every other device's latest export.
#[derive(Debug, Clone, Default)]
pub struct LocalNetwork {
    inbox: Arc<Mutex<BTreeMap<DeviceId, Export>>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// The per-device endpoint: publishes under `device`, reads everyone
    /// else.
    pub fn handle(&self, device: DeviceId) -> LocalNetworkHandle {
        LocalNetworkHandle {
            device,
            inbox: Arc::clone(&self.inbox),
        }
    }
}

/// One device's endpoint on a [`LocalNetwork`].
#[derive(Debug)]
pub struct LocalNetworkHandle {
    device: DeviceId,
    inbox: Arc<Mutex<BTreeMap<DeviceId, Export>>>,
}

impl NetworkManager for LocalNetworkHandle {
    fn publish(&mut self, export: Export) {
        self.inbox
            .lock()
            .expect("network mailbox poisoned")
            .insert(self.device, export);
    }

    fn neighbor_state(&self) -> BTreeMap<DeviceId, Export> {
        self.inbox
            .lock()
            .expect("network mailbox poisoned")
            .iter()
            .filter(|(id, _)| **id != self.device)
            .map(|(id, export)| (*id, export.clone()))
            .collect()
    }
}
