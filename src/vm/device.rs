//! Device identity

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, comparable identifier distinguishing this device from its
/// neighbors. Ordered so it can key the per-neighbor maps in fields and
/// snapshots.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DeviceId(Uuid);

impl DeviceId {
    pub fn random() -> Self {
        DeviceId(Uuid::new_v4())
    }

    /// Stable id for simulated device number `index`.
    pub fn from_index(index: u64) -> Self {
        DeviceId(Uuid::from_u128(u128::from(index)))
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell simulated devices apart.
        let full = self.0.simple().to_string();
        f.write_str(&full[full.len() - 8..])
    }
}
