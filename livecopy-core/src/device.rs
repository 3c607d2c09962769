// SPDX-License-Identifier: GPL-3.0-only

//! A physical storage device owning its partitions.
//!
//! The device carries identity only; all partition-level business
//! logic lives on the owned [`Partition`] objects. Equality and
//! hashing delegate to [`DeviceIdentity`] so that list-membership
//! checks ("is this device already known?") work across independently
//! constructed instances.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use livecopy_types::{DeviceIdentity, DeviceKind, bytes_to_pretty};

use crate::partition::Partition;

pub struct StorageDevice {
    identity: DeviceIdentity,
    partitions: Vec<Arc<Partition>>,
}

impl StorageDevice {
    /// Construct from identity; partitions are attached afterwards by
    /// the enumerator.
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            partitions: Vec::new(),
        }
    }

    pub fn attach_partition(&mut self, partition: Partition) {
        self.partitions.push(Arc::new(partition));
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Device node path, e.g. "/dev/sdb".
    pub fn device(&self) -> &str {
        &self.identity.device
    }

    pub fn size(&self) -> u64 {
        self.identity.size
    }

    pub fn revision(&self) -> &str {
        &self.identity.revision
    }

    pub fn name(&self) -> Option<&str> {
        self.identity.name()
    }

    /// Partitions in on-disk order.
    pub fn partitions(&self) -> &[Arc<Partition>] {
        &self.partitions
    }
}

impl PartialEq for StorageDevice {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for StorageDevice {}

impl Hash for StorageDevice {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl std::fmt::Debug for StorageDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageDevice")
            .field("identity", &self.identity)
            .field("partitions", &self.partitions.len())
            .finish()
    }
}

impl std::fmt::Display for StorageDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pretty_size = bytes_to_pretty(&self.identity.size, false);
        match &self.identity.kind {
            DeviceKind::SdCard { name } => {
                write!(f, "{name}, {}, {pretty_size}", self.identity.device)
            }
            DeviceKind::Disk => write!(f, "{}, {pretty_size}", self.identity.device),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::DefaultHasher;

    fn identity(name: &str, device: &str, size: u64) -> DeviceIdentity {
        DeviceIdentity {
            device: device.to_string(),
            size,
            revision: "1.0".to_string(),
            kind: DeviceKind::SdCard {
                name: name.to_string(),
            },
        }
    }

    fn hash_of(device: &StorageDevice) -> u64 {
        let mut hasher = DefaultHasher::new();
        device.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn devices_with_identical_identity_are_equal() {
        let a = StorageDevice::new(identity("Kingston 8GB", "/dev/sdb", 8_000_000_000));
        let b = StorageDevice::new(identity("Kingston 8GB", "/dev/sdb", 8_000_000_000));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn any_differing_identity_field_breaks_equality() {
        let base = StorageDevice::new(identity("Kingston 8GB", "/dev/sdb", 8_000_000_000));
        let renamed = StorageDevice::new(identity("SanDisk 8GB", "/dev/sdb", 8_000_000_000));
        let moved = StorageDevice::new(identity("Kingston 8GB", "/dev/sdc", 8_000_000_000));
        let resized = StorageDevice::new(identity("Kingston 8GB", "/dev/sdb", 16_000_000_000));
        assert_ne!(base, renamed);
        assert_ne!(base, moved);
        assert_ne!(base, resized);
    }

    #[test]
    fn display_includes_name_and_pretty_size() {
        let device = StorageDevice::new(identity("Kingston 8GB", "/dev/sdb", 8 * 1024 * 1024 * 1024));
        assert_eq!(device.to_string(), "Kingston 8GB, /dev/sdb, 8.00 GB");

        let plain = StorageDevice::new(DeviceIdentity {
            device: "/dev/sda".to_string(),
            size: 2 * 1024 * 1024,
            revision: String::new(),
            kind: DeviceKind::Disk,
        });
        assert_eq!(plain.to_string(), "/dev/sda, 2.00 MB");
    }
}
