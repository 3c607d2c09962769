// SPDX-License-Identifier: GPL-3.0-only

//! Storage device identity
//!
//! Devices come in two flavours: plain disks and SD-style removable
//! media that additionally carry a human-readable name. Equality and
//! hashing cover the identity tuple (kind incl. name, device node,
//! size) so that independently constructed records describing the same
//! physical device compare equal. The firmware revision is
//! informational and excluded from equality.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Device family, with kind-specific extra fields
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Plain disk (fixed or removable) without a marketing name
    Disk,

    /// SD-style removable media with a human-readable name
    SdCard { name: String },
}

/// Identity of a physical storage device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Device node path (e.g. "/dev/sdb")
    pub device: String,

    /// Total size in bytes
    pub size: u64,

    /// Firmware revision (not part of equality)
    pub revision: String,

    /// Device family
    pub kind: DeviceKind,
}

impl DeviceIdentity {
    /// The human-readable name, if the device family carries one.
    pub fn name(&self) -> Option<&str> {
        match &self.kind {
            DeviceKind::Disk => None,
            DeviceKind::SdCard { name } => Some(name),
        }
    }
}

impl PartialEq for DeviceIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.device == other.device && self.size == other.size
    }
}

impl Eq for DeviceIdentity {}

impl Hash for DeviceIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.device.hash(state);
        self.size.hash(state);
    }
}
