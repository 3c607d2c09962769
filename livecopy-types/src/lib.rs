// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the livecopy media manager.
//!
//! These types are the single source of truth shared by the lifecycle
//! core and the UDisks2 adapter: partition identity and classification,
//! storage device identity, and filesystem usage statistics.

mod device;
mod format;
mod partition;
mod usage;

pub use device::{DeviceIdentity, DeviceKind};
pub use format::bytes_to_pretty;
pub use partition::{
    EXTENDED_FILESYSTEMS, EXTENDED_PARTITION_TYPES, LIVE_IMAGE_DIR, PERSISTENCE_PARTITION_LABEL,
    PartitionInfo, SQUASHFS_EXTENSION,
};
pub use usage::Usage;
