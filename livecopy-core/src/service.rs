// SPDX-License-Identifier: GPL-3.0-only

//! The OS block-device service seam.
//!
//! Everything the lifecycle core needs from the OS lives behind
//! [`BlockDeviceService`], so the real UDisks2 adapter and the
//! in-memory fake used by the tests are interchangeable. Mount state
//! is always re-queried through this trait and never cached: the mount
//! table can change without this program's involvement.

use async_trait::async_trait;

use livecopy_types::{DeviceIdentity, PartitionInfo};

use crate::error::Result;

/// Description of a whole device as resolved from an OS-reported path
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProbe {
    /// Device identity (node path, size, revision, kind)
    pub identity: DeviceIdentity,

    /// Whether the OS reports the device or its media as removable
    pub removable: bool,

    /// Partition metadata in on-disk order
    pub partitions: Vec<PartitionInfo>,
}

/// Abstraction over the OS block-device service
#[async_trait]
pub trait BlockDeviceService: Send + Sync {
    /// Resolve an OS-reported object path to a whole device.
    ///
    /// Returns `Ok(None)` when the path names something other than a
    /// whole device (e.g. an individual partition), which the
    /// enumerator silently skips.
    async fn resolve_device(&self, added_path: &str) -> Result<Option<DeviceProbe>>;

    /// Object paths of all block devices currently known to the OS,
    /// for the initial scan before hotplug events arrive.
    async fn list_devices(&self) -> Result<Vec<String>>;

    /// Current mount points of a partition device node (e.g. "sdb1").
    async fn mount_paths(&self, device: &str) -> Result<Vec<String>>;

    /// Mount a partition and return the resulting mount point.
    async fn mount(&self, device: &str, fstype_hint: &str, options: &[String]) -> Result<String>;

    /// Unmount a partition.
    async fn unmount(&self, device: &str, options: &[String]) -> Result<()>;
}
