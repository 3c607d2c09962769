// SPDX-License-Identifier: GPL-3.0-only

//! A storage device partition.
//!
//! Identity and metadata are immutable after construction. Two derived
//! values are lazily computed and then cached for the object's
//! lifetime: whether this is a recognized system partition, and the
//! usable space. Mount state, by contrast, is always re-queried from
//! the device service because other processes mount and unmount
//! partitions behind our back.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use livecopy_types::{LIVE_IMAGE_DIR, PartitionInfo, SQUASHFS_EXTENSION};

use crate::config::Settings;
use crate::error::Result;
use crate::process::{ProcessRunner, device_holders, disk_usage_bytes};
use crate::service::BlockDeviceService;
use crate::usage;

/// Bounded retry budget for the unmount protocol.
const UMOUNT_ATTEMPTS: u32 = 10;

/// Subtrees preserved across a persistence-partition upgrade. Usable
/// space on such a partition is the partition size minus what these
/// occupy on the mounted root.
const UPGRADE_KEEP_DIRS: [&str; 2] = ["/home/user", "/etc/cups"];

/// Sentinel for "usable space unknown" after a failed measurement.
pub const USABLE_SPACE_UNKNOWN: i64 = -1;

pub struct Partition {
    info: PartitionInfo,
    service: Arc<dyn BlockDeviceService>,
    runner: Arc<dyn ProcessRunner>,
    settings: Arc<Settings>,
    // Single-assignment caches; a fresh Partition must be constructed
    // to re-probe.
    is_system: OnceCell<bool>,
    usable_space: OnceCell<i64>,
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("info", &self.info)
            .field("is_system", &self.is_system.get())
            .field("usable_space", &self.usable_space.get())
            .finish()
    }
}

impl Partition {
    pub fn new(
        info: PartitionInfo,
        service: Arc<dyn BlockDeviceService>,
        runner: Arc<dyn ProcessRunner>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            info,
            service,
            runner,
            settings,
            is_system: OnceCell::new(),
            usable_space: OnceCell::new(),
        }
    }

    pub fn info(&self) -> &PartitionInfo {
        &self.info
    }

    /// Device node name without the `/dev/` prefix, e.g. "sdb1".
    pub fn device(&self) -> &str {
        &self.info.device
    }

    pub fn number(&self) -> u32 {
        self.info.number
    }

    pub fn offset(&self) -> u64 {
        self.info.offset
    }

    pub fn size(&self) -> u64 {
        self.info.size
    }

    pub fn id_label(&self) -> &str {
        &self.info.id_label
    }

    pub fn id_type(&self) -> &str {
        &self.info.id_type
    }

    pub fn is_extended(&self) -> bool {
        self.info.is_extended()
    }

    pub fn has_extended_filesystem(&self) -> bool {
        self.info.has_extended_filesystem()
    }

    pub fn is_persistency_partition(&self) -> bool {
        self.info.is_persistence_label()
    }

    /// Current mount points, straight from the device service.
    pub async fn mount_paths(&self) -> Result<Vec<String>> {
        self.service.mount_paths(&self.info.device).await
    }

    pub async fn is_mounted(&self) -> Result<bool> {
        Ok(!self.mount_paths().await?.is_empty())
    }

    /// Mount this partition, or return the existing mount point.
    ///
    /// Idempotent: when already mounted the first existing mount point
    /// is returned without another service round-trip.
    pub async fn mount(&self) -> Result<String> {
        let paths = self.mount_paths().await?;
        if let Some(path) = paths.first() {
            debug!(device = %self.info.device, mount_point = %path, "already mounted");
            return Ok(path.clone());
        }
        self.service.mount(&self.info.device, "auto", &[]).await
    }

    /// Unmount with bounded retries.
    ///
    /// Unmount legitimately fails while a recently finished copy still
    /// holds a file handle. Every round re-checks live mount state
    /// first: a concurrent actor may have unmounted the partition
    /// during the busy wait, in which case we are done without another
    /// service call. Exhausting the retry budget is a recoverable
    /// condition reported as `Ok(false)`, not an error.
    pub async fn umount(&self) -> Result<bool> {
        for attempt in 0..UMOUNT_ATTEMPTS {
            if !self.is_mounted().await? {
                debug!(device = %self.info.device, "not mounted, nothing to do");
                return Ok(true);
            }
            info!(device = %self.info.device, attempt, "partition is mounted, calling unmount");
            match self.service.unmount(&self.info.device, &[]).await {
                Ok(()) => return Ok(true),
                Err(e) => {
                    warn!(device = %self.info.device, error = %e, "unmount failed");
                    self.wait_while_device_busy().await;
                }
            }
        }
        error!(
            device = %self.info.device,
            "could not unmount after {UMOUNT_ATTEMPTS} attempts, giving up"
        );
        Ok(false)
    }

    /// Diagnostic busy wait: poll `fuser` until nothing holds the
    /// device node, pausing between polls. Bounded by the configured
    /// budget so a holder that never exits cannot hang the caller.
    async fn wait_while_device_busy(&self) {
        for _ in 0..self.settings.busy_poll_budget {
            match device_holders(self.runner.as_ref(), &self.info.device).await {
                Ok(Some(holders)) => {
                    info!(
                        device = %self.info.device,
                        %holders,
                        "device is still being used"
                    );
                    tokio::time::sleep(self.settings.busy_poll_interval()).await;
                }
                Ok(None) => return,
                Err(e) => {
                    warn!(device = %self.info.device, error = %e, "holder lookup failed");
                    return;
                }
            }
        }
        warn!(
            device = %self.info.device,
            budget = self.settings.busy_poll_budget,
            "device still busy after exhausting the poll budget, retrying unmount anyway"
        );
    }

    /// Whether this partition holds a bootable compressed root
    /// filesystem image.
    ///
    /// The label must match the configured system-partition label and
    /// the mounted filesystem must contain at least one squashfs image
    /// under the `live` directory. The partition is mounted
    /// temporarily if needed and unmounted again on every exit path.
    /// The verdict is cached for the object's lifetime; a probe error
    /// propagates and leaves the cache unset, so a later call retries.
    pub async fn is_system_partition(&self) -> Result<bool> {
        self.is_system
            .get_or_try_init(|| async {
                debug!(device = %self.info.device, label = %self.info.id_label, "checking partition");
                if self.info.id_label != self.settings.system_partition_label {
                    debug!(device = %self.info.device, "does not match system partition label");
                    return Ok(false);
                }

                let paths = self.mount_paths().await?;
                let (mount_path, tmp_mount) = match paths.first() {
                    Some(path) => (path.clone(), false),
                    None => (self.mount().await?, true),
                };

                debug!(device = %self.info.device, "checking file structure");
                let found = has_live_image(Path::new(&mount_path));

                if tmp_mount && !self.umount().await? {
                    warn!(device = %self.info.device, "could not release temporary mount");
                }
                Ok(found)
            })
            .await
            .copied()
    }

    /// Usable space in bytes, or [`USABLE_SPACE_UNKNOWN`].
    ///
    /// Persistence partitions are accounted for an upgrade scenario:
    /// only `/home/user` and `/etc/cups` survive, so usable space is
    /// the partition size minus what those subtrees occupy on the
    /// mounted root. Any other partition reports the free space of its
    /// mounted filesystem. Failures degrade to the sentinel and are
    /// cached like a successful measurement.
    pub async fn usable_space(&self) -> i64 {
        *self
            .usable_space
            .get_or_init(|| async {
                match self.measure_usable_space().await {
                    Ok(space) => {
                        info!(device = %self.info.device, usable_space = space, "measured usable space");
                        space
                    }
                    Err(e) => {
                        warn!(device = %self.info.device, error = %e, "usable space measurement failed");
                        USABLE_SPACE_UNKNOWN
                    }
                }
            })
            .await
    }

    async fn measure_usable_space(&self) -> anyhow::Result<i64> {
        let paths = self.mount_paths().await?;
        let (mount_path, tmp_mount) = match paths.first() {
            Some(path) => {
                debug!(device = %self.info.device, mount_point = %path, "already mounted");
                (path.clone(), false)
            }
            None => (self.mount().await?, true),
        };

        let measured = if self.is_persistency_partition() {
            self.upgrade_usable_space().await
        } else {
            usage::usage_for_mount_point(&mount_path).map(|usage| usage.available as i64)
        };

        if tmp_mount && !self.umount().await.unwrap_or(false) {
            warn!(device = %self.info.device, "could not release temporary mount");
        }

        measured
    }

    async fn upgrade_usable_space(&self) -> anyhow::Result<i64> {
        let mut space = self.info.size as i64;
        for dir in UPGRADE_KEEP_DIRS {
            let kept = disk_usage_bytes(self.runner.as_ref(), dir).await?;
            debug!(device = %self.info.device, dir, kept, "upgrade-kept subtree");
            space -= kept as i64;
        }
        Ok(space)
    }
}

/// Whether `live/` under the mount point contains a squashfs image.
fn has_live_image(mount_path: &Path) -> bool {
    let live_dir = mount_path.join(LIVE_IMAGE_DIR);
    let Ok(entries) = std::fs::read_dir(&live_dir) else {
        return false;
    };
    entries.filter_map(|entry| entry.ok()).any(|entry| {
        entry
            .file_name()
            .to_string_lossy()
            .ends_with(SQUASHFS_EXTENSION)
    })
}
