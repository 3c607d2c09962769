// SPDX-License-Identifier: GPL-3.0-only

//! Device enumeration.
//!
//! The registry owns the device list, the one genuinely shared mutable
//! resource in this core. Observers never see the live list: every
//! change is published as an immutable snapshot over a channel, so the
//! presentation layer can render a consistent view without locking.

use std::sync::Arc;

use futures::Stream;
use futures::task::{Context, Poll};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::device::StorageDevice;
use crate::error::Result;
use crate::partition::Partition;
use crate::process::ProcessRunner;
use crate::service::BlockDeviceService;

/// Which derived partition probe to pre-warm while enumerating.
///
/// Pre-warming runs the expensive measurement off the presentation
/// thread so a first read of the list never blocks on a mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prewarm {
    None,
    UsableSpace,
}

/// Strategy value controlling which devices qualify and what gets
/// pre-warmed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumeratorPolicy {
    pub include_fixed_disks: bool,
    pub prewarm: Prewarm,
}

impl EnumeratorPolicy {
    pub fn from_settings(settings: &Settings, prewarm: Prewarm) -> Self {
        Self {
            include_fixed_disks: settings.include_fixed_disks,
            prewarm,
        }
    }
}

/// Change notification carrying an immutable snapshot of the list
#[derive(Debug, Clone)]
pub enum DeviceListEvent {
    Changed(Vec<Arc<StorageDevice>>),
}

pub struct DeviceListStream {
    receiver: mpsc::Receiver<DeviceListEvent>,
}

impl Stream for DeviceListStream {
    type Item = DeviceListEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Owns the known-devices list and publishes snapshots on change
pub struct DeviceRegistry {
    service: Arc<dyn BlockDeviceService>,
    runner: Arc<dyn ProcessRunner>,
    settings: Arc<Settings>,
    policy: EnumeratorPolicy,
    devices: Mutex<Vec<Arc<StorageDevice>>>,
    events: mpsc::Sender<DeviceListEvent>,
}

impl DeviceRegistry {
    pub fn new(
        service: Arc<dyn BlockDeviceService>,
        runner: Arc<dyn ProcessRunner>,
        settings: Arc<Settings>,
        policy: EnumeratorPolicy,
    ) -> (Self, DeviceListStream) {
        let (events, receiver) = mpsc::channel(32);
        (
            Self {
                service,
                runner,
                settings,
                policy,
                devices: Mutex::new(Vec::new()),
                events,
            },
            DeviceListStream { receiver },
        )
    }

    /// Current snapshot of the known devices.
    pub async fn snapshot(&self) -> Vec<Arc<StorageDevice>> {
        self.devices.lock().await.clone()
    }

    /// Process an OS-reported device path.
    ///
    /// Returns whether the list changed. Paths that do not resolve to
    /// a whole device and fixed disks excluded by policy are discarded
    /// silently; both are routine, not errors.
    pub async fn add_device(&self, added_path: &str) -> Result<bool> {
        let Some(probe) = self.service.resolve_device(added_path).await? else {
            debug!(added_path, "path does not name a whole device, skipping");
            return Ok(false);
        };

        if !probe.removable && !self.policy.include_fixed_disks {
            debug!(
                device = %probe.identity.device,
                "fixed disk excluded by policy"
            );
            return Ok(false);
        }

        let mut device = StorageDevice::new(probe.identity);
        for info in probe.partitions {
            device.attach_partition(Partition::new(
                info,
                self.service.clone(),
                self.runner.clone(),
                self.settings.clone(),
            ));
        }

        if self.policy.prewarm == Prewarm::UsableSpace {
            for partition in device.partitions() {
                partition.usable_space().await;
            }
        }

        let device = Arc::new(device);
        let snapshot = {
            let mut devices = self.devices.lock().await;
            if devices.iter().any(|known| **known == *device) {
                debug!(device = %device.device(), "device already known");
                return Ok(false);
            }
            info!(device = %device.device(), "adding storage device");
            devices.push(device);
            devices.clone()
        };

        self.publish(snapshot).await;
        Ok(true)
    }

    /// Enumerate everything the OS already knows about, before any
    /// hotplug event arrives. Returns how many devices qualified.
    pub async fn scan(&self) -> Result<usize> {
        let mut added = 0;
        for path in self.service.list_devices().await? {
            if self.add_device(&path).await? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Drop a device by node path (e.g. "/dev/sdb"). Returns whether
    /// the list changed.
    pub async fn remove_device(&self, device_path: &str) -> bool {
        let snapshot = {
            let mut devices = self.devices.lock().await;
            let Some(index) = devices
                .iter()
                .position(|known| known.device() == device_path)
            else {
                return false;
            };
            info!(device = device_path, "removing storage device");
            devices.remove(index);
            devices.clone()
        };

        self.publish(snapshot).await;
        true
    }

    async fn publish(&self, snapshot: Vec<Arc<StorageDevice>>) {
        if let Err(e) = self.events.send(DeviceListEvent::Changed(snapshot)).await {
            warn!("device list observer dropped: {e}");
        }
    }
}
