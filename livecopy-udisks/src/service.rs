// SPDX-License-Identifier: GPL-3.0-only

//! UDisks2-backed implementation of the block-device service seam.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;
use udisks2::{
    block::BlockProxy, drive::DriveProxy, filesystem::FilesystemProxy,
    partition::PartitionProxy, partitiontable::PartitionTableProxy,
};
use zbus::zvariant::{OwnedObjectPath, Value};
use zbus::Connection;

use livecopy_core::error::{DeviceError, Result};
use livecopy_core::service::{BlockDeviceService, DeviceProbe};
use livecopy_types::{DeviceIdentity, DeviceKind, PartitionInfo};

use crate::bytestring;
use crate::monitor::UDisks2ManagerProxy;

fn dbus_err(e: impl std::fmt::Display) -> DeviceError {
    DeviceError::DBus(e.to_string())
}

pub struct UDisksDeviceService {
    connection: Connection,
}

impl UDisksDeviceService {
    pub async fn new() -> Result<Self> {
        let connection = Connection::system()
            .await
            .map_err(|e| DeviceError::Connection(e.to_string()))?;
        Ok(Self { connection })
    }

    pub fn with_connection(connection: Connection) -> Self {
        Self { connection }
    }

    async fn block_proxy(&self, path: &OwnedObjectPath) -> Result<BlockProxy<'_>> {
        // The proxy must own its path; a borrowed path would tie the
        // proxy's lifetime to the caller's reference.
        BlockProxy::builder(&self.connection)
            .path(path.clone())
            .map_err(dbus_err)?
            .build()
            .await
            .map_err(dbus_err)
    }

    /// Find the block object path for a device node name (e.g. "sdb1").
    async fn block_path_for_node(&self, node: &str) -> Result<OwnedObjectPath> {
        let device_path = format!("/dev/{node}");
        let manager = UDisks2ManagerProxy::new(&self.connection)
            .await
            .map_err(dbus_err)?;
        let block_paths = manager
            .get_block_devices(HashMap::new())
            .await
            .map_err(dbus_err)?;

        for path in block_paths {
            let block = match self.block_proxy(&path).await {
                Ok(proxy) => proxy,
                Err(_) => continue,
            };
            let Ok(device_bytes) = block.device().await else {
                continue;
            };
            if bytestring::decode_c_string_bytes(&device_bytes) == device_path {
                return Ok(path);
            }
        }

        Err(DeviceError::NotFound(device_path))
    }

    async fn filesystem_proxy_for_node(&self, node: &str) -> Result<FilesystemProxy<'_>> {
        let path = self.block_path_for_node(node).await?;
        FilesystemProxy::builder(&self.connection)
            .path(path)
            .map_err(dbus_err)?
            .build()
            .await
            .map_err(dbus_err)
    }

    /// The preferred device node path of a block object, e.g. "/dev/sdb".
    async fn device_node_path(&self, block: &BlockProxy<'_>) -> Result<String> {
        let preferred =
            bytestring::decode_c_string_bytes(&block.preferred_device().await.map_err(dbus_err)?);
        if !preferred.is_empty() {
            return Ok(preferred);
        }
        Ok(bytestring::decode_c_string_bytes(
            &block.device().await.map_err(dbus_err)?,
        ))
    }

    async fn partition_info(&self, part_path: &OwnedObjectPath) -> Result<PartitionInfo> {
        let partition = PartitionProxy::builder(&self.connection)
            .path(part_path)
            .map_err(dbus_err)?
            .build()
            .await
            .map_err(dbus_err)?;
        let block = self.block_proxy(part_path).await?;

        let node_path = self.device_node_path(&block).await?;
        let device = node_path
            .strip_prefix("/dev/")
            .unwrap_or(&node_path)
            .to_string();

        Ok(PartitionInfo {
            device,
            number: partition.number().await.map_err(dbus_err)?,
            offset: partition.offset().await.map_err(dbus_err)?,
            size: partition.size().await.map_err(dbus_err)?,
            type_code: partition.type_().await.map_err(dbus_err)?,
            id_label: block.id_label().await.map_err(dbus_err)?,
            id_type: block.id_type().await.map_err(dbus_err)?,
        })
    }
}

#[async_trait]
impl BlockDeviceService for UDisksDeviceService {
    async fn resolve_device(&self, added_path: &str) -> Result<Option<DeviceProbe>> {
        let block_path = OwnedObjectPath::try_from(added_path).map_err(dbus_err)?;
        let block = self.block_proxy(&block_path).await?;

        // Partitions announce themselves as block objects too; only
        // whole devices are enumerated.
        if let Ok(partition) = PartitionProxy::builder(&self.connection)
            .path(&block_path)
            .map_err(dbus_err)?
            .build()
            .await
            && partition.table().await.is_ok()
        {
            debug!(added_path, "block object is a partition, skipping");
            return Ok(None);
        }

        let drive_path = block.drive().await.map_err(dbus_err)?;
        if drive_path.as_str() == "/" {
            debug!(added_path, "block object has no drive, skipping");
            return Ok(None);
        }

        let drive = DriveProxy::builder(&self.connection)
            .path(&drive_path)
            .map_err(dbus_err)?
            .build()
            .await
            .map_err(dbus_err)?;

        let mut size = drive.size().await.map_err(dbus_err)?;
        if size == 0 {
            size = block.size().await.map_err(dbus_err)?;
        }

        let removable = drive.removable().await.map_err(dbus_err)?
            || drive.media_removable().await.map_err(dbus_err)?;
        let revision = drive.revision().await.map_err(dbus_err)?;
        let vendor = drive.vendor().await.map_err(dbus_err)?;
        let model = drive.model().await.map_err(dbus_err)?;

        let device = self.device_node_path(&block).await?;

        let name = format!("{vendor} {model}").trim().to_string();
        let kind = if removable && !name.is_empty() {
            DeviceKind::SdCard { name }
        } else {
            DeviceKind::Disk
        };

        let mut partitions = Vec::new();
        if let Ok(table) = PartitionTableProxy::builder(&self.connection)
            .path(&block_path)
            .map_err(dbus_err)?
            .build()
            .await
            && let Ok(partition_paths) = table.partitions().await
        {
            for part_path in partition_paths {
                partitions.push(self.partition_info(&part_path).await?);
            }
            partitions.sort_by_key(|p| p.offset);
        }

        Ok(Some(DeviceProbe {
            identity: DeviceIdentity {
                device,
                size,
                revision,
                kind,
            },
            removable,
            partitions,
        }))
    }

    async fn list_devices(&self) -> Result<Vec<String>> {
        let manager = UDisks2ManagerProxy::new(&self.connection)
            .await
            .map_err(dbus_err)?;
        let paths = manager
            .get_block_devices(HashMap::new())
            .await
            .map_err(dbus_err)?;
        Ok(paths.into_iter().map(|path| path.to_string()).collect())
    }

    async fn mount_paths(&self, device: &str) -> Result<Vec<String>> {
        let filesystem = self.filesystem_proxy_for_node(device).await?;
        let mount_points = filesystem.mount_points().await.map_err(dbus_err)?;
        Ok(bytestring::decode_mount_points(mount_points))
    }

    async fn mount(&self, device: &str, fstype_hint: &str, options: &[String]) -> Result<String> {
        let filesystem = self.filesystem_proxy_for_node(device).await?;

        let mut opts: HashMap<&str, Value<'_>> = HashMap::new();
        if !fstype_hint.is_empty() && fstype_hint != "auto" {
            opts.insert("fstype", Value::from(fstype_hint.to_string()));
        }
        if !options.is_empty() {
            opts.insert("options", Value::from(options.join(",")));
        }

        filesystem
            .mount(opts)
            .await
            .map_err(|e| DeviceError::OperationFailed(format!("mount failed: {e}")))
    }

    async fn unmount(&self, device: &str, options: &[String]) -> Result<()> {
        let filesystem = self.filesystem_proxy_for_node(device).await?;

        let mut opts: HashMap<&str, Value<'_>> = HashMap::new();
        if options.iter().any(|opt| opt == "force") {
            opts.insert("force", Value::from(true));
        }

        filesystem
            .unmount(opts)
            .await
            .map_err(|e| DeviceError::OperationFailed(format!("unmount failed: {e}")))
    }
}
