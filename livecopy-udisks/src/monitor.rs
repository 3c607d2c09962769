// SPDX-License-Identifier: GPL-3.0-only

//! Hotplug monitoring via the UDisks2 object manager.
//!
//! Watches `InterfacesAdded`/`InterfacesRemoved` on the UDisks2 root
//! object, filtered to the Block interface, and forwards the affected
//! object paths over a channel. The enumerator feeds these paths into
//! `DeviceRegistry::add_device`/`remove_device`.

use std::collections::HashMap;

use futures::StreamExt;
use futures::stream::Stream;
use futures::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::warn;
use zbus::{
    Connection,
    zvariant::{self, Value},
};
use zbus_macros::proxy;

use livecopy_core::error::{DeviceError, Result};

#[proxy(
    default_service = "org.freedesktop.UDisks2",
    default_path = "/org/freedesktop/UDisks2/Manager",
    interface = "org.freedesktop.UDisks2.Manager"
)]
pub trait UDisks2Manager {
    fn get_block_devices(
        &self,
        options: HashMap<String, Value<'_>>,
    ) -> zbus::Result<Vec<zvariant::OwnedObjectPath>>;
}

#[proxy(
    default_service = "org.freedesktop.UDisks2",
    default_path = "/org/freedesktop/UDisks2",
    interface = "org.freedesktop.DBus.ObjectManager"
)]
pub trait UDisks2ObjectManager {
    #[zbus(signal)]
    fn interfaces_added(
        &self,
        object_path: zvariant::OwnedObjectPath,
        interfaces_and_properties: HashMap<String, HashMap<String, zvariant::OwnedValue>>,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    fn interfaces_removed(
        &self,
        object_path: zvariant::OwnedObjectPath,
        interfaces: Vec<String>,
    ) -> zbus::Result<()>;
}

#[derive(Debug, PartialEq, Eq)]
pub enum BlockEvent {
    Added(String),
    Removed(String),
}

pub struct BlockEventStream {
    receiver: mpsc::Receiver<BlockEvent>,
}

impl Stream for BlockEventStream {
    type Item = BlockEvent;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Subscribe to block-device hotplug events on the given system-bus
/// connection.
pub async fn block_event_stream(connection: &Connection) -> Result<BlockEventStream> {
    const BLOCK_IFACE: &str = "org.freedesktop.UDisks2.Block";

    let (sender, receiver) = mpsc::channel(32);

    let object_manager = UDisks2ObjectManagerProxy::new(connection)
        .await
        .map_err(|e| DeviceError::DBus(e.to_string()))?;
    let mut added_stream = object_manager
        .receive_interfaces_added()
        .await
        .map_err(|e| DeviceError::DBus(e.to_string()))?;
    let mut removed_stream = object_manager
        .receive_interfaces_removed()
        .await
        .map_err(|e| DeviceError::DBus(e.to_string()))?;

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                maybe_added = added_stream.next() => {
                    let Some(signal) = maybe_added else { break };
                    let args = match signal.args() {
                        Ok(args) => args,
                        Err(e) => {
                            warn!("failed to parse InterfacesAdded signal args: {e}");
                            continue;
                        }
                    };
                    if !args.interfaces_and_properties.contains_key(BLOCK_IFACE) {
                        continue;
                    }
                    BlockEvent::Added(args.object_path.to_string())
                }
                maybe_removed = removed_stream.next() => {
                    let Some(signal) = maybe_removed else { break };
                    let args = match signal.args() {
                        Ok(args) => args,
                        Err(e) => {
                            warn!("failed to parse InterfacesRemoved signal args: {e}");
                            continue;
                        }
                    };
                    if !args.interfaces.iter().any(|i| i == BLOCK_IFACE) {
                        continue;
                    }
                    BlockEvent::Removed(args.object_path.to_string())
                }
            };

            if let Err(e) = sender.send(event).await {
                warn!("block event receiver dropped: {e}");
                break;
            }
        }
    });

    Ok(BlockEventStream { receiver })
}

/// Device node path a UDisks2 block object path refers to, e.g.
/// "/org/freedesktop/UDisks2/block_devices/sdb" -> "/dev/sdb".
pub fn device_path_for_block_object(object_path: &str) -> Option<String> {
    object_path
        .strip_prefix("/org/freedesktop/UDisks2/block_devices/")
        .filter(|node| !node.is_empty())
        .map(|node| format!("/dev/{node}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_object_path_maps_to_device_node() {
        assert_eq!(
            device_path_for_block_object("/org/freedesktop/UDisks2/block_devices/sdb"),
            Some("/dev/sdb".to_string())
        );
        assert_eq!(
            device_path_for_block_object("/org/freedesktop/UDisks2/drives/Kingston"),
            None
        );
        assert_eq!(
            device_path_for_block_object("/org/freedesktop/UDisks2/block_devices/"),
            None
        );
    }
}
