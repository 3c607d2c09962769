// SPDX-License-Identifier: GPL-3.0-only

//! Block-device and partition lifecycle manager.
//!
//! This crate is the UI-agnostic core of a tool that clones a live
//! Linux system onto removable media. It enumerates storage devices
//! and their partitions, tracks mount state against the live mount
//! table, recognizes system and persistence partitions, computes
//! usable space, and unmounts with bounded patience when other
//! processes still hold a device.
//!
//! The OS is reached through two seams: [`BlockDeviceService`] for the
//! block-device service (implemented over UDisks2 in the
//! `livecopy-udisks` crate) and [`ProcessRunner`] for the external
//! measurement utilities.

pub mod config;
pub mod device;
pub mod enumerator;
pub mod error;
pub mod image;
pub mod partition;
pub mod process;
pub mod service;
pub mod usage;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Settings;
pub use device::StorageDevice;
pub use enumerator::{
    DeviceListEvent, DeviceListStream, DeviceRegistry, EnumeratorPolicy, Prewarm,
};
pub use error::{DeviceError, Result};
pub use image::{MksquashfsWriter, SystemImageWriter, TargetCheck, check_export_target};
pub use partition::{Partition, USABLE_SPACE_UNKNOWN};
pub use process::{CommandOutput, ProcessRunner, SystemProcessRunner};
pub use service::{BlockDeviceService, DeviceProbe};
pub use usage::usage_for_mount_point;
