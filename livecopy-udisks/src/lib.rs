// SPDX-License-Identifier: GPL-3.0-only

//! UDisks2 adapter for the livecopy lifecycle core.
//!
//! Implements the core's `BlockDeviceService` seam over the UDisks2
//! D-Bus interfaces and exposes a hotplug event stream that drives the
//! device enumerator.

pub mod bytestring;
pub mod monitor;
mod service;

pub use monitor::{BlockEvent, BlockEventStream, block_event_stream, device_path_for_block_object};
pub use service::UDisksDeviceService;
