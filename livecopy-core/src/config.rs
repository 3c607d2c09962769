// SPDX-License-Identifier: GPL-3.0-only

//! Core configuration
//!
//! Settings the presentation layer or a config file supplies before
//! any device is probed. The system-partition label is a deployment
//! choice (different live distributions label their system partition
//! differently), so it is configuration rather than a constant.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings for device probing and the unmount retry protocol
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Filesystem label expected on a system partition
    pub system_partition_label: String,

    /// Whether fixed (non-removable) disks qualify during enumeration
    pub include_fixed_disks: bool,

    /// Pause between busy-wait diagnostic polls, in milliseconds
    pub busy_poll_interval_ms: u64,

    /// Maximum busy-wait polls per failed unmount attempt.
    ///
    /// The original diagnostic loop was unbounded; a holding process
    /// that never exits would hang the caller forever. The budget
    /// turns that into a logged degradation.
    pub busy_poll_budget: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            system_partition_label: "system".to_string(),
            include_fixed_disks: false,
            busy_poll_interval_ms: 1000,
            busy_poll_budget: 30,
        }
    }
}

impl Settings {
    pub fn busy_poll_interval(&self) -> Duration {
        Duration::from_millis(self.busy_poll_interval_ms)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("parsing livecopy settings")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        Self::from_toml_str(&raw)
    }
}
