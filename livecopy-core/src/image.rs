// SPDX-License-Identifier: GPL-3.0-only

//! Squashfs export boundary.
//!
//! The core hands the image builder a resolved mount point and a
//! writable target path; the builder's compression internals are not
//! interpreted here, only its exit status.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use livecopy_types::Usage;

use crate::error::{DeviceError, Result};
use crate::process::ProcessRunner;
use crate::usage;

/// Writes a compressed root filesystem image from a mounted source
#[async_trait]
pub trait SystemImageWriter: Send + Sync {
    async fn write_image(&self, source_mount: &str, target: &Path) -> Result<()>;
}

/// [`SystemImageWriter`] invoking the external `mksquashfs` utility
pub struct MksquashfsWriter {
    runner: Arc<dyn ProcessRunner>,
}

impl MksquashfsWriter {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl SystemImageWriter for MksquashfsWriter {
    async fn write_image(&self, source_mount: &str, target: &Path) -> Result<()> {
        let target_str = target.to_string_lossy();
        info!(source = source_mount, target = %target_str, "creating squashfs image");

        let output = self
            .runner
            .execute("mksquashfs", &[source_mount, &target_str, "-noappend"])
            .await?;

        if !output.success() {
            warn!(code = output.code, stderr = %output.stderr, "mksquashfs failed");
            return Err(DeviceError::OperationFailed(format!(
                "mksquashfs exited with code {}: {}",
                output.code,
                output.stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Preflight verdict for an export target directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCheck {
    pub exists: bool,
    pub writable: bool,
    pub usage: Option<Usage>,
}

impl TargetCheck {
    pub fn ready(&self) -> bool {
        self.exists && self.writable
    }
}

/// Check an export target directory before offering it to the user:
/// existence, writability, and free space.
pub fn check_export_target(dir: &Path) -> TargetCheck {
    if !dir.is_dir() {
        return TargetCheck {
            exists: false,
            writable: false,
            usage: None,
        };
    }

    // A write probe answers "can we create the image here" more
    // honestly than permission bits.
    let probe = dir.join(".livecopy-write-check");
    let writable = match std::fs::File::create(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    };

    let usage = match dir.to_str() {
        Some(path) => usage::usage_for_mount_point(path).ok(),
        None => None,
    };

    TargetCheck {
        exists: true,
        writable,
        usage,
    }
}
