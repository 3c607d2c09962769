// SPDX-License-Identifier: GPL-3.0-only

//! Partition identity and classification
//!
//! `PartitionInfo` captures everything UDisks2 reports about a
//! partition at enumeration time. The fields are immutable once
//! constructed; live state such as mount points is deliberately not
//! part of this model because it can change outside the program's
//! control.

use serde::{Deserialize, Serialize};

/// MBR type codes marking an extended partition (both historical encodings).
pub const EXTENDED_PARTITION_TYPES: [&str; 2] = ["0x05", "0x0f"];

/// Journaled Linux filesystems recognized for persistence overlays.
pub const EXTENDED_FILESYSTEMS: [&str; 3] = ["ext2", "ext3", "ext4"];

/// Reserved filesystem label of the persistence partition.
pub const PERSISTENCE_PARTITION_LABEL: &str = "live-rw";

/// Directory holding the compressed root filesystem image on a system partition.
pub const LIVE_IMAGE_DIR: &str = "live";

/// File extension of the compressed root filesystem image.
pub const SQUASHFS_EXTENSION: &str = ".squashfs";

/// Identity and metadata of a single partition (immutable once built)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Device node name without the `/dev/` prefix (e.g. "sda1")
    pub device: String,

    /// Partition number within the table
    pub number: u32,

    /// Byte offset of the partition start
    pub offset: u64,

    /// Partition size in bytes
    pub size: u64,

    /// Raw partition-table type code (e.g. "0x83" on DOS tables)
    pub type_code: String,

    /// Filesystem label ("idLabel" in UDisks2 terms)
    pub id_label: String,

    /// Filesystem type string (e.g. "ext4", "vfat")
    pub id_type: String,
}

impl PartitionInfo {
    /// Full device node path, e.g. "/dev/sda1".
    pub fn device_path(&self) -> String {
        format!("/dev/{}", self.device)
    }

    /// Whether the raw type code marks an extended partition.
    pub fn is_extended(&self) -> bool {
        EXTENDED_PARTITION_TYPES
            .iter()
            .any(|code| *code == self.type_code)
    }

    /// Whether the filesystem is one of the recognized ext variants.
    pub fn has_extended_filesystem(&self) -> bool {
        EXTENDED_FILESYSTEMS.iter().any(|fs| *fs == self.id_type)
    }

    /// Whether the filesystem label marks a persistence partition.
    pub fn is_persistence_label(&self) -> bool {
        self.id_label == PERSISTENCE_PARTITION_LABEL
    }
}
