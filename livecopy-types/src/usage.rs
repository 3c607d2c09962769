// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem usage statistics

use serde::{Deserialize, Serialize};

/// Usage figures for a mounted filesystem, all in bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Total filesystem size
    pub total: u64,

    /// Used bytes
    pub used: u64,

    /// Bytes available to unprivileged users
    pub available: u64,

    /// Usage percentage (0-100)
    pub percent: u32,

    /// Mount point the figures were measured at
    pub mount_point: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_serialization() {
        let usage = Usage {
            total: 8_000_000_000,
            used: 1_000_000,
            available: 7_900_000_000,
            percent: 0,
            mount_point: "/media/usb0".to_string(),
        };

        let json = serde_json::to_string(&usage).unwrap();
        let deserialized: Usage = serde_json::from_str(&json).unwrap();
        assert_eq!(usage, deserialized);
    }
}
