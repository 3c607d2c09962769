// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Errors surfaced by the block-device service seam.
///
/// Identity and mount-state queries propagate these to the caller.
/// Derived measurements (usable space) never do; they degrade to the
/// -1 sentinel instead, because the presentation layer must always
/// have a displayable value.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("service connection failed: {0}")]
    Connection(String),

    #[error("device service call failed: {0}")]
    DBus(String),

    #[error("device not found: {0}")]
    NotFound(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;
