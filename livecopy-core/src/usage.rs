// SPDX-License-Identifier: GPL-3.0-only

//! Filesystem usage via statvfs

use std::{ffi::CString, mem::MaybeUninit};

use anyhow::{Context, Result};

use livecopy_types::Usage;

/// Measure usage figures for a mounted filesystem.
pub fn usage_for_mount_point(mount_point: &str) -> Result<Usage> {
    let stat = statvfs(mount_point)?;

    // Block counts are expressed in f_frsize units; some filesystems
    // leave it zero and only fill f_bsize.
    let block = if stat.f_frsize > 0 {
        stat.f_frsize
    } else {
        stat.f_bsize
    };

    let total = stat.f_blocks.saturating_mul(block);
    let used = total.saturating_sub(stat.f_bfree.saturating_mul(block));
    let available = stat.f_bavail.saturating_mul(block);
    let percent = match total {
        0 => 0,
        _ => (used.saturating_mul(100) / total).min(100) as u32,
    };

    Ok(Usage {
        total,
        used,
        available,
        percent,
        mount_point: mount_point.to_string(),
    })
}

fn statvfs(path: &str) -> Result<libc::statvfs> {
    let path_c =
        CString::new(path).with_context(|| format!("path contains NUL byte: {path:?}"))?;

    let mut stat = MaybeUninit::<libc::statvfs>::uninit();
    if unsafe { libc::statvfs(path_c.as_ptr(), stat.as_mut_ptr()) } != 0 {
        return Err(std::io::Error::last_os_error())
            .with_context(|| format!("statvfs failed for {path:?}"));
    }
    Ok(unsafe { stat.assume_init() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_for_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let usage = usage_for_mount_point(dir.path().to_str().unwrap()).unwrap();
        assert!(usage.total > 0);
        assert!(usage.available <= usage.total);
        assert!(usage.percent <= 100);
    }

    #[test]
    fn usage_for_missing_path_fails() {
        assert!(usage_for_mount_point("/nonexistent/livecopy-test").is_err());
    }
}
