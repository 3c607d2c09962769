// SPDX-License-Identifier: GPL-3.0-only

//! Byte formatting for device summaries

use num_format::{Locale, ToFormattedString};

const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: &u64, add_bytes: bool) -> String {
    let mut value = *bytes as f64;
    let mut unit = 0;

    while value > 1024. && unit + 1 < UNITS.len() {
        value /= 1024.;
        unit += 1;
    }

    if add_bytes {
        let bytes_str = bytes.to_formatted_string(&Locale::en);
        format!("{value:.2} {} ({bytes_str} bytes)", UNITS[unit])
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}
