// SPDX-License-Identifier: GPL-3.0-only

//! UDisks2 reports paths as NUL-terminated byte strings.

pub fn decode_c_string_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).to_string()
}

pub fn decode_mount_points(mount_points: Vec<Vec<u8>>) -> Vec<String> {
    mount_points
        .into_iter()
        .map(|mp| decode_c_string_bytes(&mp))
        .filter(|decoded| !decoded.is_empty())
        .collect()
}
