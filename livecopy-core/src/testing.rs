// SPDX-License-Identifier: GPL-3.0-only

//! In-memory test doubles for the OS seams.
//!
//! `FakeDeviceService` models a mount table that can be scripted to
//! fail, and `ScriptedRunner` replays canned command output so tests
//! never shell out.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use livecopy_types::{DeviceIdentity, DeviceKind, PartitionInfo};

use crate::config::Settings;
use crate::error::{DeviceError, Result};
use crate::process::{CommandOutput, ProcessRunner};
use crate::service::{BlockDeviceService, DeviceProbe};

/// Opt-in tracing output while debugging tests (`RUST_LOG=debug`).
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Settings tuned so retry loops do not sleep in tests.
pub fn fast_settings() -> Settings {
    Settings {
        system_partition_label: "system".to_string(),
        include_fixed_disks: false,
        busy_poll_interval_ms: 0,
        busy_poll_budget: 3,
    }
}

pub fn partition_info(device: &str, id_label: &str, id_type: &str) -> PartitionInfo {
    PartitionInfo {
        device: device.to_string(),
        number: 1,
        offset: 1_048_576,
        size: 4_000_000_000,
        type_code: "0x83".to_string(),
        id_label: id_label.to_string(),
        id_type: id_type.to_string(),
    }
}

pub fn sd_probe(device: &str, name: &str, partitions: Vec<PartitionInfo>) -> DeviceProbe {
    DeviceProbe {
        identity: DeviceIdentity {
            device: format!("/dev/{device}"),
            size: 8_000_000_000,
            revision: "1.0".to_string(),
            kind: DeviceKind::SdCard {
                name: name.to_string(),
            },
        },
        removable: true,
        partitions,
    }
}

pub fn fixed_disk_probe(device: &str) -> DeviceProbe {
    DeviceProbe {
        identity: DeviceIdentity {
            device: format!("/dev/{device}"),
            size: 500_000_000_000,
            revision: "FW42".to_string(),
            kind: DeviceKind::Disk,
        },
        removable: false,
        partitions: vec![],
    }
}

#[derive(Default)]
struct FakeState {
    mount_points: HashMap<String, Vec<String>>,
    mount_targets: HashMap<String, String>,
    failing_unmounts: HashMap<String, u32>,
    auto_clear_after: HashMap<String, u32>,
    unmount_attempts: HashMap<String, u32>,
    probes: HashMap<String, Option<DeviceProbe>>,
    fail_mount_paths: bool,
    mount_calls: u32,
    unmount_calls: u32,
}

/// Scriptable in-memory stand-in for the OS block-device service
#[derive(Default)]
pub struct FakeDeviceService {
    state: Mutex<FakeState>,
}

impl FakeDeviceService {
    /// Mark a partition as currently mounted.
    pub fn set_mounted(&self, device: &str, mount_point: &str) {
        self.state
            .lock()
            .unwrap()
            .mount_points
            .insert(device.to_string(), vec![mount_point.to_string()]);
    }

    pub fn clear_mounted(&self, device: &str) {
        self.state.lock().unwrap().mount_points.remove(device);
    }

    /// Where a future `mount()` call should mount the partition.
    pub fn set_mount_target(&self, device: &str, mount_point: &str) {
        self.state
            .lock()
            .unwrap()
            .mount_targets
            .insert(device.to_string(), mount_point.to_string());
    }

    /// Let the next `count` unmount calls fail with a service error.
    pub fn fail_next_unmounts(&self, device: &str, count: u32) {
        self.state
            .lock()
            .unwrap()
            .failing_unmounts
            .insert(device.to_string(), count);
    }

    /// Simulate a concurrent actor unmounting the partition after the
    /// given number of failed unmount calls.
    pub fn unmount_behind_our_back_after(&self, device: &str, attempts: u32) {
        self.state
            .lock()
            .unwrap()
            .auto_clear_after
            .insert(device.to_string(), attempts);
    }

    pub fn fail_mount_paths(&self, fail: bool) {
        self.state.lock().unwrap().fail_mount_paths = fail;
    }

    /// Register the device a path resolves to (`None` for paths that
    /// do not name a whole device).
    pub fn set_probe(&self, path: &str, probe: Option<DeviceProbe>) {
        self.state
            .lock()
            .unwrap()
            .probes
            .insert(path.to_string(), probe);
    }

    pub fn mount_calls(&self) -> u32 {
        self.state.lock().unwrap().mount_calls
    }

    pub fn unmount_calls(&self) -> u32 {
        self.state.lock().unwrap().unmount_calls
    }
}

#[async_trait]
impl BlockDeviceService for FakeDeviceService {
    async fn resolve_device(&self, added_path: &str) -> Result<Option<DeviceProbe>> {
        let state = self.state.lock().unwrap();
        match state.probes.get(added_path) {
            Some(probe) => Ok(probe.clone()),
            None => Err(DeviceError::NotFound(added_path.to_string())),
        }
    }

    async fn list_devices(&self) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut paths: Vec<String> = state.probes.keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }

    async fn mount_paths(&self, device: &str) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        if state.fail_mount_paths {
            return Err(DeviceError::DBus("simulated service failure".to_string()));
        }
        Ok(state.mount_points.get(device).cloned().unwrap_or_default())
    }

    async fn mount(&self, device: &str, _fstype_hint: &str, _options: &[String]) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.mount_calls += 1;
        let target = state
            .mount_targets
            .get(device)
            .cloned()
            .ok_or_else(|| DeviceError::OperationFailed(format!("no mount target for {device}")))?;
        state
            .mount_points
            .insert(device.to_string(), vec![target.clone()]);
        Ok(target)
    }

    async fn unmount(&self, device: &str, _options: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.unmount_calls += 1;
        *state
            .unmount_attempts
            .entry(device.to_string())
            .or_default() += 1;
        let attempts = state.unmount_attempts[device];

        if let Some(remaining) = state.failing_unmounts.get_mut(device)
            && *remaining > 0
        {
            *remaining = remaining.saturating_sub(1);
            if state.auto_clear_after.get(device) == Some(&attempts) {
                state.mount_points.remove(device);
            }
            return Err(DeviceError::OperationFailed(format!(
                "simulated busy unmount of {device}"
            )));
        }

        state.mount_points.remove(device);
        Ok(())
    }
}

/// Replays canned [`CommandOutput`]s and records every invocation
#[derive(Default)]
pub struct ScriptedRunner {
    outputs: Mutex<VecDeque<CommandOutput>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn push_output(&self, code: i32, stdout: &str, stderr: &str) {
        self.outputs.lock().unwrap().push_back(CommandOutput {
            code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
    }

    /// Commands executed so far, as "program arg arg" strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let mut call = program.to_string();
        for arg in args {
            call.push(' ');
            call.push_str(arg);
        }
        self.calls.lock().unwrap().push(call);

        // An empty script means "nothing holds the device": exit 1 is
        // the fuser convention for no holders.
        Ok(self
            .outputs
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(CommandOutput {
                code: 1,
                stdout: String::new(),
                stderr: String::new(),
            }))
    }
}
