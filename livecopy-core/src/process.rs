// SPDX-License-Identifier: GPL-3.0-only

//! External-command execution with captured output.
//!
//! The core shells out for two measurements it cannot get from the
//! device service: directory disk usage (`du -sb`) and the list of
//! processes holding a device node open (`fuser -m`).

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{DeviceError, Result};

/// Captured result of an external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Process exit code (-1 if terminated by signal)
    pub code: i32,

    /// Captured standard output
    pub stdout: String,

    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs external utilities and captures their output
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// [`ProcessRunner`] backed by `tokio::process::Command`
#[derive(Debug, Default)]
pub struct SystemProcessRunner;

#[async_trait]
impl ProcessRunner for SystemProcessRunner {
    async fn execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        debug!(program, ?args, "executing external command");
        let output = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .output()
            .await
            .map_err(DeviceError::Io)?;

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Measure the byte size of a directory tree with `du -sb`.
///
/// The utility prints the byte count as the first whitespace-separated
/// token; anything else is a measurement error the caller converts to
/// the unknown sentinel.
pub async fn disk_usage_bytes(runner: &dyn ProcessRunner, path: &str) -> AnyResult<u64> {
    let output = runner
        .execute("du", &["-sb", path])
        .await
        .with_context(|| format!("running du -sb {path}"))?;
    if !output.success() {
        anyhow::bail!("du -sb {path} exited with code {}", output.code);
    }
    parse_du_output(&output.stdout).with_context(|| format!("parsing du output for {path}"))
}

pub(crate) fn parse_du_output(stdout: &str) -> AnyResult<u64> {
    let token = stdout
        .split_whitespace()
        .next()
        .context("du produced no output")?;
    token
        .parse::<u64>()
        .with_context(|| format!("du output does not start with a byte count: {token:?}"))
}

/// Ask `fuser -m` which processes hold a device open.
///
/// A zero exit code means holders exist; their listing is returned for
/// diagnostics. A non-zero exit code means the device is free.
pub async fn device_holders(runner: &dyn ProcessRunner, device: &str) -> AnyResult<Option<String>> {
    let device_path = format!("/dev/{device}");
    let output = runner
        .execute("fuser", &["-m", &device_path])
        .await
        .with_context(|| format!("running fuser -m {device_path}"))?;
    if output.success() {
        Ok(Some(output.stdout))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_du_byte_count() {
        assert_eq!(parse_du_output("1000000\t/home/user\n").unwrap(), 1_000_000);
        assert_eq!(parse_du_output("  50000 /etc/cups").unwrap(), 50_000);
    }

    #[test]
    fn rejects_unparsable_du_output() {
        assert!(parse_du_output("").is_err());
        assert!(parse_du_output("du: cannot access '/home/user'").is_err());
    }

    #[tokio::test]
    async fn system_runner_captures_output() {
        let runner = SystemProcessRunner;
        let output = runner.execute("echo", &["hello"]).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }
}
