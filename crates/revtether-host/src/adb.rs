// ── Android debug bridge executor ──
//
// Wraps the `adb` binary. Devices come from `adb devices`; everything
// else is `adb -s <serial> shell ...`.

use async_trait::async_trait;
use tracing::debug;

use revtether_core::{AuthorizationState, CommandExecutor, CoreError, Device, ShellOutput};

use crate::process::ProcessRunner;

const DEVICES_HEADER: &str = "List of devices attached";

/// Parse `adb devices` output into devices, skipping the header and
/// daemon start-up chatter.
pub fn parse_devices(output: &str) -> Vec<Device> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with(DEVICES_HEADER) && !line.starts_with('*'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let serial = fields.next()?;
            let state = fields.next()?;
            Some(Device::new(serial, AuthorizationState::from_adb_state(state)))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct AdbExecutor {
    program: String,
    runner: ProcessRunner,
    /// Bounds `wait-for-device` separately from ordinary commands.
    wait_runner: ProcessRunner,
}

impl AdbExecutor {
    pub fn new(program: impl Into<String>, runner: ProcessRunner) -> Self {
        Self {
            program: program.into(),
            runner,
            wait_runner: ProcessRunner::unbounded(),
        }
    }
}

#[async_trait]
impl CommandExecutor for AdbExecutor {
    async fn list_devices(&self) -> Result<Vec<Device>, CoreError> {
        let output = self.runner.run_checked(&self.program, &["devices"]).await?;
        let devices = parse_devices(&output.stdout);
        debug!(count = devices.len(), "adb devices");
        Ok(devices)
    }

    async fn run_shell(&self, device_id: &str, command: &str) -> Result<ShellOutput, CoreError> {
        let output = self
            .runner
            .run(&self.program, &["-s", device_id, "shell", command])
            .await?;
        if !output.success() && !output.stderr.trim().is_empty() {
            debug!(
                device = device_id,
                command,
                stderr = %output.stderr.trim(),
                "remote command failed"
            );
        }
        Ok(ShellOutput {
            exit_code: output.status,
            stdout: output.stdout,
        })
    }

    async fn wait_for_device(&self) -> Result<(), CoreError> {
        self.wait_runner
            .run_checked(&self.program, &["wait-for-device"])
            .await?;
        Ok(())
    }

    async fn get_property(&self, device_id: &str, name: &str) -> Result<String, CoreError> {
        let output = self
            .runner
            .run_checked(&self.program, &["-s", device_id, "shell", "getprop", name])
            .await?;
        Ok(output.stdout.trim().to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_devices_and_states() {
        let output = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
R58M123ABC\tdevice
emulator-5554\tunauthorized
0123456789\toffline

";
        let devices = parse_devices(output);
        assert_eq!(devices.len(), 3);
        assert_eq!(devices[0].id, "R58M123ABC");
        assert!(devices[0].is_authorized());
        assert_eq!(devices[1].authorization, AuthorizationState::Unauthorized);
        assert_eq!(devices[2].authorization, AuthorizationState::Unauthorized);
    }

    #[test]
    fn empty_list_has_no_devices() {
        assert!(parse_devices("List of devices attached\n\n").is_empty());
        assert!(parse_devices("").is_empty());
    }

    #[test]
    fn long_format_extra_columns_are_ignored() {
        let output = "List of devices attached\nR58M123ABC  device usb:1-2 product:panther model:Pixel_7\n";
        let devices = parse_devices(output);
        assert_eq!(devices.len(), 1);
        assert!(devices[0].is_authorized());
    }
}
