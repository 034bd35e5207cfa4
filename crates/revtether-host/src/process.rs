// ── External process runner ──
//
// Every host tool (adb, ip, ping) goes through here: arguments are
// logged at debug, output is captured as lossy UTF-8, and the child is
// killed if the future is dropped or the timeout fires.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::HostError;

/// Captured result of one finished process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// Exit code, or -1 when the process died from a signal.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// stdout followed by stderr, for tools that report on either.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }

    /// A runner that waits as long as the child takes.
    pub fn unbounded() -> Self {
        Self { timeout: None }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run to completion and return the output whatever the exit status.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, HostError> {
        debug!(program, args = ?args, "running");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child).await.map_err(|_| {
                HostError::Timeout {
                    program: program.into(),
                    timeout_secs: limit.as_secs(),
                }
            })?,
            None => child.await,
        }
        .map_err(|source| HostError::Spawn {
            program: program.into(),
            source,
        })?;

        let output = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(program, status = output.status, "finished");
        Ok(output)
    }

    /// Like [`run`](Self::run) but a non-zero exit is an error.
    pub async fn run_checked(
        &self,
        program: &str,
        args: &[&str],
    ) -> Result<CommandOutput, HostError> {
        let output = self.run(program, args).await?;
        if output.success() {
            return Ok(output);
        }
        Err(HostError::ExitStatus {
            command: render(program, args),
            status: output.status,
            stderr: output.stderr.trim().to_owned(),
        })
    }
}

/// Shell-like rendering of a command line for error messages.
pub fn render(program: &str, args: &[&str]) -> String {
    let mut line = program.to_owned();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[cfg(all(test, unix))]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_status() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let output = runner.run("sh", &["-c", "echo hello; exit 3"]).await.unwrap();
        assert_eq!(output.status, 3);
        assert_eq!(output.stdout, "hello\n");
    }

    #[tokio::test]
    async fn checked_run_reports_stderr() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let err = runner
            .run_checked("sh", &["-c", "echo 'File exists' >&2; exit 2"])
            .await
            .unwrap_err();
        assert!(err.stderr_contains("file exists"));
        assert!(err.to_string().contains("exited with status 2"));
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let runner = ProcessRunner::new(Duration::from_secs(5));
        let err = runner
            .run("revtether-definitely-not-installed", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Spawn { .. }));
    }

    #[tokio::test]
    async fn slow_program_times_out() {
        let runner = ProcessRunner::new(Duration::from_millis(100));
        let err = runner.run("sleep", &["5"]).await.unwrap_err();
        assert!(matches!(err, HostError::Timeout { .. }));
    }

    #[test]
    fn renders_command_line() {
        assert_eq!(
            render("ip", &["route", "add", "default"]),
            "ip route add default"
        );
    }
}
