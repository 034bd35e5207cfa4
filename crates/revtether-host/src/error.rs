use thiserror::Error;

use revtether_core::CoreError;

/// Top-level error type for the `revtether-host` crate.
///
/// Covers every way talking to the host can go wrong: spawning tools,
/// their exit status, parsing their output, and HTTP. The core never
/// sees these directly; they are folded into `CoreError` at the trait
/// boundary.
#[derive(Debug, Error)]
pub enum HostError {
    // ── Processes ───────────────────────────────────────────────────
    /// The program could not be started (not installed, not executable).
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran past the command timeout and was killed.
    #[error("{program} timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },

    /// The program exited non-zero.
    #[error("`{command}` exited with status {status}: {stderr}")]
    ExitStatus {
        command: String,
        status: i32,
        stderr: String,
    },

    // ── Data ────────────────────────────────────────────────────────
    /// Tool output did not have the expected shape.
    #[error("Could not parse {what}: {message}")]
    Parse { what: &'static str, message: String },

    // ── HTTP ────────────────────────────────────────────────────────
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    // ── Filesystem ──────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Whether a failed command's stderr mentions `needle` (case-insensitive).
    pub fn stderr_contains(&self, needle: &str) -> bool {
        match self {
            Self::ExitStatus { stderr, .. } => stderr
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
            _ => false,
        }
    }
}

impl From<HostError> for CoreError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::Spawn { program, source } => {
                CoreError::host(format!("starting {program}"), source.to_string())
            }
            HostError::Timeout {
                program,
                timeout_secs,
            } => CoreError::host(program, format!("timed out after {timeout_secs}s")),
            HostError::ExitStatus {
                command,
                status,
                stderr,
            } => CoreError::host(
                command,
                if stderr.is_empty() {
                    format!("exit status {status}")
                } else {
                    stderr
                },
            ),
            HostError::Parse { what, message } => {
                CoreError::host(format!("parsing {what}"), message)
            }
            HostError::Transport(e) => CoreError::host("HTTP request", e.to_string()),
            HostError::InvalidUrl(e) => CoreError::host("URL parsing", e.to_string()),
            HostError::HttpStatus { status, url } => {
                CoreError::host(format!("GET {url}"), format!("HTTP {status}"))
            }
            HostError::Io(e) => CoreError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_status_keeps_stderr_as_message() {
        let err = HostError::ExitStatus {
            command: "ip addr add 192.168.42.100/24 dev usb0".into(),
            status: 2,
            stderr: "RTNETLINK answers: Operation not permitted".into(),
        };
        assert!(err.stderr_contains("operation not permitted"));

        let core: CoreError = err.into();
        assert_eq!(
            core.to_string(),
            "ip addr add 192.168.42.100/24 dev usb0 failed: RTNETLINK answers: Operation not permitted"
        );
    }

    #[test]
    fn spawn_failure_names_program() {
        let err = HostError::Spawn {
            program: "adb".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let core: CoreError = err.into();
        assert!(core.to_string().starts_with("starting adb failed"));
    }
}
