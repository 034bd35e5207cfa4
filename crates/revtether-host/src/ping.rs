// ── ICMP probes via the system `ping` ──

use std::time::Duration;

use revtether_core::{PingReport, PingRequest};

use crate::error::HostError;
use crate::process::ProcessRunner;

/// Phrases iputils and busybox use when a don't-fragment probe is too big.
const FRAGMENTATION_MARKERS: &[&str] = &["message too long", "frag needed", "local error"];

/// Arguments for one request: `-n -c <count> -W <secs> [-s <size> -M do] <target>`.
pub fn ping_args(request: &PingRequest) -> Vec<String> {
    let wait = request.timeout.as_secs().max(1);
    let mut args = vec![
        "-n".to_owned(),
        "-c".to_owned(),
        request.count.max(1).to_string(),
        "-W".to_owned(),
        wait.to_string(),
    ];
    if let Some(size) = request.payload_size {
        args.push("-s".into());
        args.push(size.to_string());
    }
    if request.dont_fragment {
        args.push("-M".into());
        args.push("do".into());
    }
    args.push(request.target.to_string());
    args
}

/// Mean round trip from the `rtt min/avg/max/mdev = a/b/c/d ms` summary.
pub fn parse_mean_latency(output: &str) -> Option<Duration> {
    let line = output
        .lines()
        .find(|line| line.starts_with("rtt ") || line.starts_with("round-trip "))?;
    let values = line.split('=').nth(1)?.trim();
    let avg: f64 = values.split('/').nth(1)?.trim().parse().ok()?;
    (avg.is_finite() && avg >= 0.0).then(|| Duration::from_secs_f64(avg / 1000.0))
}

pub fn is_fragmentation_failure(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    FRAGMENTATION_MARKERS
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Build a report from exit status and combined output.
pub fn interpret(status: i32, output: &str) -> PingReport {
    if is_fragmentation_failure(output) {
        return PingReport {
            success: false,
            mean_latency: None,
            fragmentation_failure: true,
        };
    }
    PingReport {
        success: status == 0,
        mean_latency: if status == 0 {
            parse_mean_latency(output)
        } else {
            None
        },
        fragmentation_failure: false,
    }
}

#[derive(Debug, Clone)]
pub struct Ping {
    program: String,
    runner: ProcessRunner,
}

impl Ping {
    pub fn new(program: impl Into<String>, runner: ProcessRunner) -> Self {
        Self {
            program: program.into(),
            runner,
        }
    }

    /// No reply is an unreachable report, not an error. Only a ping that
    /// cannot be run at all fails.
    pub async fn ping(&self, request: &PingRequest) -> Result<PingReport, HostError> {
        let args = ping_args(request);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.runner.run(&self.program, &args).await?;
        Ok(interpret(output.status, &output.combined()))
    }
}
