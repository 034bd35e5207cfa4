// ── Performance tuning ──
//
// Best effort from top to bottom. Nothing here can fail the session:
// every failure is logged and recorded in the report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{MtuPolicy, TuningSettings};
use crate::host::{NetworkInspector, NetworkMutator, ThroughputProbe};
use crate::model::{PingRequest, Throughput};

/// Socket buffer and TCP behaviour tunables applied on every run.
pub const TCP_TUNABLES: &[(&str, &str)] = &[
    ("net.core.rmem_max", "16777216"),
    ("net.core.wmem_max", "16777216"),
    ("net.core.rmem_default", "262144"),
    ("net.core.wmem_default", "262144"),
    ("net.ipv4.tcp_rmem", "4096 87380 16777216"),
    ("net.ipv4.tcp_wmem", "4096 65536 16777216"),
    ("net.ipv4.tcp_window_scaling", "1"),
    ("net.ipv4.tcp_timestamps", "1"),
    ("net.ipv4.tcp_sack", "1"),
    ("net.ipv4.tcp_mtu_probing", "1"),
    ("net.ipv4.tcp_fastopen", "3"),
    ("net.ipv4.tcp_slow_start_after_idle", "0"),
];

pub const CONGESTION_AVAILABLE: &str = "net.ipv4.tcp_available_congestion_control";
pub const CONGESTION_CONTROL: &str = "net.ipv4.tcp_congestion_control";

/// Preferred algorithms, best first: model-based low latency, then loss based.
pub const CONGESTION_PREFERENCE: &[&str] = &["bbr", "cubic"];

/// Global USB autosuspend delay; `-1` disables autosuspend.
pub const USB_AUTOSUSPEND_PARAM: &str = "/sys/module/usbcore/parameters/autosuspend";

/// IPv4 header plus ICMP header.
const ICMP_OVERHEAD: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MtuChoice {
    pub value: u32,
    /// Chosen from probe latencies rather than the fixed constant.
    pub probed: bool,
}

/// One candidate size and what probing it showed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MtuSample {
    pub mtu: u32,
    pub mean_latency: Option<Duration>,
    pub fragmented: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TuningReport {
    pub applied: Vec<String>,
    pub failed: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub congestion_control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<MtuChoice>,
    pub usb_autosuspend_disabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_power_control: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_before: Option<Throughput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throughput_after: Option<Throughput>,
}

impl TuningReport {
    /// Percentage change in download rate, when both ends were measured.
    pub fn throughput_change(&self) -> Option<f64> {
        match (&self.throughput_before, &self.throughput_after) {
            (Some(before), Some(after)) => after.change_from(before),
            _ => None,
        }
    }
}

/// Pick the congestion algorithm from the kernel's available list.
pub fn choose_congestion_control(available: &str) -> Option<&'static str> {
    let offered: Vec<&str> = available.split_whitespace().collect();
    CONGESTION_PREFERENCE
        .iter()
        .copied()
        .find(|algo| offered.contains(algo))
}

/// Lowest mean latency among candidates that got through unfragmented.
/// Ties go to the larger MTU, since candidates are probed largest first.
pub fn choose_mtu(samples: &[MtuSample]) -> Option<u32> {
    samples
        .iter()
        .filter(|s| !s.fragmented)
        .filter_map(|s| s.mean_latency.map(|latency| (latency, s.mtu)))
        .min_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, mtu)| mtu)
}

pub struct PerformanceTuner {
    inspector: Arc<dyn NetworkInspector>,
    mutator: Arc<dyn NetworkMutator>,
    throughput: Option<Arc<dyn ThroughputProbe>>,
    settings: TuningSettings,
}

impl PerformanceTuner {
    pub fn new(
        inspector: Arc<dyn NetworkInspector>,
        mutator: Arc<dyn NetworkMutator>,
        throughput: Option<Arc<dyn ThroughputProbe>>,
        settings: TuningSettings,
    ) -> Self {
        Self {
            inspector,
            mutator,
            throughput,
            settings,
        }
    }

    pub async fn tune(&self, interface: &str) -> TuningReport {
        let mut report = TuningReport::default();

        if self.settings.measure_throughput {
            report.throughput_before = self.measure("before").await;
        }

        self.apply_tcp(&mut report).await;
        self.apply_congestion_control(&mut report).await;
        report.mtu = self.apply_mtu(interface, &mut report).await;
        if self.settings.usb_power {
            self.apply_usb_power(interface, &mut report).await;
        }

        if self.settings.measure_throughput {
            report.throughput_after = self.measure("after").await;
            if let Some(change) = report.throughput_change() {
                info!(change_percent = %format!("{change:+.1}"), "throughput change");
            }
        }

        info!(
            applied = report.applied.len(),
            failed = report.failed.len(),
            "tuning finished"
        );
        report
    }

    async fn apply_tcp(&self, report: &mut TuningReport) {
        for (key, value) in TCP_TUNABLES {
            self.write_tunable(key, value, report).await;
        }
    }

    async fn apply_congestion_control(&self, report: &mut TuningReport) {
        let available = match self.inspector.read_tunable(CONGESTION_AVAILABLE).await {
            Ok(Some(list)) => list,
            Ok(None) => {
                debug!("kernel does not list congestion algorithms");
                return;
            }
            Err(e) => {
                warn!(error = %e, "could not read congestion algorithms");
                return;
            }
        };

        match choose_congestion_control(&available) {
            Some(algo) => {
                if self.write_tunable(CONGESTION_CONTROL, algo, report).await {
                    report.congestion_control = Some(algo.to_owned());
                }
            }
            None => info!(available = %available.trim(), "keeping system congestion control"),
        }
    }

    async fn apply_mtu(&self, interface: &str, report: &mut TuningReport) -> Option<MtuChoice> {
        let choice = match self.settings.mtu_policy {
            MtuPolicy::Fixed => self.fixed_mtu(),
            MtuPolicy::Probe => self.probe_mtu().await,
        };

        match self.mutator.set_mtu(interface, choice.value).await {
            Ok(()) => {
                info!(interface, mtu = choice.value, probed = choice.probed, "MTU set");
                report.applied.push(format!("mtu {interface}={}", choice.value));
                Some(choice)
            }
            Err(e) => {
                warn!(interface, mtu = choice.value, error = %e, "failed to set MTU");
                report.failed.push(format!("mtu {interface}"));
                None
            }
        }
    }

    fn fixed_mtu(&self) -> MtuChoice {
        MtuChoice {
            value: self.settings.fixed_mtu,
            probed: false,
        }
    }

    async fn probe_mtu(&self) -> MtuChoice {
        let reachable = self
            .inspector
            .ping(&PingRequest::once(
                self.settings.probe_target,
                self.settings.probe_timeout,
            ))
            .await
            .is_ok_and(|r| r.success);
        if !reachable {
            info!("no connectivity, skipping MTU probe");
            return self.fixed_mtu();
        }

        let mut samples = Vec::with_capacity(self.settings.mtu_candidates.len());
        for &mtu in &self.settings.mtu_candidates {
            let request = PingRequest {
                target: self.settings.probe_target,
                count: self.settings.probe_count,
                timeout: self.settings.probe_timeout,
                payload_size: Some(mtu.saturating_sub(ICMP_OVERHEAD)),
                dont_fragment: true,
            };
            let sample = match self.inspector.ping(&request).await {
                Ok(r) => MtuSample {
                    mtu,
                    mean_latency: if r.success { r.mean_latency } else { None },
                    fragmented: r.fragmentation_failure,
                },
                Err(e) => {
                    debug!(mtu, error = %e, "probe failed");
                    MtuSample {
                        mtu,
                        mean_latency: None,
                        fragmented: false,
                    }
                }
            };
            debug!(?sample, "MTU probe");
            samples.push(sample);
        }

        match choose_mtu(&samples) {
            Some(value) => MtuChoice {
                value,
                probed: true,
            },
            None => {
                info!("no MTU candidate got through, using fixed value");
                self.fixed_mtu()
            }
        }
    }

    async fn apply_usb_power(&self, interface: &str, report: &mut TuningReport) {
        match self
            .mutator
            .write_usb_power(Path::new(USB_AUTOSUSPEND_PARAM), "-1")
            .await
        {
            Ok(()) => {
                report.usb_autosuspend_disabled = true;
                report.applied.push("usb autosuspend=-1".into());
            }
            Err(e) => debug!(error = %e, "global USB autosuspend not changed"),
        }

        let control = match self.inspector.usb_power_control(interface).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                debug!(interface, "no USB power control for interface");
                return;
            }
            Err(e) => {
                debug!(interface, error = %e, "could not resolve USB device");
                return;
            }
        };

        match self.mutator.write_usb_power(&control, "on").await {
            Ok(()) => {
                info!(path = %control.display(), "device autosuspend disabled");
                report.applied.push(format!("{}=on", control.display()));
                report.device_power_control = Some(control);
            }
            Err(e) => {
                warn!(path = %control.display(), error = %e, "could not pin device power");
                report.failed.push(control.display().to_string());
            }
        }
    }

    async fn write_tunable(&self, key: &str, value: &str, report: &mut TuningReport) -> bool {
        match self.mutator.write_tunable(key, value).await {
            Ok(()) => {
                debug!(key, value, "tunable applied");
                report.applied.push(format!("{key}={value}"));
                true
            }
            Err(e) => {
                warn!(key, error = %e, "tunable not applied");
                report.failed.push(key.to_owned());
                false
            }
        }
    }

    async fn measure(&self, phase: &str) -> Option<Throughput> {
        let probe = self.throughput.as_ref()?;
        match probe.measure().await {
            Ok(t) => {
                info!(
                    phase,
                    mbit_per_sec = %format!("{:.2}", t.bits_per_second() / 1_000_000.0),
                    "throughput"
                );
                Some(t)
            }
            Err(e) => {
                warn!(phase, error = %e, "throughput measurement failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(mtu: u32, ms: Option<u64>, fragmented: bool) -> MtuSample {
        MtuSample {
            mtu,
            mean_latency: ms.map(Duration::from_millis),
            fragmented,
        }
    }

    #[test]
    fn congestion_prefers_bbr_then_cubic() {
        assert_eq!(choose_congestion_control("reno cubic bbr"), Some("bbr"));
        assert_eq!(choose_congestion_control("reno cubic\n"), Some("cubic"));
        assert_eq!(choose_congestion_control("reno vegas"), None);
        assert_eq!(choose_congestion_control(""), None);
    }

    #[test]
    fn mtu_lowest_latency_without_fragmentation() {
        let samples = [
            sample(1500, Some(10), true),
            sample(1460, Some(42), false),
            sample(1420, Some(31), false),
            sample(1400, None, false),
        ];
        assert_eq!(choose_mtu(&samples), Some(1420));
    }

    #[test]
    fn mtu_tie_prefers_larger() {
        let samples = [sample(1480, Some(30), false), sample(1440, Some(30), false)];
        assert_eq!(choose_mtu(&samples), Some(1480));
    }

    #[test]
    fn mtu_none_when_everything_fails() {
        let samples = [sample(1500, None, true), sample(1400, None, false)];
        assert_eq!(choose_mtu(&samples), None);
    }
}
