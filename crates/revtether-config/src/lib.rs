//! Configuration for the revtether CLI.
//!
//! Built-in defaults, a TOML file at the platform config path and
//! `REVTETHER_` environment variables are layered with figment, then
//! translated into `revtether_core::SessionConfig`. The core crate never
//! reads this file itself.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use revtether_core::config::DEFAULT_TETHER_COMMANDS;
use revtether_core::{
    MtuPolicy, NetworkConfig, SessionConfig, SessionPaths, TetherSettings, TuningSettings,
};

/// Environment prefix; `__` separates nesting (`REVTETHER_TUNING__ENABLED`).
pub const ENV_PREFIX: &str = "REVTETHER_";

/// Smallest MTU any IPv4 host must accept.
const MIN_MTU: u32 = 576;
const MAX_MTU: u32 = 9000;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file {} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub adb: AdbSection,

    #[serde(default)]
    pub tether: TetherSection,

    #[serde(default)]
    pub tuning: TuningSection,

    #[serde(default)]
    pub paths: PathsSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AdbSection {
    #[serde(default = "default_adb_program")]
    pub program: String,

    /// `0` waits forever.
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_secs: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

impl Default for AdbSection {
    fn default() -> Self {
        Self {
            program: default_adb_program(),
            wait_timeout_secs: default_wait_timeout(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

fn default_adb_program() -> String {
    "adb".into()
}
fn default_wait_timeout() -> u64 {
    60
}
fn default_command_timeout() -> u64 {
    15
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TetherSection {
    /// Wait after the RNDIS switch. Five to ten seconds covers USB
    /// re-enumeration on the phones seen so far.
    #[serde(default = "default_settle")]
    pub settle_secs: u64,

    #[serde(default = "default_auth_grace")]
    pub auth_grace_secs: u64,

    #[serde(default = "default_link_settle")]
    pub link_settle_secs: u64,

    #[serde(default = "default_commands")]
    pub commands: Vec<String>,

    /// Leave the tether DNS in place after a successful run.
    #[serde(default)]
    pub keep_dns: bool,
}

impl Default for TetherSection {
    fn default() -> Self {
        Self {
            settle_secs: default_settle(),
            auth_grace_secs: default_auth_grace(),
            link_settle_secs: default_link_settle(),
            commands: default_commands(),
            keep_dns: false,
        }
    }
}

fn default_settle() -> u64 {
    8
}
fn default_auth_grace() -> u64 {
    5
}
fn default_link_settle() -> u64 {
    2
}
fn default_commands() -> Vec<String> {
    DEFAULT_TETHER_COMMANDS
        .iter()
        .map(|c| (*c).to_owned())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TuningSection {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub mtu_policy: MtuPolicy,

    #[serde(default = "default_fixed_mtu")]
    pub fixed_mtu: u32,

    /// Swept largest first regardless of the order written here.
    #[serde(default = "default_mtu_candidates")]
    pub mtu_candidates: Vec<u32>,

    #[serde(default = "default_probe_target")]
    pub probe_target: Ipv4Addr,

    #[serde(default = "default_probe_count")]
    pub probe_count: u32,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    #[serde(default = "default_true")]
    pub usb_power: bool,

    #[serde(default)]
    pub measure_throughput: bool,

    #[serde(default = "default_speedtest_url")]
    pub speedtest_url: String,
}

impl Default for TuningSection {
    fn default() -> Self {
        Self {
            enabled: true,
            mtu_policy: MtuPolicy::default(),
            fixed_mtu: default_fixed_mtu(),
            mtu_candidates: default_mtu_candidates(),
            probe_target: default_probe_target(),
            probe_count: default_probe_count(),
            probe_timeout_secs: default_probe_timeout(),
            usb_power: true,
            measure_throughput: false,
            speedtest_url: default_speedtest_url(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_fixed_mtu() -> u32 {
    1400
}
fn default_mtu_candidates() -> Vec<u32> {
    vec![1500, 1480, 1460, 1440, 1420, 1400, 1380, 1360]
}
fn default_probe_target() -> Ipv4Addr {
    Ipv4Addr::new(8, 8, 8, 8)
}
fn default_probe_count() -> u32 {
    3
}
fn default_probe_timeout() -> u64 {
    2
}
fn default_speedtest_url() -> String {
    "https://speed.cloudflare.com/__down?bytes=10000000".into()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PathsSection {
    #[serde(default = "default_resolver")]
    pub resolver: PathBuf,

    /// Staging resolver, resolver backup and interface snapshots.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            resolver: default_resolver(),
            state_dir: default_state_dir(),
        }
    }
}

fn default_resolver() -> PathBuf {
    PathBuf::from("/etc/resolv.conf")
}
fn default_state_dir() -> PathBuf {
    PathBuf::from("/tmp/revtether")
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.adb.program.trim().is_empty() {
            return Err(invalid("adb.program", "must not be empty"));
        }
        if self.adb.command_timeout_secs == 0 {
            return Err(invalid("adb.command_timeout_secs", "must be at least 1"));
        }
        if self.tether.commands.is_empty() {
            return Err(invalid("tether.commands", "at least one command is required"));
        }
        check_mtu("tuning.fixed_mtu", self.tuning.fixed_mtu)?;
        if self.tuning.mtu_candidates.is_empty() {
            return Err(invalid("tuning.mtu_candidates", "must not be empty"));
        }
        for mtu in &self.tuning.mtu_candidates {
            check_mtu("tuning.mtu_candidates", *mtu)?;
        }
        if self.tuning.probe_count == 0 {
            return Err(invalid("tuning.probe_count", "must be at least 1"));
        }
        self.speedtest_url()?;
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.adb.command_timeout_secs)
    }

    pub fn speedtest_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.tuning.speedtest_url)
            .map_err(|e| invalid("tuning.speedtest_url", e.to_string()))
    }

    /// Build the runtime configuration a session runs with.
    pub fn to_session_config(&self) -> Result<SessionConfig, ConfigError> {
        self.validate()?;

        let mut mtu_candidates = self.tuning.mtu_candidates.clone();
        mtu_candidates.sort_unstable_by(|a, b| b.cmp(a));
        mtu_candidates.dedup();

        Ok(SessionConfig {
            network: NetworkConfig::tether(),
            tether: TetherSettings {
                settle: Duration::from_secs(self.tether.settle_secs),
                auth_grace: Duration::from_secs(self.tether.auth_grace_secs),
                link_settle: Duration::from_secs(self.tether.link_settle_secs),
                wait_timeout: match self.adb.wait_timeout_secs {
                    0 => None,
                    secs => Some(Duration::from_secs(secs)),
                },
                commands: self.tether.commands.clone(),
            },
            tuning: TuningSettings {
                enabled: self.tuning.enabled,
                mtu_policy: self.tuning.mtu_policy,
                fixed_mtu: self.tuning.fixed_mtu,
                mtu_candidates,
                probe_target: self.tuning.probe_target,
                probe_count: self.tuning.probe_count,
                probe_timeout: Duration::from_secs(self.tuning.probe_timeout_secs.max(1)),
                usb_power: self.tuning.usb_power,
                measure_throughput: self.tuning.measure_throughput,
            },
            paths: SessionPaths {
                resolver: self.paths.resolver.clone(),
                state_dir: self.paths.state_dir.clone(),
            },
            preferred_interface: None,
            keep_dns_on_success: self.tether.keep_dns,
        })
    }
}

fn check_mtu(field: &str, mtu: u32) -> Result<(), ConfigError> {
    if (MIN_MTU..=MAX_MTU).contains(&mtu) {
        Ok(())
    } else {
        Err(invalid(
            field,
            format!("{mtu} is outside {MIN_MTU}..={MAX_MTU}"),
        ))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "revtether").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("revtether");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the file at `path` (if present), then the environment.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load from an explicit file (or the canonical one) plus environment.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    let config: Config = figment(&path).extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

pub fn to_toml(cfg: &Config) -> Result<String, ConfigError> {
    Ok(toml::to_string_pretty(cfg)?)
}

/// Write `cfg` to `path`. Refuses to replace an existing file unless `force`.
pub fn save_config(cfg: &Config, path: &Path, force: bool) -> Result<(), ConfigError> {
    if !force && path.exists() {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, to_toml(cfg)?)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_translate_to_session_defaults() {
        let session = Config::default().to_session_config().unwrap();
        assert_eq!(session, SessionConfig::default());
    }

    #[test]
    fn file_and_env_layer_over_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [tether]
                settle_secs = 6

                [tuning]
                mtu_policy = "fixed"
                fixed_mtu = 1420
                "#,
            )?;
            jail.set_env("REVTETHER_TUNING__ENABLED", "false");
            jail.set_env("REVTETHER_ADB__PROGRAM", "/opt/platform-tools/adb");

            let cfg = load_config(Some(Path::new("config.toml"))).unwrap();
            assert_eq!(cfg.tether.settle_secs, 6);
            assert_eq!(cfg.tether.auth_grace_secs, 5);
            assert_eq!(cfg.tuning.mtu_policy, MtuPolicy::Fixed);
            assert_eq!(cfg.tuning.fixed_mtu, 1420);
            assert!(!cfg.tuning.enabled);
            assert_eq!(cfg.adb.program, "/opt/platform-tools/adb");
            Ok(())
        });
    }

    #[test]
    fn missing_file_means_defaults() {
        Jail::expect_with(|_| {
            let cfg = load_config(Some(Path::new("nope.toml"))).unwrap();
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn zero_wait_timeout_waits_forever() {
        let mut cfg = Config::default();
        cfg.adb.wait_timeout_secs = 0;
        assert_eq!(cfg.to_session_config().unwrap().tether.wait_timeout, None);
    }

    #[test]
    fn candidates_are_sorted_descending() {
        let mut cfg = Config::default();
        cfg.tuning.mtu_candidates = vec![1400, 1500, 1440, 1500];
        assert_eq!(
            cfg.to_session_config().unwrap().tuning.mtu_candidates,
            vec![1500, 1440, 1400]
        );
    }

    #[test]
    fn rejects_out_of_range_mtu() {
        let mut cfg = Config::default();
        cfg.tuning.mtu_candidates = vec![1500, 200];
        let err = cfg.to_session_config().unwrap_err();
        assert!(
            matches!(&err, ConfigError::Validation { field, .. } if field == "tuning.mtu_candidates"),
            "got {err}"
        );
    }

    #[test]
    fn rejects_bad_speedtest_url() {
        let mut cfg = Config::default();
        cfg.tuning.speedtest_url = "not a url".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn save_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        save_config(&Config::default(), &path, false).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("[tuning]"));
        assert!(written.contains("mtu_policy = \"probe\""));

        let err = save_config(&Config::default(), &path, false).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyExists { .. }));
        save_config(&Config::default(), &path, true).unwrap();
    }

    #[test]
    fn written_file_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.tether.keep_dns = true;
        cfg.paths.state_dir = dir.path().join("state");
        save_config(&cfg, &path, false).unwrap();

        let loaded: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .extract()
            .unwrap();
        assert_eq!(loaded, cfg);
        assert!(loaded.to_session_config().unwrap().keep_dns_on_success);
    }
}
