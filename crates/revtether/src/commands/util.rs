//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::path::PathBuf;

use revtether_config::Config;
use revtether_core::{Capabilities, CoreError, MtuPolicy, SessionConfig};
use revtether_host::HostOptions;

use crate::cli::{GlobalOpts, MtuPolicyArg};
use crate::error::CliError;

/// The effective configuration and the file it came from.
#[derive(Debug)]
pub struct Loaded {
    pub config: Config,
    pub path: PathBuf,
}

impl Loaded {
    pub fn session_config(&self) -> Result<SessionConfig, CliError> {
        self.config
            .to_session_config()
            .map_err(|e| CliError::from_config(e, &self.path))
    }

    /// Host programs and limits. The throughput URL is only resolved
    /// when a measurement will actually run.
    pub fn host_options(&self, measure: bool) -> Result<HostOptions, CliError> {
        let speedtest_url = if measure {
            Some(
                self.config
                    .speedtest_url()
                    .map_err(|e| CliError::from_config(e, &self.path))?,
            )
        } else {
            None
        };
        Ok(HostOptions {
            adb_program: self.config.adb.program.clone(),
            command_timeout: self.config.command_timeout(),
            speedtest_url,
            ..HostOptions::default()
        })
    }
}

pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(revtether_config::config_path)
}

/// Load defaults, the config file and `REVTETHER_*` overrides.
pub fn load(global: &GlobalOpts) -> Result<Loaded, CliError> {
    let path = config_path(global);
    let config = revtether_config::load_config(Some(path.as_path()))
        .map_err(|e| CliError::from_config(e, &path))?;
    config
        .validate()
        .map_err(|e| CliError::from_config(e, &path))?;
    Ok(Loaded { config, path })
}

pub fn capabilities(options: &HostOptions) -> Result<Capabilities, CliError> {
    revtether_host::capabilities(options).map_err(|e| CliError::from(CoreError::from(e)))
}

pub fn mtu_policy(arg: MtuPolicyArg) -> MtuPolicy {
    match arg {
        MtuPolicyArg::Probe => MtuPolicy::Probe,
        MtuPolicyArg::Fixed => MtuPolicy::Fixed,
    }
}

/// Fail early when a prompt would be needed but nobody can answer it.
pub fn require_interactive(action: &str, yes_flag: bool) -> Result<(), CliError> {
    if yes_flag || std::io::stdin().is_terminal() {
        Ok(())
    } else {
        Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        })
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(action: &str, message: &str, yes_flag: bool) -> Result<bool, CliError> {
    require_interactive(action, yes_flag)?;
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
