//! `revtether devices`: phones visible over adb.

use std::sync::Arc;

use tabled::Tabled;

use revtether_core::{Device, DeviceSessionManager};
use revtether_host::{AdbExecutor, ProcessRunner};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Android")]
    android: String,
}

impl From<&Device> for DeviceRow {
    fn from(d: &Device) -> Self {
        Self {
            serial: d.id.clone(),
            state: d.authorization.to_string(),
            model: d.model.clone().unwrap_or_else(|| "-".into()),
            android: d.version.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = util::load(global)?;
    let session = loaded.session_config()?;
    let executor = AdbExecutor::new(
        &loaded.config.adb.program,
        ProcessRunner::new(loaded.config.command_timeout()),
    );
    let manager = DeviceSessionManager::new(
        Arc::new(executor),
        session.tether.auth_grace,
        session.tether.wait_timeout,
    );

    let devices = manager.list_described().await?;
    if devices.is_empty() && global.output == OutputFormat::Table {
        output::print_output("No devices attached.", global.quiet);
        return Ok(());
    }

    let rendered =
        output::render_list(global.output, &devices, |d| DeviceRow::from(d), |d| d.id.clone())?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
