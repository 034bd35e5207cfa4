//! Command handlers, one module per subcommand.

pub mod config_cmd;
pub mod devices;
pub mod dns;
pub mod start;
pub mod status;
pub mod tune;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a host-facing command to its handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Start(args) => start::handle(args, global).await,
        Command::Devices => devices::handle(global).await,
        Command::Status(args) => status::handle(args, global).await,
        Command::Tune(args) => tune::handle(args, global).await,
        Command::RestoreDns => dns::handle(global),
        Command::Config(args) => config_cmd::handle(&args, global),
        Command::Completions(_) => Err(CliError::Internal(
            "completions are generated before dispatch".into(),
        )),
    }
}
