//! `revtether restore-dns`: undo a resolver change left behind by a
//! `--keep-dns` run or an interrupted session.

use revtether_core::{ResolverFiles, RestoreOutcome};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::util;

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = util::load(global)?;
    let paths = loaded.session_config()?.paths;
    let files = ResolverFiles::from_paths(&paths);

    let outcome = files.restore();
    files.remove_staging();

    if let RestoreOutcome::Failed(reason) = &outcome {
        return Err(CliError::Host {
            operation: format!("restoring {}", files.live().display()),
            message: reason.clone(),
        });
    }

    let rendered = output::render_single(
        global.output,
        &outcome,
        |o| match o {
            RestoreOutcome::Restored => {
                format!("Restored {} from backup.", files.live().display())
            }
            _ => format!(
                "No resolver backup at {}; nothing to restore.",
                files.backup().display()
            ),
        },
        |o| match o {
            RestoreOutcome::Restored => "restored".into(),
            _ => "nothing_to_restore".into(),
        },
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
