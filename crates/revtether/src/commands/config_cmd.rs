//! Config subcommand handlers.

use revtether_config::Config;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::util;

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = util::config_path(global);

    match args.command {
        ConfigCommand::Show => {
            // Missing files are fine; the defaults are the effective config.
            let loaded = util::load(global)?;
            let rendered = match global.output {
                OutputFormat::Table | OutputFormat::Plain => {
                    revtether_config::to_toml(&loaded.config)?
                }
                format => {
                    output::render_single(format, &loaded.config, |_| String::new(), |_| {
                        String::new()
                    })?
                }
            };
            output::print_output(rendered.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init { force } => {
            revtether_config::save_config(&Config::default(), &path, force)?;
            output::print_output(
                &format!("Wrote default configuration to {}", path.display()),
                global.quiet,
            );
            Ok(())
        }
    }
}
