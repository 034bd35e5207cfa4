//! `revtether tune`: run the tuner alone on a configured interface.

use revtether_core::{CoreError, PerformanceTuner};

use crate::cli::{GlobalOpts, TuneArgs};
use crate::error::CliError;
use crate::output::{self, Painter};

use super::{start, util};

pub async fn handle(args: TuneArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = util::load(global)?;
    let mut settings = loaded.session_config()?.tuning;
    settings.enabled = true;
    if let Some(policy) = args.mtu_policy {
        settings.mtu_policy = util::mtu_policy(policy);
    }
    if args.measure {
        settings.measure_throughput = true;
    }

    let caps = util::capabilities(&loaded.host_options(settings.measure_throughput)?)?;
    if caps.inspector.interface_state(&args.interface).await?.is_none() {
        return Err(CoreError::InterfaceNotFound {
            name: args.interface,
        }
        .into());
    }

    let prompt = format!(
        "Apply TCP, MTU and USB power tuning to {}?",
        args.interface
    );
    if !util::confirm("tune", &prompt, global.yes)? {
        return Ok(());
    }

    let tuner = PerformanceTuner::new(caps.inspector, caps.mutator, caps.throughput, settings);
    let report = tuner.tune(&args.interface).await;

    let painter = Painter::new(global.color);
    let rendered = output::render_single(
        global.output,
        &report,
        |r| {
            let mut out = format!("Tuned {}\n", args.interface);
            start::tuning_lines(&mut out, r, painter);
            out.trim_end().to_owned()
        },
        |r| r.mtu.map(|m| m.value.to_string()).unwrap_or_default(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
