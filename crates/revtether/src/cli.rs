//! Clap derive structures for the `revtether` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of workspace crates so `build.rs` can include it for man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// revtether -- reverse USB tethering for Android phones
#[derive(Debug, Parser)]
#[command(
    name = "revtether",
    version,
    about = "Use an Android phone's mobile data over USB",
    long_about = "Switches a USB-attached Android phone into RNDIS tethering over adb,\n\
        finds the interface it exposes, gives it an address, default route and DNS,\n\
        verifies each step, then tunes TCP, MTU and USB power for throughput.\n\n\
        Most commands change host networking and need root.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "REVTETHER_CONFIG", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MtuPolicyArg {
    /// Sweep candidate sizes with don't-fragment pings
    Probe,
    /// Apply the configured fixed MTU
    Fixed,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Tether through the attached phone and tune the link
    #[command(alias = "up")]
    Start(StartArgs),

    /// List phones visible over adb
    #[command(alias = "dev")]
    Devices,

    /// Show interface, route and gateway state
    Status(StatusArgs),

    /// Tune an interface that is already configured
    Tune(TuneArgs),

    /// Put back a resolver backup left by an interrupted run
    RestoreDns,

    /// Inspect or create the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Start ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StartArgs {
    /// Interface to use if several could be the tether
    #[arg(long, short = 'i', value_name = "NAME")]
    pub interface: Option<String>,

    /// Skip TCP, MTU and USB power tuning
    #[arg(long)]
    pub no_tune: bool,

    /// How the MTU is chosen
    #[arg(long, value_name = "POLICY")]
    pub mtu_policy: Option<MtuPolicyArg>,

    /// Measure download throughput before and after tuning
    #[arg(long)]
    pub measure: bool,

    /// Seconds to wait for USB re-enumeration after the RNDIS switch
    #[arg(long, value_name = "SECS")]
    pub settle: Option<u64>,

    /// Leave the tether DNS in place on success (undo with restore-dns)
    #[arg(long)]
    pub keep_dns: bool,
}

// ── Status / Tune ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Only show this interface
    pub interface: Option<String>,
}

#[derive(Debug, Args)]
pub struct TuneArgs {
    /// Interface to tune
    pub interface: String,

    /// How the MTU is chosen
    #[arg(long, value_name = "POLICY")]
    pub mtu_policy: Option<MtuPolicyArg>,

    /// Measure download throughput before and after tuning
    #[arg(long)]
    pub measure: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration as TOML
    Show,

    /// Print the config file path
    Path,

    /// Write the default configuration to the config file
    Init {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
