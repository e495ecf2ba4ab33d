//! Flags accepted by every subcommand (`global = true`).

use clap::Args;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Log verbosity. Logs go to stderr and never mix with step output.
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        help = "More log output (-v, -vv, -vvv)",
        long_help = "Log verbosity on stderr:
    (none)  - Warnings, e.g. a reclaimed lock or a hook failure
    -v      - Each step, command and file written
    -vv     - Skip decisions, gate resolution, action log traffic
    -vvv    - Everything"
    )]
    pub verbose: u8,

    /// Print errors only. Also turns prompting off for `apply`.
    #[arg(
        short = 'q',
        long = "quiet",
        global = true,
        conflicts_with = "verbose",
        help = "Only print errors (implies --non-interactive)"
    )]
    pub quiet: bool,

    #[arg(
        long = "no-color",
        global = true,
        env = "NO_COLOR",
        help = "Disable colored output"
    )]
    pub no_color: bool,

    /// Settings file. Must exist when given; otherwise the per-user
    /// config file is used if present.
    #[arg(
        short = 'c',
        long = "config",
        global = true,
        env = "SCAFFOLD_CONFIG",
        value_name = "FILE",
        help = "Settings file (defaults, timeouts, log dir)"
    )]
    pub config: Option<PathBuf>,

    /// `auto` defers to `output.format` in the config, then to terminal
    /// detection.
    #[arg(
        long = "output-format",
        global = true,
        value_enum,
        default_value = "auto",
        help = "Output format for reports and previews"
    )]
    pub output_format: OutputFormat,
}

impl GlobalArgs {
    /// Tracing level for the scaffold crates. `--quiet` wins over `-v`.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// How reports, previews and status are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human on a terminal, plain otherwise.
    #[default]
    Auto,
    /// Colored step lines.
    Human,
    /// Same lines, no colors.
    Plain,
    /// JSON documents on stdout (status, check, dry-run, apply report).
    Json,
}
