//! Tracing subscriber for the `scaffold` binary.
//!
//! The library crates only emit events; this is the one place a subscriber
//! is installed. Events go to stderr so `--output-format json` keeps stdout
//! parseable. `RUST_LOG` replaces the level chosen by `-v`/`-q`.

use std::io::IsTerminal as _;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::GlobalArgs;

/// Crates whose events are shown at the level chosen on the command line.
const TARGETS: [&str; 3] = ["scaffold", "scaffold_core", "scaffold_adapters"];

/// Install the global subscriber. Fails if one is already registered.
pub fn init_logging(args: &GlobalArgs) -> anyhow::Result<()> {
    let level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directives(level)));

    // Which crate logged only matters once step internals are visible.
    let detailed = matches!(level, "debug" | "trace");

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(detailed)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(!args.no_color && std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise tracing: {e}"))
}

/// `EnvFilter` directives giving every scaffold crate `level`; other crates
/// stay at the default (off).
fn directives(level: &str) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}
