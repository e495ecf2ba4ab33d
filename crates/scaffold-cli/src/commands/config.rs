//! `scaffold config` - inspect and initialise configuration.

use std::fs;
use std::path::Path;

use crate::{
    cli::ConfigCommands,
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
};

/// Dispatch to the correct config subcommand.
pub fn execute(
    cmd: ConfigCommands,
    config: AppConfig,
    config_file: Option<&Path>,
    output: OutputManager,
) -> CliResult<()> {
    let path = config_file
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);

    match cmd {
        ConfigCommands::Show => {
            if output.is_json() {
                output.json(&config)?;
            } else {
                output.header("Current Configuration:")?;
                output.print(&render(&config)?)?;
            }
        }

        ConfigCommands::Path => {
            output.print(&path.display().to_string())?;
        }

        ConfigCommands::Init { force } => {
            write_default(&path, force)?;
            output.success(&format!("Wrote {}", path.display()))?;
        }
    }

    Ok(())
}

// ── helpers ───────────────────────────────────────────────────────────────────

fn render(config: &AppConfig) -> CliResult<String> {
    config.to_toml().map_err(|e| CliError::ConfigError {
        message: format!("Failed to serialise config: {e}"),
        source: Some(Box::new(e)),
    })
}

fn write_default(path: &Path, force: bool) -> CliResult<()> {
    if path.exists() && !force {
        return Err(CliError::ConfigError {
            message: format!("{} already exists (use --force to overwrite)", path.display()),
            source: None,
        });
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render(&AppConfig::default())?)?;
    Ok(())
}

// ── tests ─────────────────────────────────────────────────────────────────────
