//! Application configuration.
//!
//! [`AppConfig`] is loaded once at startup and passed down by value. The
//! CLI layer owns config; the core crate never sees it.
//!
//! # Resolution order (highest priority first)
//!
//! 1. CLI flags (handled at the call-site, not here)
//! 2. Environment variables: `SCAFFOLD_APPLY__NON_INTERACTIVE=true`,
//!    `SCAFFOLD_OUTPUT__NO_COLOR=true`, ...
//! 3. Config file (`--config FILE`, or the platform config dir)
//! 4. Built-in defaults (always present)

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::debug;

use scaffold_adapters::action_log::{LOG_DIR, LOG_FILE};
use scaffold_core::application::InterruptedPolicy;

const ENV_PREFIX: &str = "SCAFFOLD";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub apply: ApplyConfig,
    pub output: OutputConfig,
}

/// Defaults for `scaffold apply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyConfig {
    /// Never prompt; every question takes its default.
    pub non_interactive: bool,
    /// Timeout for each external command, in seconds. `0` disables it.
    pub command_timeout_secs: u64,
    pub on_interrupted: InterruptedPolicy,
    /// Directory under the target that holds the action log.
    pub log_dir: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub no_color: bool,
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            apply: ApplyConfig {
                non_interactive: false,
                command_timeout_secs: 0,
                on_interrupted: InterruptedPolicy::Halt,
                log_dir: LOG_DIR.into(),
            },
            output: OutputConfig {
                no_color: false,
                format: "human".into(),
            },
        }
    }
}

impl ApplyConfig {
    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }

    /// Location of the action log for a target directory.
    pub fn log_path(&self, target: &Path) -> PathBuf {
        target.join(&self.log_dir).join(LOG_FILE)
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the config file, then `SCAFFOLD_*`
    /// environment variables.
    ///
    /// An explicit `config_file` must exist; the default location is optional.
    pub fn load(config_file: Option<&PathBuf>) -> anyhow::Result<Self> {
        let (path, required) = match config_file {
            Some(path) => (path.clone(), true),
            None => (Self::config_path(), false),
        };
        debug!(path = %path.display(), required, "Loading configuration");

        Self::load_from(&path, required, environment())
    }

    fn load_from(path: &Path, required: bool, env: Environment) -> anyhow::Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path).required(required))
            .add_source(env.try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Path to the default configuration file.
    ///
    /// Uses `directories::ProjectDirs` for cross-platform correctness,
    /// falling back to `.scaffold.toml` in the current directory.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("com", "scaffold", "scaffold")
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from(".scaffold.toml"))
    }

    /// The configuration rendered as TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn no_env() -> Environment {
        environment().source(Some(HashMap::new()))
    }

    #[test]
    fn defaults_halt_on_interrupted_steps() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.apply.on_interrupted, InterruptedPolicy::Halt);
        assert!(!cfg.output.no_color);
        assert_eq!(cfg.apply.command_timeout(), None);
    }

    #[test]
    fn missing_optional_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let cfg = AppConfig::load_from(&temp.path().join("none.toml"), false, no_env()).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        assert!(AppConfig::load_from(&temp.path().join("none.toml"), true, no_env()).is_err());
    }

    #[test]
    fn file_values_override_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            "[apply]\nnon_interactive = true\ncommand_timeout_secs = 90\non_interrupted = \"assume-done\"\n",
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path, true, no_env()).unwrap();
        assert!(cfg.apply.non_interactive);
        assert_eq!(cfg.apply.command_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(cfg.apply.on_interrupted, InterruptedPolicy::AssumeDone);
        assert_eq!(cfg.apply.log_dir, ".scaffold");
    }

    #[test]
    fn environment_overrides_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[output]\nno_color = false\n").unwrap();

        let env = environment().source(Some(HashMap::from([(
                "SCAFFOLD_OUTPUT__NO_COLOR".to_string(),
                "true".to_string(),
            )])));

        let cfg = AppConfig::load_from(&path, true, env).unwrap();
        assert!(cfg.output.no_color);
    }

    #[test]
    fn log_path_uses_configured_dir() {
        let cfg = AppConfig::default();
        assert_eq!(
            cfg.apply.log_path(Path::new("shop")),
            Path::new("shop/.scaffold/actions.jsonl")
        );
    }

    #[test]
    fn renders_as_toml() {
        let text = AppConfig::default().to_toml().unwrap();
        assert!(text.contains("[apply]"));
        assert!(text.contains("on_interrupted = \"halt\""));
    }
}
