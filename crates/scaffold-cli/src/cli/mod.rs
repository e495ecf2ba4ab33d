//! CLI argument definitions using the clap derive API.
//!
//! This module is the *only* place that knows about argument names, aliases,
//! help text, and value enums. No business logic lives here.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};

use scaffold_core::{application::InterruptedPolicy, domain::Assignment};

pub mod global;
pub use global::{GlobalArgs, OutputFormat};

// ── Top-level CLI ─────────────────────────────────────────────────────────────

/// Main CLI entry-point.
#[derive(Debug, Parser)]
#[command(
    name    = "scaffold",
    bin_name = "scaffold",
    version  = env!("CARGO_PKG_VERSION"),
    author   = env!("CARGO_PKG_AUTHORS"),
    about    = "\u{26a1} Declarative, resumable project scaffolding",
    long_about = "Scaffold applies a plan of steps (commands, file copies, templates, \
                  text appends, questions) to a target directory. Every step is \
                  recorded in an action log, so a failed run can be resumed.",
    after_help = "EXAMPLES:\n\
        \x20 scaffold apply rails/plan.toml --target shop --var app_name=shop\n\
        \x20 scaffold apply rails/plan.toml --target shop --resume\n\
        \x20 scaffold check rails/plan.toml\n\
        \x20 scaffold status --target shop",
    arg_required_else_help = true,
    subcommand_required    = true,
)]
pub struct Cli {
    /// Flags available on every subcommand.
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

// ── Subcommands ───────────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Apply a plan to a target directory.
    #[command(
        visible_alias = "a",
        about = "Apply a plan",
        after_help = "EXAMPLES:\n\
            \x20 scaffold apply plan.toml --target shop\n\
            \x20 scaffold apply plan.toml --target shop --var devise=true --non-interactive\n\
            \x20 scaffold apply plan.toml --target shop --dry-run\n\
            \x20 scaffold apply plan.toml --target shop --resume --on-interrupted rerun"
    )]
    Apply(ApplyArgs),

    /// Validate a plan and list its steps.
    #[command(
        about = "Validate a plan",
        after_help = "EXAMPLES:\n\
            \x20 scaffold check plan.toml"
    )]
    Check(CheckArgs),

    /// Summarize the action log of a target directory.
    #[command(about = "Show action log status")]
    Status(TargetArgs),

    /// Delete the action log so the next apply starts from scratch.
    #[command(about = "Delete the action log")]
    Reset(ResetArgs),

    /// Generate shell completion scripts.
    #[command(
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n\
            \x20 scaffold completions bash > ~/.local/share/bash-completion/completions/scaffold\n\
            \x20 scaffold completions zsh  > ~/.zfunc/_scaffold\n\
            \x20 scaffold completions fish > ~/.config/fish/completions/scaffold.fish"
    )]
    Completions(CompletionsArgs),

    /// Manage the Scaffold configuration.
    #[command(
        about = "Configuration management",
        subcommand,
        after_help = "EXAMPLES:\n\
            \x20 scaffold config show\n\
            \x20 scaffold config path\n\
            \x20 scaffold config init --force"
    )]
    Config(ConfigCommands),
}

// ── apply ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Path to the plan file.
    #[arg(value_name = "PLAN", help = "Plan file (plan.toml)")]
    pub plan: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Variable assignment; repeatable. Also answers prompts and gates.
    #[arg(
        long = "var",
        value_name = "NAME=VALUE",
        value_parser = Assignment::from_str,
        help = "Set a variable (repeatable)"
    )]
    pub vars: Vec<Assignment>,

    /// Never prompt; every question takes its default.
    #[arg(long = "non-interactive", help = "Use defaults instead of prompting")]
    pub non_interactive: bool,

    /// Continue a previous run recorded in the action log.
    #[arg(long = "resume", help = "Resume from the existing action log")]
    pub resume: bool,

    /// Preview what would be done without writing any files.
    #[arg(long = "dry-run", help = "Show what would run without running it")]
    pub dry_run: bool,

    /// What to do with a step that started but never finished.
    #[arg(
        long = "on-interrupted",
        value_name = "POLICY",
        value_parser = InterruptedPolicy::from_str,
        help = "Interrupted step policy: halt, rerun or assume-done"
    )]
    pub on_interrupted: Option<InterruptedPolicy>,

    /// Timeout for each external command.
    #[arg(long = "timeout", value_name = "SECS", help = "Command timeout in seconds")]
    pub timeout: Option<u64>,
}

// ── check ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CheckArgs {
    #[arg(value_name = "PLAN", help = "Plan file (plan.toml)")]
    pub plan: PathBuf,
}

// ── status / reset ────────────────────────────────────────────────────────────

/// The directory a plan is applied to.
#[derive(Debug, Args)]
pub struct TargetArgs {
    #[arg(
        short = 't',
        long = "target",
        value_name = "DIR",
        default_value = ".",
        help = "Target directory"
    )]
    pub target: PathBuf,
}

#[derive(Debug, Args)]
pub struct ResetArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Skip the confirmation prompt.
    #[arg(short = 'y', long = "yes", help = "Delete without asking")]
    pub yes: bool,
}

// ── completions ───────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell.
    #[arg(value_enum, help = "Shell to generate completions for")]
    pub shell: Shell,
}

/// Supported shells for completion generation.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ── config subcommands ────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration.
    Show,
    /// Print the path to the default configuration file.
    Path,
    /// Write the default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(short = 'f', long = "force")]
        force: bool,
    },
}

// ── tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, Parser};

    #[test]
    fn verify_cli_structure() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_apply_command() {
        let cli = Cli::parse_from([
            "scaffold",
            "apply",
            "plan.toml",
            "--target",
            "shop",
            "--var",
            "app_name=shop",
            "--var",
            "devise=yes",
            "--on-interrupted",
            "assume-done",
            "--timeout",
            "30",
        ]);
        let Commands::Apply(args) = cli.command else {
            panic!("expected Apply command");
        };
        assert_eq!(args.plan, PathBuf::from("plan.toml"));
        assert_eq!(args.target.target, PathBuf::from("shop"));
        assert_eq!(args.vars.len(), 2);
        assert_eq!(args.vars[1].name, "devise");
        assert_eq!(args.on_interrupted, Some(InterruptedPolicy::AssumeDone));
        assert_eq!(args.timeout, Some(30));
        assert!(!args.resume);
    }

    #[test]
    fn target_defaults_to_current_dir() {
        let cli = Cli::parse_from(["scaffold", "status"]);
        let Commands::Status(args) = cli.command else {
            panic!("expected Status command");
        };
        assert_eq!(args.target, PathBuf::from("."));
    }

    #[test]
    fn malformed_var_is_rejected() {
        let result = Cli::try_parse_from(["scaffold", "apply", "plan.toml", "--var", "novalue"]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result = Cli::try_parse_from([
            "scaffold",
            "apply",
            "plan.toml",
            "--on-interrupted",
            "ignore",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let result = Cli::try_parse_from(["scaffold", "--quiet", "--verbose", "status"]);
        assert!(result.is_err());
    }
}
