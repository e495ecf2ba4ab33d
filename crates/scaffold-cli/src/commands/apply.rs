//! `scaffold apply` - run a plan against a target directory.

use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use serde_json::json;
use tracing::{info, instrument};

use scaffold_adapters::{
    DirectoryResourceStore, JsonLinesActionLog, LocalFilesystem, NonInteractivePrompter,
    ProcessRunner,
};
use scaffold_core::{
    application::{
        ActionLog, ApplicationError, ApplyOptions, PlannedStep, RunReport, Sequencer, StepState,
        ports::Prompter,
    },
    domain::{Assignment, Variables},
    error::ScaffoldError,
};

use crate::{
    cli::{ApplyArgs, GlobalArgs},
    commands::load_plan,
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
    prompt::TerminalPrompter,
};

/// 1. Load and validate the plan
/// 2. Build the sequencer over real adapters
/// 3. `--dry-run`: preview and stop
/// 4. Open (and lock) the action log, refusing a stale one without `--resume`
/// 5. Apply, report, and turn a halt into exit code 5
#[instrument(skip_all, fields(plan = %args.plan.display(), target = %args.target.target.display()))]
pub fn execute(
    args: ApplyArgs,
    global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    let loaded = load_plan(&args.plan)?;
    let target = args.target.target.clone();

    let options = ApplyOptions {
        overrides: overrides(&args.vars),
        on_interrupted: args.on_interrupted.unwrap_or(config.apply.on_interrupted),
        default_timeout: args
            .timeout
            .map(Duration::from_secs)
            .or_else(|| config.apply.command_timeout()),
    };

    let non_interactive = args.non_interactive
        || config.apply.non_interactive
        || global.quiet
        || !std::io::stdin().is_terminal();
    let prompter: Box<dyn Prompter> = if non_interactive {
        Box::new(NonInteractivePrompter)
    } else {
        Box::new(TerminalPrompter)
    };

    let mut sequencer = Sequencer::new(
        &target,
        Box::new(DirectoryResourceStore::new(&loaded.resource_dir)),
        Box::new(LocalFilesystem::new()),
        Box::new(ProcessRunner::new()),
        prompter,
    );

    let log_path = config.apply.log_path(&target);

    if args.dry_run {
        let log = ActionLog::open(Box::new(JsonLinesActionLog::open_read_only(&log_path)))?;
        let planned = sequencer.preview(&loaded.plan, Some(&log), &options)?;
        return print_preview(loaded.plan.name(), &planned, &output);
    }

    let mut log = ActionLog::open(Box::new(JsonLinesActionLog::open_locked(&log_path)?))?;
    if !log.is_empty() && !args.resume {
        return Err(ScaffoldError::from(ApplicationError::ActionLogExists {
            location: log.location(),
        })
        .into());
    }

    if !output.is_json() {
        output.header(&format!(
            "Applying '{}' to {}",
            loaded.plan.name(),
            target.display()
        ))?;
    }

    let report = sequencer.apply(&loaded.plan, &mut log, &options)?;
    print_report(&report, &output)?;

    if let Some(halt) = report.halt {
        return Err(CliError::StepHalted {
            key: halt.key.to_string(),
            reason: halt.error.to_string(),
            stderr: halt.error.stderr().map(str::to_string),
            resume: resume_command(&args, global.config.as_deref()),
        });
    }

    info!(run_id = %report.run_id, "Plan applied");
    if !output.is_json() {
        output.success(&format!("Plan '{}' applied", loaded.plan.name()))?;
    }
    Ok(())
}

fn overrides(vars: &[Assignment]) -> Variables {
    vars.iter()
        .map(|a| (a.name.clone(), a.value.clone()))
        .collect()
}

/// The command that continues a halted run with the same inputs.
fn resume_command(args: &ApplyArgs, config_file: Option<&Path>) -> String {
    let mut parts = vec!["scaffold".to_string()];
    if let Some(file) = config_file {
        parts.push("--config".into());
        parts.push(quote(&file.display().to_string()));
    }
    parts.extend([
        "apply".to_string(),
        quote(&args.plan.display().to_string()),
        "--target".to_string(),
        quote(&args.target.target.display().to_string()),
    ]);
    for var in &args.vars {
        parts.push("--var".into());
        parts.push(quote(&format!("{}={}", var.name, var.value)));
    }
    if args.non_interactive {
        parts.push("--non-interactive".into());
    }
    if let Some(policy) = args.on_interrupted {
        parts.push("--on-interrupted".into());
        parts.push(policy.to_string());
    }
    if let Some(secs) = args.timeout {
        parts.push("--timeout".into());
        parts.push(secs.to_string());
    }
    parts.push("--resume".into());
    parts.join(" ")
}

fn quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@+,".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

fn print_preview(name: &str, planned: &[PlannedStep], out: &OutputManager) -> CliResult<()> {
    if out.is_json() {
        let steps: Vec<_> = planned
            .iter()
            .map(|p| {
                json!({
                    "key": p.key.as_str(),
                    "description": p.description,
                    "group": p.group,
                    "disposition": p.disposition.to_string(),
                })
            })
            .collect();
        out.json(&json!({ "plan": name, "steps": steps }))?;
        return Ok(());
    }

    out.header(&format!("Dry run of '{name}' ({} steps)", planned.len()))?;
    for step in planned {
        out.step(&step.disposition.to_string(), &labelled(&step.description, &step.group))?;
    }
    out.info("Nothing was changed")?;
    Ok(())
}

fn print_report(report: &RunReport, out: &OutputManager) -> CliResult<()> {
    if out.is_json() {
        let outcomes: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| {
                json!({
                    "key": o.key.as_str(),
                    "description": o.description,
                    "group": o.group,
                    "state": o.state.to_string(),
                })
            })
            .collect();
        let hook_failures: Vec<_> = report
            .hook_failures
            .iter()
            .map(|f| json!({ "phase": f.phase.as_str(), "error": f.error.to_string() }))
            .collect();
        out.json(&json!({
            "run_id": report.run_id.to_string(),
            "state": report.state.to_string(),
            "outcomes": outcomes,
            "notices": report.notices,
            "hook_failures": hook_failures,
            "halted_at": report.halt.as_ref().map(|h| h.key.as_str()),
        }))?;
        return Ok(());
    }

    for outcome in &report.outcomes {
        out.step(
            &outcome.state.to_string(),
            &labelled(&outcome.description, &outcome.group),
        )?;
    }

    for failure in &report.hook_failures {
        out.warning(&format!(
            "Hook #{} for phase '{}' failed: {}",
            failure.index + 1,
            failure.phase,
            failure.error
        ))?;
    }

    if !report.notices.is_empty() {
        out.print("")?;
        out.header("Notices")?;
        for notice in &report.notices {
            out.info(notice)?;
        }
    }

    let tolerated = report.count(StepState::Failed { tolerated: true });
    if tolerated > 0 {
        out.warning(&format!("{tolerated} step(s) failed but were tolerated"))?;
    }
    Ok(())
}

fn labelled(description: &str, group: &Option<String>) -> String {
    match group {
        Some(group) => format!("[{group}] {description}"),
        None => description.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::str::FromStr;

    fn parse_apply(argv: &[&str]) -> (ApplyArgs, GlobalArgs) {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Apply(args) => (args, cli.global),
            other => panic!("expected apply, got {other:?}"),
        }
    }

    #[test]
    fn resume_command_repeats_inputs() {
        let (args, global) = parse_apply(&[
            "scaffold",
            "apply",
            "rails/plan.toml",
            "--target",
            "shop",
            "--var",
            "app_name=shop",
            "--var",
            "title=My Shop",
            "--non-interactive",
        ]);
        assert_eq!(
            resume_command(&args, global.config.as_deref()),
            "scaffold apply rails/plan.toml --target shop --var app_name=shop \
             --var 'title=My Shop' --non-interactive --resume"
        );
    }

    #[test]
    fn resume_command_keeps_config_timeout_and_policy() {
        let (args, global) = parse_apply(&[
            "scaffold",
            "-c",
            "my config.toml",
            "apply",
            "plan.toml",
            "--timeout",
            "90",
            "--on-interrupted",
            "assume-done",
        ]);
        let cmd = resume_command(&args, global.config.as_deref());
        assert_eq!(
            cmd,
            "scaffold --config 'my config.toml' apply plan.toml --target . \
             --on-interrupted assume-done --timeout 90 --resume"
        );

        let argv: Vec<&str> = vec![
            "scaffold", "--config", "my config.toml", "apply", "plan.toml", "--target", ".",
            "--on-interrupted", "assume-done", "--timeout", "90", "--resume",
        ];
        let (again, _) = parse_apply(&argv);
        assert!(again.resume);
        assert_eq!(again.timeout, Some(90));
    }

    #[test]
    fn quote_escapes_single_quotes() {
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote(""), "''");
    }

    #[test]
    fn overrides_keep_last_assignment() {
        let vars = vec![
            Assignment::from_str("a=1").unwrap(),
            Assignment::from_str("a=2").unwrap(),
        ];
        assert_eq!(overrides(&vars).get("a"), Some("2"));
    }

    #[test]
    fn group_label_prefixes_description() {
        assert_eq!(labelled("git init", &None), "git init");
        assert_eq!(
            labelled("bin/rails g devise", &Some("devise".into())),
            "[devise] bin/rails g devise"
        );
    }
}
