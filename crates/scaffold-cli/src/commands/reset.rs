//! `scaffold reset` - delete the action log of a target.

use std::io::IsTerminal;

use tracing::{info, instrument};

use scaffold_adapters::JsonLinesActionLog;
use scaffold_core::application::ports::Prompter;

use crate::{
    cli::{GlobalArgs, ResetArgs},
    config::AppConfig,
    error::{CliError, CliResult},
    output::OutputManager,
    prompt::TerminalPrompter,
};

#[instrument(skip_all, fields(target = %args.target.target.display()))]
pub fn execute(
    args: ResetArgs,
    global: GlobalArgs,
    config: AppConfig,
    output: OutputManager,
) -> CliResult<()> {
    let path = config.apply.log_path(&args.target.target);

    if !JsonLinesActionLog::open_read_only(&path).exists() {
        output.info(&format!("No action log at {}", path.display()))?;
        return Ok(());
    }

    if !args.yes {
        if global.quiet || !std::io::stdin().is_terminal() {
            return Err(CliError::InvalidInput {
                message: "refusing to delete the action log without --yes".into(),
                source: None,
            });
        }
        let question = format!(
            "Delete {}? The next apply will start from scratch",
            path.display()
        );
        if !TerminalPrompter.confirm(&question, false)? {
            return Err(CliError::Cancelled);
        }
    }

    if JsonLinesActionLog::remove(&path)? {
        info!(path = %path.display(), "Action log removed");
        output.success(&format!("Removed {}", path.display()))?;
    }
    Ok(())
}
