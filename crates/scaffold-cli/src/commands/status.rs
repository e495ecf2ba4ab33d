//! `scaffold status` - summarize the action log of a target.

use std::collections::HashSet;

use serde_json::json;
use tracing::instrument;

use scaffold_adapters::JsonLinesActionLog;
use scaffold_core::{application::ActionLog, domain::LogEntry};

use crate::{cli::TargetArgs, config::AppConfig, error::CliResult, output::OutputManager};

#[instrument(skip_all, fields(target = %args.target.display()))]
pub fn execute(args: TargetArgs, config: AppConfig, output: OutputManager) -> CliResult<()> {
    let path = config.apply.log_path(&args.target);
    let store = JsonLinesActionLog::open_read_only(&path);

    if !store.exists() {
        if output.is_json() {
            output.json(&json!({ "log": path.display().to_string(), "exists": false }))?;
        } else {
            output.info(&format!("No action log at {}", path.display()))?;
        }
        return Ok(());
    }

    let log = ActionLog::open(Box::new(store))?;
    let summary = log.summary();
    let latest = latest_entries(&log);
    let interrupted: Vec<&str> = log.interrupted().iter().map(|k| k.as_str()).collect();

    if output.is_json() {
        let entries: Vec<_> = latest
            .iter()
            .map(|e| {
                json!({
                    "key": e.key.as_str(),
                    "status": e.status.to_string(),
                    "timestamp": e.timestamp.to_rfc3339(),
                    "value": e.value,
                    "error": e.error,
                })
            })
            .collect();
        output.json(&json!({
            "log": path.display().to_string(),
            "exists": true,
            "completed": summary.completed,
            "failed": summary.failed,
            "skipped": summary.skipped,
            "decided": summary.decided,
            "interrupted": interrupted,
            "entries": entries,
        }))?;
        return Ok(());
    }

    output.header(&format!("Action log {}", path.display()))?;
    for entry in &latest {
        let detail = match (&entry.value, &entry.error) {
            (_, Some(error)) => format!("{}  ({error})", entry.key),
            (Some(value), None) => format!("{} = {value}", entry.key),
            (None, None) => entry.key.to_string(),
        };
        output.step(entry.status.as_str(), &detail)?;
    }
    output.print("")?;
    output.print(&format!(
        "{} completed, {} failed, {} skipped, {} decided",
        summary.completed, summary.failed, summary.skipped, summary.decided
    ))?;
    for key in interrupted {
        output.warning(&format!("'{key}' started but never finished"))?;
    }
    Ok(())
}

/// Latest entry per key, in order of first appearance.
fn latest_entries(log: &ActionLog) -> Vec<&LogEntry> {
    let mut seen = HashSet::new();
    log.entries()
        .iter()
        .filter(|e| seen.insert(e.key.clone()))
        .filter_map(|e| log.latest(&e.key))
        .collect()
}
