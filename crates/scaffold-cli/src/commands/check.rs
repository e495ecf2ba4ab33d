//! `scaffold check` - validate a plan and list its steps.

use serde_json::json;
use tracing::instrument;

use scaffold_adapters::DirectoryResourceStore;
use scaffold_core::{
    application::{ApplicationError, ports::ResourceStore},
    domain::{Plan, StepAction},
    error::ScaffoldError,
};

use crate::{cli::CheckArgs, commands::load_plan, error::CliResult, output::OutputManager};

#[instrument(skip_all, fields(plan = %args.plan.display()))]
pub fn execute(args: CheckArgs, output: OutputManager) -> CliResult<()> {
    let loaded = load_plan(&args.plan)?;
    let resources = DirectoryResourceStore::new(&loaded.resource_dir);
    let missing = missing_resources(&loaded.plan, &resources);

    if output.is_json() {
        let steps: Vec<_> = loaded
            .plan
            .steps()
            .map(|(group, step)| {
                json!({
                    "key": step.key().as_str(),
                    "kind": step.kind().to_string(),
                    "phase": step.phase().map(|p| p.as_str()),
                    "group": group.map(|g| g.name()),
                    "tolerate_failure": step.tolerates_failure(),
                })
            })
            .collect();
        output.json(&json!({
            "plan": loaded.plan.name(),
            "resources": loaded.resource_dir.display().to_string(),
            "steps": steps,
            "missing_resources": missing,
        }))?;
    } else {
        output.header(&format!(
            "Plan '{}' ({} steps)",
            loaded.plan.name(),
            loaded.plan.step_count()
        ))?;
        for (group, step) in loaded.plan.steps() {
            let mut line = step.key().to_string();
            if let Some(phase) = step.phase() {
                line.push_str(&format!("  (phase {phase})"));
            }
            if let Some(group) = group {
                line = format!("[{}] {line}", group.name());
            }
            output.step(step.kind().as_str(), &line)?;
        }
        for hook in loaded.plan.hooks() {
            output.step("hook", &format!("after {}: {}", hook.phase, hook.notice))?;
        }
    }

    if !missing.is_empty() {
        return Err(ScaffoldError::from(ApplicationError::ResourceNotFound {
            name: missing.join(", "),
        })
        .into());
    }

    if !output.is_json() {
        output.success("Plan is valid")?;
    }
    Ok(())
}

/// Resources referenced by copy and render steps that the store lacks.
fn missing_resources(plan: &Plan, resources: &dyn ResourceStore) -> Vec<String> {
    let mut missing: Vec<String> = plan
        .steps()
        .filter_map(|(_, step)| match step.action() {
            StepAction::CopyFile { resource, .. } | StepAction::RenderTemplate { resource, .. } => {
                Some(resource)
            }
            _ => None,
        })
        .filter(|resource| !resources.contains(resource))
        .cloned()
        .collect();
    missing.dedup();
    missing
}
