//! Sequencer - walks a plan in order and drives it to completion.
//!
//! Each step goes `Pending -> Running -> Completed | Failed`, or `Skipped`
//! when its group is gated off. The plan goes `NotStarted -> InProgress ->
//! Done`. A failing step that does not tolerate failure halts the plan in
//! place; nothing is rolled back and `--resume` picks up where it stopped.

use std::collections::HashMap;
use std::fmt;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    application::{
        ApplicationError,
        ports::{CommandRunner, Filesystem, Prompter, ResourceStore},
        services::{
            action_log::ActionLog,
            gate::{GateEvaluator, GateSource},
            hooks::{HookFailure, HookRegistry, HookReport, PostHook},
            primitives::{self, Workspace},
        },
    },
    domain::{
        ConditionalGroup, EntryStatus, IdempotencyKey, LogEntry, Phase, Plan, PlanItem, Step,
        StepAction, Variables,
    },
    error::{ScaffoldError, ScaffoldResult},
};

/// What to do with a step whose last log entry is `started`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterruptedPolicy {
    /// Refuse to run until the operator decides.
    #[default]
    Halt,
    /// Execute the step again.
    Rerun,
    /// Record the step as completed and move on.
    AssumeDone,
}

impl fmt::Display for InterruptedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Halt => "halt",
            Self::Rerun => "rerun",
            Self::AssumeDone => "assume-done",
        })
    }
}

impl FromStr for InterruptedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "halt" => Ok(Self::Halt),
            "rerun" => Ok(Self::Rerun),
            "assume-done" | "assume_done" => Ok(Self::AssumeDone),
            other => Err(format!(
                "unknown interrupted-step policy '{other}' (expected halt, rerun or assume-done)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// `--var` assignments. Win over plan defaults and pre-answer prompts
    /// and gates.
    pub overrides: Variables,
    pub on_interrupted: InterruptedPolicy,
    pub default_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    NotStarted,
    InProgress,
    Done,
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::Done => "done",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Completed,
    /// Applied by an earlier run.
    AlreadyApplied,
    Skipped,
    Failed { tolerated: bool },
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::AlreadyApplied => "already-applied",
            Self::Skipped => "skipped",
            Self::Failed { tolerated: true } => "failed-tolerated",
            Self::Failed { tolerated: false } => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub key: IdempotencyKey,
    pub description: String,
    pub group: Option<String>,
    pub state: StepState,
}

/// The step that stopped the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct Halt {
    pub key: IdempotencyKey,
    pub error: ScaffoldError,
}

#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: PlanState,
    pub outcomes: Vec<StepOutcome>,
    pub notices: Vec<String>,
    pub hook_failures: Vec<HookFailure>,
    pub halt: Option<Halt>,
    /// Final variable set, including prompt answers and gate decisions.
    pub variables: Variables,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            state: PlanState::NotStarted,
            outcomes: Vec::new(),
            notices: Vec::new(),
            hook_failures: Vec::new(),
            halt: None,
            variables: Variables::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == PlanState::Done
    }

    pub fn count(&self, state: StepState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}

/// How a dry run expects a step to behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    WouldRun,
    AlreadyApplied,
    GatedOff,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WouldRun => "would-run",
            Self::AlreadyApplied => "already-applied",
            Self::GatedOff => "gated-off",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub key: IdempotencyKey,
    pub description: String,
    pub group: Option<String>,
    pub disposition: Disposition,
}

/// Drives plans against one target directory.
pub struct Sequencer {
    root: PathBuf,
    resources: Box<dyn ResourceStore>,
    filesystem: Box<dyn Filesystem>,
    runner: Box<dyn CommandRunner>,
    prompter: Box<dyn Prompter>,
    hooks: HookRegistry,
}

impl Sequencer {
    pub fn new(
        root: impl Into<PathBuf>,
        resources: Box<dyn ResourceStore>,
        filesystem: Box<dyn Filesystem>,
        runner: Box<dyn CommandRunner>,
        prompter: Box<dyn Prompter>,
    ) -> Self {
        Self {
            root: root.into(),
            resources,
            filesystem,
            runner,
            prompter,
            hooks: HookRegistry::new(),
        }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Register a hook that runs after `phase` completes. These run after
    /// any hooks declared in the plan itself.
    pub fn register_hook(&mut self, phase: impl Into<String>, hook: impl PostHook + 'static) {
        self.hooks.register(Phase::new(phase), hook);
    }

    /// Apply `plan`, skipping steps the log already marks as applied.
    ///
    /// A halted step is reported through [`RunReport::halt`], not as an
    /// error.
    ///
    /// # Errors
    /// Fails before any step runs on an interrupted step under
    /// [`InterruptedPolicy::Halt`]. Fails mid-run only if the action log
    /// itself cannot be written or a gate cannot be resolved.
    #[instrument(skip_all, fields(plan = plan.name(), root = %self.root.display()))]
    pub fn apply(
        &mut self,
        plan: &Plan,
        log: &mut ActionLog,
        options: &ApplyOptions,
    ) -> ScaffoldResult<RunReport> {
        resolve_interrupted(plan, log, options.on_interrupted)?;

        let Self {
            root,
            resources,
            filesystem,
            runner,
            prompter,
            hooks,
        } = self;
        filesystem.create_dir_all(root)?;

        info!(steps = plan.step_count(), "Applying plan");

        let mut run = Run {
            ws: Workspace {
                root,
                filesystem: &**filesystem,
                resources: &**resources,
                runner: &**runner,
                prompter: &**prompter,
                default_timeout: options.default_timeout,
            },
            report: RunReport::new(log.run_id()),
            log,
            options,
            plan_hooks: HookRegistry::from_plan_hooks(plan.hooks()),
            hooks,
            pending: pending_phases(plan),
            variables: plan.defaults().merged(&options.overrides),
        };
        run.report.state = PlanState::InProgress;

        for item in plan.items() {
            let flow = match item {
                PlanItem::Step(step) => run.step(step, None)?,
                PlanItem::Group(group) => run.group(group)?,
            };
            if flow.is_break() {
                run.report.variables = run.variables;
                return Ok(run.report);
            }
        }

        // Phases that no step carries fire once everything else is done.
        let step_phases = plan.step_phases();
        let mut trailing = run.plan_hooks.phases();
        for phase in run.hooks.phases() {
            if !trailing.contains(&phase) {
                trailing.push(phase);
            }
        }
        for phase in trailing.iter().filter(|p| !step_phases.contains(p)) {
            run.fire(phase);
        }

        run.log.persist()?;
        run.report.state = PlanState::Done;
        run.report.variables = run.variables;

        info!(
            completed = run.report.count(StepState::Completed),
            skipped = run.report.count(StepState::Skipped),
            "Plan applied"
        );
        Ok(run.report)
    }

    /// Describe what [`apply`](Self::apply) would do without prompting,
    /// writing, or running anything. Prompt guards use their defaults.
    pub fn preview(
        &self,
        plan: &Plan,
        log: Option<&ActionLog>,
        options: &ApplyOptions,
    ) -> ScaffoldResult<Vec<PlannedStep>> {
        let gate = GateEvaluator::without_prompts();
        let mut variables = plan.defaults().merged(&options.overrides);
        let mut planned = Vec::with_capacity(plan.step_count());

        let applied = |key: &IdempotencyKey| log.is_some_and(|l| l.has_applied(key));

        for item in plan.items() {
            match item {
                PlanItem::Step(step) => {
                    let disposition = if applied(step.key()) {
                        Disposition::AlreadyApplied
                    } else {
                        Disposition::WouldRun
                    };
                    preview_prompt(step, log, options, &mut variables)?;
                    planned.push(planned_step(step, None, disposition));
                }
                PlanItem::Group(group) => {
                    let recorded = log.and_then(|l| l.recorded_value(&group.gate_key()));
                    let decision =
                        gate.evaluate(group, recorded, &options.overrides, &variables)?;
                    variables.set(group.name(), decision.value.to_string());

                    for step in group.steps() {
                        let disposition = if applied(step.key()) {
                            Disposition::AlreadyApplied
                        } else if !decision.value {
                            Disposition::GatedOff
                        } else {
                            Disposition::WouldRun
                        };
                        if decision.value {
                            preview_prompt(step, log, options, &mut variables)?;
                        }
                        planned.push(planned_step(step, Some(group.name()), disposition));
                    }
                }
            }
        }

        debug!(steps = planned.len(), "Preview built");
        Ok(planned)
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer")
            .field("root", &self.root)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

/// State for one `apply` call.
struct Run<'a> {
    ws: Workspace<'a>,
    log: &'a mut ActionLog,
    options: &'a ApplyOptions,
    plan_hooks: HookRegistry,
    hooks: &'a mut HookRegistry,
    /// Steps left per phase before its hooks fire.
    pending: HashMap<Phase, usize>,
    variables: Variables,
    report: RunReport,
}

impl Run<'_> {
    fn step(&mut self, step: &Step, group: Option<&str>) -> ScaffoldResult<ControlFlow<()>> {
        let key = step.key();

        if self.log.has_applied(key) {
            if let StepAction::Prompt { variable, .. } = step.action() {
                if let Some(answer) = self.log.recorded_value(key) {
                    self.variables.set(variable.clone(), answer);
                }
            }
            debug!(key = %key, "Already applied, skipping");
            self.finish(step, group, StepState::AlreadyApplied);
            return Ok(ControlFlow::Continue(()));
        }

        self.log.record(key, EntryStatus::Started, None)?;

        let result = match step.action() {
            StepAction::Prompt { variable, .. } if self.options.overrides.contains(variable) => {
                Ok(self.options.overrides.get(variable).map(str::to_string))
            }
            action => primitives::execute(&self.ws, action, &self.variables),
        };

        match result {
            Ok(answer) => {
                let mut entry = LogEntry::new(key.clone(), EntryStatus::Completed, self.log.run_id());
                if let (Some(answer), StepAction::Prompt { variable, .. }) = (answer, step.action())
                {
                    self.variables.set(variable.clone(), answer.clone());
                    entry = entry.with_value(answer);
                }
                self.log.record_entry(entry)?;
                self.finish(step, group, StepState::Completed);
                Ok(ControlFlow::Continue(()))
            }
            Err(err) if step.tolerates_failure() => {
                warn!(key = %key, error = %err, "Step failed, failure tolerated");
                let entry = LogEntry::new(key.clone(), EntryStatus::Failed, self.log.run_id())
                    .with_error(err.to_string())
                    .tolerated();
                self.log.record_entry(entry)?;
                self.finish(step, group, StepState::Failed { tolerated: true });
                Ok(ControlFlow::Continue(()))
            }
            Err(err) => {
                error!(key = %key, error = %err, "Step failed, halting plan");
                self.log
                    .record(key, EntryStatus::Failed, Some(err.to_string()))?;
                self.report
                    .outcomes
                    .push(outcome(step, group, StepState::Failed { tolerated: false }));
                self.report.halt = Some(Halt {
                    key: key.clone(),
                    error: err,
                });
                Ok(ControlFlow::Break(()))
            }
        }
    }

    fn group(&mut self, group: &ConditionalGroup) -> ScaffoldResult<ControlFlow<()>> {
        let gate_key = group.gate_key();
        let recorded = self.log.recorded_value(&gate_key).map(str::to_string);

        let decision = GateEvaluator::new(self.ws.prompter).evaluate(
            group,
            recorded.as_deref(),
            &self.options.overrides,
            &self.variables,
        )?;
        if decision.source != GateSource::Recorded {
            self.log
                .record_value(&gate_key, EntryStatus::Decided, decision.value.to_string())?;
        }
        self.variables
            .set(group.name(), decision.value.to_string());

        for step in group.steps() {
            if decision.value {
                if self.step(step, Some(group.name()))?.is_break() {
                    return Ok(ControlFlow::Break(()));
                }
            } else {
                if self.log.status_of(step.key()) != Some(EntryStatus::Skipped) {
                    self.log.record(step.key(), EntryStatus::Skipped, None)?;
                }
                debug!(key = %step.key(), group = group.name(), "Gated off");
                self.finish(step, Some(group.name()), StepState::Skipped);
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn finish(&mut self, step: &Step, group: Option<&str>, state: StepState) {
        self.report.outcomes.push(outcome(step, group, state));

        if let Some(phase) = step.phase() {
            let done = self.pending.get_mut(phase).is_some_and(|left| {
                *left -= 1;
                *left == 0
            });
            if done {
                self.pending.remove(phase);
                self.fire(phase);
            }
        }
    }

    fn fire(&mut self, phase: &Phase) {
        info!(phase = %phase, "Phase complete");
        for registry in [&mut self.plan_hooks, &mut *self.hooks] {
            let HookReport {
                mut notices,
                mut failures,
            } = registry.fire(phase, &self.variables);
            self.report.notices.append(&mut notices);
            self.report.hook_failures.append(&mut failures);
        }
    }
}

fn resolve_interrupted(
    plan: &Plan,
    log: &mut ActionLog,
    policy: InterruptedPolicy,
) -> ScaffoldResult<()> {
    let interrupted: Vec<IdempotencyKey> = log
        .interrupted()
        .into_iter()
        .filter(|key| plan.steps().any(|(_, s)| s.key() == *key))
        .cloned()
        .collect();

    for key in interrupted {
        match policy {
            InterruptedPolicy::Halt => {
                return Err(ApplicationError::InterruptedStep {
                    key: key.to_string(),
                }
                .into());
            }
            InterruptedPolicy::Rerun => {
                warn!(key = %key, "Re-running interrupted step");
            }
            InterruptedPolicy::AssumeDone => {
                warn!(key = %key, "Assuming interrupted step completed");
                log.record(&key, EntryStatus::Completed, None)?;
            }
        }
    }
    Ok(())
}

fn pending_phases(plan: &Plan) -> HashMap<Phase, usize> {
    let mut pending = HashMap::new();
    for (_, step) in plan.steps() {
        if let Some(phase) = step.phase() {
            *pending.entry(phase.clone()).or_insert(0) += 1;
        }
    }
    pending
}

/// Track prompt answers during a dry run so later flag guards see them.
fn preview_prompt(
    step: &Step,
    log: Option<&ActionLog>,
    options: &ApplyOptions,
    variables: &mut Variables,
) -> ScaffoldResult<()> {
    if let StepAction::Prompt {
        variable, default, ..
    } = step.action()
    {
        let answer = match (
            options.overrides.get(variable),
            log.and_then(|l| l.recorded_value(step.key())),
        ) {
            (_, Some(recorded)) => recorded.to_string(),
            (Some(overridden), None) => overridden.to_string(),
            (None, None) => variables.render(default)?,
        };
        variables.set(variable.clone(), answer);
    }
    Ok(())
}

fn outcome(step: &Step, group: Option<&str>, state: StepState) -> StepOutcome {
    StepOutcome {
        key: step.key().clone(),
        description: step.describe(),
        group: group.map(str::to_string),
        state,
    }
}

fn planned_step(step: &Step, group: Option<&str>, disposition: Disposition) -> PlannedStep {
    PlannedStep {
        key: step.key().clone(),
        description: step.describe(),
        group: group.map(str::to_string),
        disposition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{CommandOutput, MockCommandRunner};
    use crate::application::services::action_log::tests::SharedStore;
    use crate::application::services::hooks::HookContext;
    use crate::application::services::primitives::tests::{Answers, MapFs, MapResources, silent};
    use crate::domain::Guard;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    fn run(program: &str, args: &[&str]) -> StepAction {
        StepAction::RunCommand {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: None,
            timeout: None,
            expect_stdout: None,
        }
    }

    fn copy(resource: &str, destination: &str) -> StepAction {
        StepAction::CopyFile {
            resource: resource.into(),
            destination: destination.into(),
            overwrite: false,
            executable: false,
        }
    }

    fn rails_plan() -> Plan {
        Plan::builder("rails")
            .step(Step::new(run("rails", &["new", "."])))
            .step(Step::new(copy("gitignore.tmpl", ".gitignore")))
            .group(
                ConditionalGroup::new(
                    "devise",
                    Guard::Prompt {
                        question: "use devise?".into(),
                        default: false,
                    },
                )
                .step(Step::new(run("rails", &["generate", "devise:install"]))),
            )
            .build()
            .unwrap()
    }

    fn resources() -> MapResources {
        MapResources::default().with("gitignore.tmpl", "/log\n/tmp\n")
    }

    fn sequencer(fs: &MapFs, runner: MockCommandRunner, prompter: Answers) -> Sequencer {
        Sequencer::new(
            "/proj",
            Box::new(resources()),
            Box::new(fs.clone()),
            Box::new(runner),
            Box::new(prompter),
        )
    }

    fn open(store: &SharedStore) -> ActionLog {
        ActionLog::open(Box::new(store.clone())).unwrap()
    }

    fn ok_runner(times: usize) -> MockCommandRunner {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(times)
            .returning(|_| Ok(CommandOutput::success()));
        runner
    }

    #[test]
    fn non_interactive_run_skips_gated_group() {
        let fs = MapFs::default();
        let store = SharedStore::default();
        let mut log = open(&store);

        let mut seq = sequencer(&fs, ok_runner(1), silent());
        let report = seq
            .apply(&rails_plan(), &mut log, &ApplyOptions::default())
            .unwrap();

        assert!(report.is_complete());
        assert!(report.halt.is_none());
        assert_eq!(fs.read("/proj/.gitignore").as_deref(), Some("/log\n/tmp\n"));

        let summary = log.summary();
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.decided, 1);
        assert_eq!(report.variables.get("devise"), Some("false"));
    }

    #[test]
    fn existing_destination_halts_after_first_step() {
        let fs = MapFs::default().with_file("/proj/.gitignore", "mine");
        let store = SharedStore::default();
        let mut log = open(&store);

        let mut seq = sequencer(&fs, ok_runner(1), silent());
        let report = seq
            .apply(&rails_plan(), &mut log, &ApplyOptions::default())
            .unwrap();

        assert_eq!(report.state, PlanState::InProgress);
        let halt = report.halt.unwrap();
        assert_eq!(halt.key.as_str(), "copy:gitignore.tmpl->.gitignore");
        assert!(matches!(
            halt.error,
            ScaffoldError::Application(ApplicationError::DestinationExists { .. })
        ));

        assert_eq!(
            log.status_of(&IdempotencyKey::from("run:rails new .")),
            Some(EntryStatus::Completed)
        );
        assert_eq!(log.status_of(&halt.key), Some(EntryStatus::Failed));
        assert_eq!(fs.read("/proj/.gitignore").as_deref(), Some("mine"));
    }

    #[test]
    fn resume_never_repeats_completed_steps() {
        let fs = MapFs::default().with_file("/proj/.gitignore", "mine");
        let store = SharedStore::default();

        {
            let mut log = open(&store);
            let mut seq = sequencer(&fs, ok_runner(1), silent());
            let report = seq
                .apply(&rails_plan(), &mut log, &ApplyOptions::default())
                .unwrap();
            assert!(report.halt.is_some());
        }

        fs.files.write().unwrap().remove(Path::new("/proj/.gitignore"));

        let mut log = open(&store);
        let mut seq = sequencer(&fs, ok_runner(0), silent());
        let report = seq
            .apply(&rails_plan(), &mut log, &ApplyOptions::default())
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.count(StepState::AlreadyApplied), 1);
        assert_eq!(report.count(StepState::Completed), 1);
        assert!(fs.read("/proj/.gitignore").is_some());
    }

    #[test]
    fn override_opens_gate_without_prompting() {
        let fs = MapFs::default();
        let mut log = open(&SharedStore::default());
        let options = ApplyOptions {
            overrides: Variables::new().with("devise", "true"),
            ..ApplyOptions::default()
        };

        let mut seq = sequencer(&fs, ok_runner(2), silent());
        let report = seq.apply(&rails_plan(), &mut log, &options).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.count(StepState::Completed), 3);
        assert_eq!(report.count(StepState::Skipped), 0);
    }

    #[test]
    fn recorded_gate_decision_is_reused() {
        let fs = MapFs::default();
        let store = SharedStore::default();
        {
            let mut log = open(&store);
            let yes = Answers {
                confirm: true,
                text: String::new(),
            };
            sequencer(&fs, ok_runner(2), yes)
                .apply(&rails_plan(), &mut log, &ApplyOptions::default())
                .unwrap();
        }

        // A prompter answering "no" is never consulted on the second run.
        let mut log = open(&store);
        let report = sequencer(&fs, ok_runner(0), silent())
            .apply(&rails_plan(), &mut log, &ApplyOptions::default())
            .unwrap();
        assert_eq!(report.variables.get("devise"), Some("true"));
        assert_eq!(report.count(StepState::AlreadyApplied), 3);
    }

    #[test]
    fn interrupted_step_halts_by_default() {
        let fs = MapFs::default();
        let store = SharedStore::default();
        {
            let mut log = open(&store);
            log.record(
                &IdempotencyKey::from("run:rails new ."),
                EntryStatus::Started,
                None,
            )
            .unwrap();
        }

        let mut log = open(&store);
        let err = sequencer(&fs, ok_runner(0), silent())
            .apply(&rails_plan(), &mut log, &ApplyOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ScaffoldError::Application(ApplicationError::InterruptedStep { .. })
        ));
        assert!(fs.files.read().unwrap().is_empty());
    }

    #[test]
    fn interrupted_step_policies() {
        for (policy, runs) in [
            (InterruptedPolicy::Rerun, 1),
            (InterruptedPolicy::AssumeDone, 0),
        ] {
            let fs = MapFs::default();
            let store = SharedStore::default();
            let mut log = open(&store);
            log.record(
                &IdempotencyKey::from("run:rails new ."),
                EntryStatus::Started,
                None,
            )
            .unwrap();

            let options = ApplyOptions {
                on_interrupted: policy,
                ..ApplyOptions::default()
            };
            let report = sequencer(&fs, ok_runner(runs), silent())
                .apply(&rails_plan(), &mut log, &options)
                .unwrap();
            assert!(report.is_complete(), "policy {policy}");
        }
    }

    #[test]
    fn tolerated_failure_is_recorded_and_plan_continues() {
        let plan = Plan::builder("lenient")
            .step(Step::new(run("false", &[])).tolerating_failure())
            .step(Step::new(run("true", &[])))
            .build()
            .unwrap();

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|inv| inv.program == "false")
            .times(1)
            .returning(|_| {
                Ok(CommandOutput {
                    exit_code: Some(1),
                    ..CommandOutput::default()
                })
            });
        runner
            .expect_run()
            .withf(|inv| inv.program == "true")
            .times(1)
            .returning(|_| Ok(CommandOutput::success()));

        let fs = MapFs::default();
        let mut log = open(&SharedStore::default());
        let report = sequencer(&fs, runner, silent())
            .apply(&plan, &mut log, &ApplyOptions::default())
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.count(StepState::Failed { tolerated: true }), 1);
        assert!(log.has_applied(&IdempotencyKey::from("run:false")));
    }

    #[test]
    fn prompt_answer_is_cached_for_resume() {
        let plan = Plan::builder("model")
            .step(Step::new(StepAction::Prompt {
                question: "model name?".into(),
                default: "user".into(),
                variable: "model".into(),
            }))
            .step(Step::new(run("rails", &["generate", "model", "{{ model }}"])))
            .build()
            .unwrap();

        let fs = MapFs::default();
        let store = SharedStore::default();
        {
            let mut runner = MockCommandRunner::new();
            runner.expect_run().times(1).returning(|_| {
                Ok(CommandOutput {
                    exit_code: Some(1),
                    ..CommandOutput::default()
                })
            });
            let answer = Answers {
                confirm: false,
                text: "account".into(),
            };
            let mut log = open(&store);
            let report = sequencer(&fs, runner, answer)
                .apply(&plan, &mut log, &ApplyOptions::default())
                .unwrap();
            assert!(report.halt.is_some());
        }

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|inv| inv.args.last().map(String::as_str) == Some("account"))
            .times(1)
            .returning(|_| Ok(CommandOutput::success()));
        let different = Answers {
            confirm: false,
            text: "other".into(),
        };
        let mut log = open(&store);
        let report = sequencer(&fs, runner, different)
            .apply(&plan, &mut log, &ApplyOptions::default())
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.variables.get("model"), Some("account"));
    }

    #[test]
    fn hooks_fire_after_their_phase_and_in_order() {
        let plan = Plan::builder("phased")
            .step(Step::new(run("bundle", &["install"])).in_phase("bundle"))
            .step(Step::new(run("git", &["init"])).in_phase("vcs"))
            .hook("bundle", None, "bundle finished")
            .hook("done", None, "all done for {{ app }}")
            .variable("app", "shop")
            .build()
            .unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let mut runner = MockCommandRunner::new();
        let seen = Arc::clone(&events);
        runner.expect_run().times(2).returning(move |inv| {
            seen.lock().unwrap().push(inv.program.clone());
            Ok(CommandOutput::success())
        });

        let fs = MapFs::default();
        let mut seq = sequencer(&fs, runner, silent());
        let seen = Arc::clone(&events);
        seq.register_hook("bundle", move |ctx: &mut HookContext<'_>| -> ScaffoldResult<()> {
            seen.lock().unwrap().push(format!("hook:{}", ctx.phase()));
            Ok(())
        });

        let mut log = open(&SharedStore::default());
        let report = seq.apply(&plan, &mut log, &ApplyOptions::default()).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["bundle".to_string(), "hook:bundle".into(), "git".into()]
        );
        assert_eq!(
            report.notices,
            vec!["bundle finished".to_string(), "all done for shop".into()]
        );
    }

    #[test]
    fn failing_hook_does_not_stop_the_plan() {
        let plan = Plan::builder("p")
            .step(Step::new(run("a", &[])).in_phase("first"))
            .step(Step::new(run("b", &[])))
            .build()
            .unwrap();

        let fs = MapFs::default();
        let mut seq = sequencer(&fs, ok_runner(2), silent());
        seq.register_hook("first", |_: &mut HookContext<'_>| -> ScaffoldResult<()> {
            Err(ScaffoldError::Internal {
                message: "hook broke".into(),
            })
        });

        let mut log = open(&SharedStore::default());
        let report = seq.apply(&plan, &mut log, &ApplyOptions::default()).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.hook_failures.len(), 1);
    }

    #[test]
    fn preview_has_no_side_effects_and_is_deterministic() {
        let fs = MapFs::default();
        let store = SharedStore::default();
        let seq = sequencer(&fs, ok_runner(0), silent());
        let log = open(&store);

        let first = seq
            .preview(&rails_plan(), Some(&log), &ApplyOptions::default())
            .unwrap();
        let second = seq
            .preview(&rails_plan(), Some(&log), &ApplyOptions::default())
            .unwrap();

        assert_eq!(first, second);
        let dispositions: Vec<Disposition> = first.iter().map(|p| p.disposition).collect();
        assert_eq!(
            dispositions,
            vec![
                Disposition::WouldRun,
                Disposition::WouldRun,
                Disposition::GatedOff
            ]
        );
        assert!(fs.files.read().unwrap().is_empty());
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn preview_reports_applied_steps() {
        let fs = MapFs::default();
        let store = SharedStore::default();
        let mut log = open(&store);
        sequencer(&fs, ok_runner(1), silent())
            .apply(&rails_plan(), &mut log, &ApplyOptions::default())
            .unwrap();

        let planned = sequencer(&fs, ok_runner(0), silent())
            .preview(&rails_plan(), Some(&log), &ApplyOptions::default())
            .unwrap();
        assert_eq!(planned[0].disposition, Disposition::AlreadyApplied);
        assert_eq!(planned[1].disposition, Disposition::AlreadyApplied);
        assert_eq!(planned[2].disposition, Disposition::GatedOff);
        assert_eq!(planned[2].group.as_deref(), Some("devise"));
    }

    #[test]
    fn interrupted_policy_parses() {
        assert_eq!("halt".parse(), Ok(InterruptedPolicy::Halt));
        assert_eq!("assume-done".parse(), Ok(InterruptedPolicy::AssumeDone));
        assert_eq!("Rerun".parse(), Ok(InterruptedPolicy::Rerun));
        assert!("later".parse::<InterruptedPolicy>().is_err());
    }
}
