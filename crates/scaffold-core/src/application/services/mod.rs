//! Application services - orchestrate use cases.
//!
//! The [`Sequencer`] is the entry point: it walks a plan, consults the
//! [`ActionLog`] to skip applied steps, resolves gates with the
//! [`GateEvaluator`], runs [`primitives`], and fires phase hooks.

pub mod action_log;
pub mod gate;
pub mod hooks;
pub mod primitives;
pub mod sequencer;

pub use action_log::{ActionLog, LogSummary};
pub use gate::{GateDecision, GateEvaluator, GateSource};
pub use hooks::{HookContext, HookFailure, HookRegistry, HookReport, NoticeHook, PostHook};
pub use primitives::Workspace;
pub use sequencer::{
    ApplyOptions, Disposition, Halt, InterruptedPolicy, PlanState, PlannedStep, RunReport,
    Sequencer, StepOutcome, StepState,
};
