//! Application layer for Scaffold.
//!
//! This layer contains:
//! - **Services**: Plan execution (Sequencer, ActionLog, GateEvaluator, HookRegistry)
//! - **Ports**: Interface definitions (traits) for external dependencies
//! - **Errors**: Application-specific error types
//!
//! Plan structure and its rules live in `crate::domain`; this layer only
//! drives a valid plan against the outside world.

pub mod error;
pub mod ports;
pub mod services;

pub use services::{
    ActionLog, ApplyOptions, Disposition, HookContext, InterruptedPolicy, PlanState, PlannedStep,
    PostHook, RunReport, Sequencer, StepState,
};

// Re-export port traits (for adapter implementation)
pub use ports::{ActionLogStore, CommandRunner, Filesystem, Prompter, ResourceStore};

pub use error::ApplicationError;
