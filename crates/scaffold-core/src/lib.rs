//! Scaffold Core - declarative, resumable project scaffolding.
//!
//! A [`Plan`](domain::Plan) is an ordered list of steps (run a command,
//! copy or render a file, append text, ask a question) and conditional
//! groups. The [`Sequencer`](application::Sequencer) applies it to a target
//! directory, recording every transition in an
//! [`ActionLog`](application::ActionLog) so a halted run can be resumed
//! without repeating work.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           scaffold-cli (CLI)            │
//! └──────────────────┬──────────────────────┘
//!                    │ calls
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Application Services            │
//! │  (Sequencer, ActionLog, Gate, Hooks)    │
//! └──────────────────┬──────────────────────┘
//!                    │ uses
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │      Application Ports (Traits)         │
//! │ (Filesystem, ResourceStore, Runner,     │
//! │  Prompter, ActionLogStore)              │
//! └──────────────────┬──────────────────────┘
//!                    │ implemented by
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │     scaffold-adapters (Infrastructure)  │
//! └─────────────────────────────────────────┘
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────┐
//! │         Domain Layer (Pure Logic)       │
//! │   (Plan, Step, Variables, LogEntry)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scaffold_core::prelude::*;
//!
//! # fn demo(
//! #     resources: Box<dyn ResourceStore>,
//! #     filesystem: Box<dyn Filesystem>,
//! #     runner: Box<dyn CommandRunner>,
//! #     prompter: Box<dyn Prompter>,
//! #     store: Box<dyn ActionLogStore>,
//! # ) -> ScaffoldResult<()> {
//! let plan = Plan::builder("hello")
//!     .step(Step::new(StepAction::RunCommand {
//!         program: "git".into(),
//!         args: vec!["init".into()],
//!         cwd: None,
//!         timeout: None,
//!         expect_stdout: None,
//!     }))
//!     .build()?;
//!
//! let mut log = ActionLog::open(store)?;
//! let mut sequencer = Sequencer::new("./demo", resources, filesystem, runner, prompter);
//! let report = sequencer.apply(&plan, &mut log, &ApplyOptions::default())?;
//! assert!(report.is_complete());
//! # Ok(())
//! # }
//! ```

pub mod domain;

pub mod application;

pub mod error;

// Public API - what external crates should use
pub mod prelude {
    pub use crate::application::{
        ActionLog, ApplyOptions, InterruptedPolicy, RunReport, Sequencer,
        ports::{ActionLogStore, CommandRunner, Filesystem, Prompter, ResourceStore},
    };
    pub use crate::domain::{
        ConditionalGroup, Guard, IdempotencyKey, Plan, PlanBuilder, Step, StepAction, Variables,
    };
    pub use crate::error::{ScaffoldError, ScaffoldResult};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
