//! Infrastructure adapters for Scaffold.
//!
//! This crate implements the ports defined in `scaffold-core::application::ports`.
//! It contains all external dependencies and I/O operations.

pub mod action_log;
pub mod command;
pub mod filesystem;
pub mod plan_loader;
pub mod prompter;
pub mod resource_store;

// Re-export commonly used adapters
pub use action_log::{JsonLinesActionLog, MemoryActionLog};
pub use command::ProcessRunner;
pub use filesystem::{LocalFilesystem, MemoryFilesystem};
pub use plan_loader::{LoadedPlan, PlanLoader};
pub use prompter::{NonInteractivePrompter, ScriptedPrompter};
pub use resource_store::{DirectoryResourceStore, InMemoryResourceStore};
