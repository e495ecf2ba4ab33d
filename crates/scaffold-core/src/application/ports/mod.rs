//! Application ports (traits) for external dependencies.
//!
//! In hexagonal architecture, ports define interfaces that the application
//! needs from the outside world. Adapters in `scaffold-adapters` implement these.
//!
//! ## Port Types
//!
//! - **Driven (Output) Ports**: Called by application, implemented by infrastructure
//!   - `Filesystem`: File operations on the target project
//!   - `ResourceStore`: Static files and templates
//!   - `CommandRunner`: External tool invocation
//!   - `Prompter`: Operator answers
//!   - `ActionLogStore`: Durable step history
//!
//! - **Driving (Input) Ports**: Called by external world, implemented by application
//!   - (Defined in CLI layer, implemented by services)

pub mod output;

pub use output::{
    ActionLogStore, CommandInvocation, CommandOutput, CommandRunner, Filesystem, Prompter,
    ResourceStore,
};

#[cfg(test)]
pub use output::MockCommandRunner;
