// ============================================================================
//  CLEAN MODULE BOUNDARIES
// ============================================================================

//! Core domain layer for Scaffold.
//!
//! This module contains the plan model with no I/O. Running commands,
//! touching files and asking questions are handled via ports (traits)
//! defined in the application layer.
//!
//! ## Hexagonal Architecture Compliance
//!
//! - **No async**: Domain logic is synchronous
//! - **No I/O**: No filesystem, process, or terminal access
//! - **Immutable entities**: Plans and steps never change once built
//! - **Validated at construction**: `PlanBuilder::build` enforces plan invariants
//!
// Public API - what the world sees
pub mod common;
pub mod error;
pub mod log_entry;
pub mod plan;
pub mod step;
pub mod variables;

// Re-exports for convenience
pub use common::RelativePath;
pub use error::{DomainError, ErrorCategory};
pub use log_entry::{EntryStatus, LogEntry};
pub use plan::{ConditionalGroup, Guard, Plan, PlanBuilder, PlanHook, PlanItem};
pub use step::{IdempotencyKey, Phase, Step, StepAction, StepKind};
pub use variables::{Assignment, Variables};

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // End-to-end plan construction
    // ========================================================================

    #[test]
    fn starter_plan_builds() {
        let plan = Plan::builder("starter")
            .variable("model_name", "user")
            .step(Step::new(StepAction::RunCommand {
                program: "git".into(),
                args: vec!["init".into()],
                cwd: None,
                timeout: None,
                expect_stdout: None,
            }))
            .step(Step::new(StepAction::CopyFile {
                resource: "gitignore.tmpl".into(),
                destination: ".gitignore".into(),
                overwrite: false,
                executable: false,
            }))
            .group(
                ConditionalGroup::new(
                    "devise",
                    Guard::Prompt {
                        question: "use devise?".into(),
                        default: false,
                    },
                )
                .step(Step::new(StepAction::RunCommand {
                    program: "bin/rails".into(),
                    args: vec!["generate".into(), "devise".into(), "{{ model_name }}".into()],
                    cwd: None,
                    timeout: None,
                    expect_stdout: None,
                })),
            )
            .build()
            .unwrap();

        assert_eq!(plan.step_count(), 3);
        assert_eq!(plan.groups().count(), 1);
        assert_eq!(plan.defaults().get("model_name"), Some("user"));
    }

    #[test]
    fn gate_keys_are_namespaced() {
        let group = ConditionalGroup::new(
            "styling",
            Guard::Flag {
                variable: "styling".into(),
                default: false,
            },
        );
        assert_eq!(group.gate_key().as_str(), "gate:styling");
        assert!(!group.guard().default_value());
    }
}
