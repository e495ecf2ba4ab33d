// ============================================================================
// domain/error.rs - PLAN VALIDATION & RENDERING ERRORS
// ============================================================================

use thiserror::Error;

/// Root domain error type.
///
/// All errors are:
/// - Cloneable (recorded in the action log and in run reports)
/// - Categorizable (for CLI display)
/// - Actionable (provides suggestions)
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    // ========================================================================
    // Plan Validation Errors
    // ========================================================================
    #[error("Duplicate idempotency key in plan: {key}")]
    DuplicateIdempotencyKey { key: String },

    #[error("Invalid conditional group '{name}': {reason}")]
    InvalidGroup { name: String, reason: String },

    #[error("Invalid step: {0}")]
    InvalidStep(String),

    #[error("Invalid hook for phase '{phase}': {reason}")]
    InvalidHook { phase: String, reason: String },

    #[error("Absolute paths not allowed: {path}")]
    AbsolutePathNotAllowed { path: String },

    #[error("Path escapes the project directory: {path}")]
    PathEscapesRoot { path: String },

    // ========================================================================
    // Rendering Errors
    // ========================================================================
    #[error("Unresolved variable '{name}'")]
    UnresolvedVariable { name: String },

    #[error("Malformed template: {reason}")]
    MalformedTemplate { reason: String },

    #[error("Invalid variable assignment '{input}': expected key=value")]
    InvalidAssignment { input: String },
}

impl DomainError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::DuplicateIdempotencyKey { key } => vec![
                format!("Two steps share the key '{}'", key),
                "Give one of them an explicit `id = \"...\"` in the plan file".into(),
            ],
            Self::InvalidGroup { name, .. } => vec![
                format!("Check the definition of group '{}'", name),
                "A group needs a unique name, one guard (prompt or flag) and no nested groups"
                    .into(),
            ],
            Self::UnresolvedVariable { name } => vec![
                format!("Variable '{}' has no value", name),
                format!("Pass it on the command line: --var {}=<value>", name),
                "Or declare a default under [variables] in the plan file".into(),
            ],
            Self::MalformedTemplate { .. } => {
                vec!["Placeholders must look like {{ name }}".into()]
            }
            Self::AbsolutePathNotAllowed { .. } | Self::PathEscapesRoot { .. } => vec![
                "Destinations and resource names are relative to the project directory".into(),
            ],
            Self::InvalidAssignment { .. } => vec!["Example: --var model_name=user".into()],
            _ => vec!["Run `scaffold check <plan>` to validate the plan file".into()],
        }
    }

    /// Error category for CLI display styling.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnresolvedVariable { .. } | Self::MalformedTemplate { .. } => {
                ErrorCategory::Rendering
            }
            _ => ErrorCategory::Validation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Rendering,
}
