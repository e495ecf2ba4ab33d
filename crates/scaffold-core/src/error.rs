//! Unified error handling for Scaffold Core.
//!
//! This module provides a unified error type that wraps domain and application
//! errors, with rich context and user-actionable suggestions.

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;

/// Root error type for Scaffold Core operations.
///
/// This enum wraps all possible errors that can occur when using scaffold-core,
/// providing a unified interface for error handling.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScaffoldError {
    /// Invalid plans and rendering failures.
    #[error("{0}")]
    Domain(#[from] DomainError),

    /// Failures while executing a plan.
    #[error("{0}")]
    Application(#[from] ApplicationError),

    /// Configuration or setup errors.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Unexpected internal errors (bugs).
    #[error("Internal error: {message}. This is a bug, please report it.")]
    Internal { message: String },
}

impl ScaffoldError {
    /// Get user-actionable suggestions for fixing this error.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Domain(e) => e.suggestions(),
            Self::Application(e) => e.suggestions(),
            Self::Configuration { message } => vec![
                format!("Configuration issue: {}", message),
                "Check your setup and try again".into(),
            ],
            Self::Internal { .. } => vec![
                "This appears to be a bug in Scaffold".into(),
                "Please report this issue at: https://github.com/cosecruz/scaffold/issues".into(),
            ],
        }
    }

    /// Get error category for display/styling purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Domain(e) => match e.category() {
                crate::domain::ErrorCategory::Validation => ErrorCategory::Validation,
                crate::domain::ErrorCategory::Rendering => ErrorCategory::Validation,
            },
            Self::Application(e) => e.category(),
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Captured standard error of a failed external command, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Application(e) => e.stderr(),
            _ => None,
        }
    }
}

/// Error categories for UI display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Conflict,
    ExternalTool,
    Corrupt,
    Configuration,
    Internal,
}

/// Convenient result type alias.
pub type ScaffoldResult<T> = Result<T, ScaffoldError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_are_validation() {
        let err: ScaffoldError = DomainError::DuplicateIdempotencyKey { key: "k".into() }.into();
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(err.to_string().contains("Duplicate idempotency key"));
    }

    #[test]
    fn application_errors_keep_their_category() {
        let err: ScaffoldError = ApplicationError::ResourceNotFound { name: "x".into() }.into();
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert!(!err.suggestions().is_empty());
    }
}
