//! Application layer errors.
//!
//! These errors represent failures while executing a plan, not invalid
//! plans. Plan validation errors are `DomainError` from `crate::domain`.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Errors that occur while executing steps or handling the action log.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApplicationError {
    /// A named resource does not exist in the resource store.
    #[error("Resource not found: {name}")]
    ResourceNotFound { name: String },

    /// A resource could not be rendered with the current variables.
    #[error("Failed to render template '{resource}': {reason}")]
    TemplateRender { resource: String, reason: String },

    /// Destination exists and the step does not allow overwriting.
    #[error("Destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// External command exited non-zero or timed out.
    #[error("{}", external_tool_message(.command, .exit_code, .timed_out))]
    ExternalTool {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
        timed_out: bool,
    },

    /// An anchor line for an insertion was not found.
    #[error("Anchor '{anchor}' not found in {path}")]
    AnchorNotFound { path: PathBuf, anchor: String },

    /// Filesystem operation failed.
    #[error("Filesystem error at {path}: {reason}")]
    FilesystemError { path: PathBuf, reason: String },

    /// Reading an answer from the operator failed.
    #[error("Prompt failed: {reason}")]
    Prompt { reason: String },

    /// The plan file could not be read or parsed.
    #[error("Failed to load plan {path}: {reason}")]
    PlanLoad { path: PathBuf, reason: String },

    /// The persisted action log could not be parsed.
    #[error("Action log {location} is corrupt at line {line}: {reason}")]
    ActionLogCorrupt {
        location: String,
        line: usize,
        reason: String,
    },

    /// Another run holds the action log.
    #[error("Action log is locked by another run ({lock_path})")]
    ActionLogLocked { lock_path: PathBuf },

    /// A previous run left entries and `--resume` was not requested.
    #[error("An action log from a previous run exists at {location}")]
    ActionLogExists { location: String },

    /// A step started in a previous run but never finished.
    #[error("Step '{key}' was interrupted in a previous run")]
    InterruptedStep { key: String },

    /// In-memory store access failed (lock poisoned).
    #[error("Store lock poisoned")]
    StoreLockError,
}

fn external_tool_message(command: &str, exit_code: &Option<i32>, timed_out: &bool) -> String {
    if *timed_out {
        return format!("Command timed out: {command}");
    }
    match exit_code {
        Some(0) => format!("Command output did not match the expected text: {command}"),
        Some(code) => format!("Command failed with exit code {code}: {command}"),
        None => format!("Command terminated by signal: {command}"),
    }
}

impl ApplicationError {
    /// Get user-actionable suggestions.
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::ResourceNotFound { name } => vec![
                format!("No resource named '{}'", name),
                "Resources are looked up in the plan's resource directory".into(),
                "Run `scaffold check <plan>` to list missing resources".into(),
            ],
            Self::TemplateRender { reason, .. } => vec![
                format!("Rendering failed: {}", reason),
                "Provide missing values with --var name=value".into(),
            ],
            Self::DestinationExists { path } => vec![
                format!("'{}' already exists", path.display()),
                "Set `overwrite = true` on the step to replace it".into(),
                "Or remove the file and resume with --resume".into(),
            ],
            Self::ExternalTool { command, timed_out, .. } => {
                let mut out = vec![
                    format!("Check the output of: {}", command),
                    "Ensure the tool is installed and on your PATH".into(),
                ];
                if *timed_out {
                    out.push("Raise the limit with --timeout or `timeout_secs`".into());
                }
                out
            }
            Self::AnchorNotFound { anchor, .. } => vec![
                format!("No line contains '{}'", anchor),
                "Check that an earlier step generated the file as expected".into(),
            ],
            Self::FilesystemError { path, .. } => vec![
                format!("Failed to access: {}", path.display()),
                "Check that you have write permissions".into(),
            ],
            Self::ActionLogCorrupt { location, .. } => vec![
                format!("Inspect or remove {}", location),
                "`scaffold reset` discards the log (completed steps will run again)".into(),
            ],
            Self::ActionLogLocked { lock_path } => vec![
                "Another scaffold run is using this project".into(),
                format!(
                    "If no other run is active, remove the stale lock: rm {}",
                    lock_path.display()
                ),
            ],
            Self::ActionLogExists { .. } => vec![
                "Continue the previous run with --resume".into(),
                "Or start over with `scaffold reset`".into(),
            ],
            Self::InterruptedStep { key } => vec![
                format!("Inspect what '{}' left behind before continuing", key),
                "Re-run it with --on-interrupted rerun".into(),
                "Or mark it done with --on-interrupted assume-done".into(),
            ],
            Self::StoreLockError => vec!["Try again in a moment".into()],
            _ => vec!["Check the error details above".into()],
        }
    }

    /// Get error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ResourceNotFound { .. } => ErrorCategory::NotFound,
            Self::TemplateRender { .. } | Self::PlanLoad { .. } => ErrorCategory::Validation,
            Self::DestinationExists { .. }
            | Self::AnchorNotFound { .. }
            | Self::ActionLogLocked { .. }
            | Self::ActionLogExists { .. }
            | Self::InterruptedStep { .. } => ErrorCategory::Conflict,
            Self::ExternalTool { .. } => ErrorCategory::ExternalTool,
            Self::ActionLogCorrupt { .. } => ErrorCategory::Corrupt,
            Self::Prompt { .. } | Self::FilesystemError { .. } | Self::StoreLockError => {
                ErrorCategory::Internal
            }
        }
    }

    /// Captured standard error of a failed command, if any.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::ExternalTool { stderr, .. } if !stderr.is_empty() => Some(stderr),
            _ => None,
        }
    }
}
