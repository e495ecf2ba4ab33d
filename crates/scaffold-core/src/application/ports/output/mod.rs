//! Driven (output) ports - implemented by infrastructure.
//!
//! These traits define what the sequencer needs from external systems.
//! The `scaffold-adapters` crate provides implementations.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::application::ApplicationError;
use crate::domain::{LogEntry, Variables};
use crate::error::ScaffoldResult;

/// Port for filesystem operations on the target project.
///
/// Implemented by:
/// - `scaffold_adapters::filesystem::LocalFilesystem` (production)
/// - `scaffold_adapters::filesystem::MemoryFilesystem` (testing)
pub trait Filesystem: Send + Sync {
    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> ScaffoldResult<()>;

    /// Write content to a file, replacing it if present.
    fn write_file(&self, path: &Path, content: &str) -> ScaffoldResult<()>;

    /// Read a whole file as UTF-8.
    fn read_to_string(&self, path: &Path) -> ScaffoldResult<String>;

    /// Set file permissions.
    fn set_permissions(&self, path: &Path, executable: bool) -> ScaffoldResult<()>;

    /// Check if path exists.
    fn exists(&self, path: &Path) -> bool;
}

/// Port for named static files and templates.
///
/// Implemented by:
/// - `scaffold_adapters::resource_store::DirectoryResourceStore` (files next to the plan)
/// - `scaffold_adapters::resource_store::InMemoryResourceStore` (testing, embedded plans)
pub trait ResourceStore: Send + Sync {
    /// Fetch a resource's raw content.
    ///
    /// # Errors
    /// `ResourceNotFound` if no resource has that name.
    fn get(&self, name: &str) -> ScaffoldResult<String>;

    /// Whether a resource with that name exists.
    fn contains(&self, name: &str) -> bool;

    /// Names of all resources, sorted.
    fn list(&self) -> ScaffoldResult<Vec<String>>;

    /// Fetch a resource and substitute its `{{ var }}` placeholders.
    ///
    /// # Errors
    /// - `ResourceNotFound` if absent
    /// - `TemplateRender` on unresolved or malformed placeholders
    fn render(&self, name: &str, variables: &Variables) -> ScaffoldResult<String> {
        let raw = self.get(name)?;
        variables.render(&raw).map_err(|e| {
            ApplicationError::TemplateRender {
                resource: name.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// A fully rendered external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub timeout: Option<Duration>,
}

impl fmt::Display for CommandInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of an external command.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Port for running external tools as opaque subprocesses.
///
/// Implementations return `Ok` for any process that ran to completion,
/// whatever its exit status; the sequencer decides what a non-zero exit
/// means. A timeout is reported as `ApplicationError::ExternalTool` with
/// `timed_out` set.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &CommandInvocation) -> ScaffoldResult<CommandOutput>;
}

/// Port for operator input.
///
/// Non-interactive implementations must return the default immediately.
pub trait Prompter: Send + Sync {
    /// Ask a yes/no question.
    fn confirm(&self, question: &str, default: bool) -> ScaffoldResult<bool>;

    /// Ask a free-form question. An empty answer means `default`.
    fn ask(&self, question: &str, default: &str) -> ScaffoldResult<String>;
}

/// Port for durable action log storage.
///
/// Implemented by:
/// - `scaffold_adapters::action_log::JsonLinesActionLog` (`.scaffold/actions.jsonl`)
/// - `scaffold_adapters::action_log::MemoryActionLog` (testing)
pub trait ActionLogStore: Send {
    /// Read every persisted entry in write order.
    ///
    /// # Errors
    /// `ActionLogCorrupt` when an entry cannot be parsed.
    fn load(&mut self) -> ScaffoldResult<Vec<LogEntry>>;

    /// Durably append one entry.
    fn append(&mut self, entry: &LogEntry) -> ScaffoldResult<()>;

    /// Replace the whole log (used for compaction).
    fn rewrite(&mut self, entries: &[LogEntry]) -> ScaffoldResult<()>;

    /// Human-readable location for messages.
    fn location(&self) -> String;
}
