//! Steps: the atomic, loggable actions a plan is made of.
//!
//! ```text
//! Step
//!  ├── key     IdempotencyKey   derived from kind + unrendered params
//!  ├── action  StepAction       what to do
//!  ├── phase   Option<Phase>    milestone for post-hooks
//!  └── tolerate_failure         record the error and keep going
//! ```
//!
//! Steps are immutable once built. Their parameters may contain `{{ var }}`
//! placeholders; rendering happens at execution time, so the key stays stable
//! across runs even when prompt answers differ.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DomainError, RelativePath, Variables};

/// Stable identifier used to detect whether a step already ran.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key under which a conditional group's decision is recorded.
    pub fn gate(group: &str) -> Self {
        Self(format!("gate:{group}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdempotencyKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Named milestone used to schedule post-hooks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phase(String);

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The five primitive step kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    RunCommand,
    CopyFile,
    RenderTemplate,
    AppendText,
    Prompt,
}

impl StepKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RunCommand => "run",
            Self::CopyFile => "copy",
            Self::RenderTemplate => "render",
            Self::AppendText => "append",
            Self::Prompt => "prompt",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a step does. String fields may contain `{{ var }}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    RunCommand {
        program: String,
        args: Vec<String>,
        /// Working directory relative to the project root.
        cwd: Option<RelativePath>,
        timeout: Option<Duration>,
        /// Text the command's stdout must contain, e.g. a version banner.
        expect_stdout: Option<String>,
    },
    CopyFile {
        resource: String,
        destination: String,
        overwrite: bool,
        executable: bool,
    },
    RenderTemplate {
        resource: String,
        destination: String,
        overwrite: bool,
        executable: bool,
        /// Step-local variables layered over the run's variables.
        variables: Variables,
    },
    AppendText {
        destination: String,
        text: String,
        dedupe: bool,
        /// Insert after the first line containing this anchor instead of at
        /// the end of the file.
        after: Option<String>,
    },
    Prompt {
        question: String,
        default: String,
        /// Variable that receives the answer.
        variable: String,
    },
}

impl StepAction {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::RunCommand { .. } => StepKind::RunCommand,
            Self::CopyFile { .. } => StepKind::CopyFile,
            Self::RenderTemplate { .. } => StepKind::RenderTemplate,
            Self::AppendText { .. } => StepKind::AppendText,
            Self::Prompt { .. } => StepKind::Prompt,
        }
    }

    /// Derive the idempotency key from kind and unrendered parameters.
    pub fn derive_key(&self) -> IdempotencyKey {
        let kind = self.kind();
        let body = match self {
            Self::RunCommand { program, args, .. } => {
                std::iter::once(program.as_str())
                    .chain(args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            Self::CopyFile {
                resource,
                destination,
                ..
            }
            | Self::RenderTemplate {
                resource,
                destination,
                ..
            } => format!("{resource}->{destination}"),
            Self::AppendText {
                destination, text, ..
            } => {
                let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, text.as_bytes());
                format!("{destination}#{}", &digest.simple().to_string()[..12])
            }
            Self::Prompt { variable, .. } => variable.clone(),
        };
        IdempotencyKey(format!("{kind}:{body}"))
    }

    /// One-line, human readable description.
    pub fn describe(&self) -> String {
        match self {
            Self::RunCommand { program, args, .. } => {
                if args.is_empty() {
                    format!("run {program}")
                } else {
                    format!("run {program} {}", args.join(" "))
                }
            }
            Self::CopyFile {
                resource,
                destination,
                overwrite,
                ..
            } => format!(
                "copy {resource} -> {destination}{}",
                if *overwrite { " (overwrite)" } else { "" }
            ),
            Self::RenderTemplate {
                resource,
                destination,
                ..
            } => format!("render {resource} -> {destination}"),
            Self::AppendText {
                destination,
                after,
                ..
            } => match after {
                Some(anchor) => format!("insert text into {destination} after '{anchor}'"),
                None => format!("append text to {destination}"),
            },
            Self::Prompt { question, .. } => format!("ask \"{question}\""),
        }
    }
}

/// An immutable, scheduled action.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    key: IdempotencyKey,
    action: StepAction,
    phase: Option<Phase>,
    tolerate_failure: bool,
}

impl Step {
    /// Create a step whose key is derived from its action.
    pub fn new(action: StepAction) -> Self {
        Self {
            key: action.derive_key(),
            action,
            phase: None,
            tolerate_failure: false,
        }
    }

    /// Override the derived key.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.key = IdempotencyKey::new(id);
        self
    }

    pub fn in_phase(mut self, phase: impl Into<String>) -> Self {
        self.phase = Some(Phase::new(phase));
        self
    }

    pub fn tolerating_failure(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }

    pub fn key(&self) -> &IdempotencyKey {
        &self.key
    }

    pub fn action(&self) -> &StepAction {
        &self.action
    }

    pub fn kind(&self) -> StepKind {
        self.action.kind()
    }

    pub fn phase(&self) -> Option<&Phase> {
        self.phase.as_ref()
    }

    pub fn tolerates_failure(&self) -> bool {
        self.tolerate_failure
    }

    pub fn describe(&self) -> String {
        self.action.describe()
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        if self.key.as_str().trim().is_empty() {
            return Err(DomainError::InvalidStep("step id cannot be empty".into()));
        }
        match &self.action {
            StepAction::RunCommand { program, .. } if program.trim().is_empty() => Err(
                DomainError::InvalidStep(format!("{}: command cannot be empty", self.key)),
            ),
            StepAction::CopyFile {
                resource,
                destination,
                ..
            }
            | StepAction::RenderTemplate {
                resource,
                destination,
                ..
            } if resource.is_empty() || destination.is_empty() => Err(DomainError::InvalidStep(
                format!("{}: resource and destination are required", self.key),
            )),
            StepAction::AppendText {
                destination, text, ..
            } if destination.is_empty() || text.is_empty() => Err(DomainError::InvalidStep(
                format!("{}: destination and text are required", self.key),
            )),
            StepAction::Prompt { variable, .. } if variable.trim().is_empty() => Err(
                DomainError::InvalidStep(format!("{}: prompt needs a variable", self.key)),
            ),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(program: &str, args: &[&str]) -> StepAction {
        StepAction::RunCommand {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            cwd: None,
            timeout: None,
            expect_stdout: None,
        }
    }

    #[test]
    fn run_key_includes_program_and_args() {
        assert_eq!(
            run("git", &["init"]).derive_key().as_str(),
            "run:git init"
        );
    }

    #[test]
    fn copy_key_uses_unrendered_paths() {
        let action = StepAction::CopyFile {
            resource: "gitignore.tmpl".into(),
            destination: ".gitignore".into(),
            overwrite: false,
            executable: false,
        };
        assert_eq!(action.derive_key().as_str(), "copy:gitignore.tmpl->.gitignore");
    }

    #[test]
    fn append_key_is_stable_and_text_sensitive() {
        let a = StepAction::AppendText {
            destination: "Gemfile".into(),
            text: "gem 'devise'".into(),
            dedupe: true,
            after: None,
        };
        let b = StepAction::AppendText {
            destination: "Gemfile".into(),
            text: "gem 'kaminari'".into(),
            dedupe: true,
            after: None,
        };
        assert_eq!(a.derive_key(), a.clone().derive_key());
        assert_ne!(a.derive_key(), b.derive_key());
        assert!(a.derive_key().as_str().starts_with("append:Gemfile#"));
    }

    #[test]
    fn explicit_id_overrides_derived_key() {
        let step = Step::new(run("bundle", &["install"])).with_id("bundle-install-2");
        assert_eq!(step.key().as_str(), "bundle-install-2");
    }

    #[test]
    fn empty_command_is_invalid() {
        assert!(Step::new(run(" ", &[])).validate().is_err());
        assert!(Step::new(run("ls", &[])).validate().is_ok());
    }

    #[test]
    fn describe_is_human_readable() {
        assert_eq!(run("bundle", &["install"]).describe(), "run bundle install");
    }
}
