//! TOML plan loader.
//!
//! Parses a plan file into a validated domain [`Plan`] and locates the
//! resource directory that sits next to it.
//!
//! # `plan.toml` format
//!
//! ```toml
//! [plan]
//! name      = "rails-starter"
//! resources = "files"            # optional; relative to the plan file
//!
//! [variables]
//! app_name = "demo"
//!
//! [[steps]]
//! kind    = "run"                # run | copy | render | append | prompt | group
//! command = "git"
//! args    = ["init"]
//! phase   = "vcs"                # optional
//!
//! [[steps]]
//! kind          = "run"
//! command       = "rails"
//! args          = ["-v"]
//! expect_stdout = "Rails 4.2"    # optional; fails the step otherwise
//!
//! [[steps]]
//! kind    = "group"
//! name    = "devise"
//! prompt  = "Use devise?"        # or: flag = "variable-name"
//! default = false
//!   [[steps.steps]]
//!   kind    = "run"
//!   command = "bin/rails"
//!   args    = ["generate", "devise:install"]
//!
//! [[hooks]]
//! phase  = "bundle"
//! when   = "styling"             # optional group name
//! notice = "Add the wrapper markup to application.html.erb"
//! ```

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{debug, instrument};

use scaffold_core::{
    application::ApplicationError,
    domain::{
        ConditionalGroup, Guard, Plan, RelativePath, Step, StepAction, Variables,
    },
    error::{ScaffoldError, ScaffoldResult},
};

const DEFAULT_RESOURCE_DIR: &str = "files";

// ── Manifest types ────────────────────────────────────────────────────────────

/// Deserialised representation of a plan file.
///
/// Unknown keys are rejected so a misspelled option cannot silently fall
/// back to its default.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PlanManifest {
    pub plan: PlanSection,
    /// Plan defaults. Non-string TOML values are stored in their TOML form.
    #[serde(default)]
    pub variables: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub steps: Vec<StepEntry>,
    #[serde(default)]
    pub hooks: Vec<HookEntry>,
}

/// `[plan]` section.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PlanSection {
    pub name: String,
    /// Resource directory, relative to the plan file.
    pub resources: Option<String>,
}

/// One `[[steps]]` table, discriminated by `kind`.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum StepEntry {
    Run {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        cwd: Option<String>,
        timeout_secs: Option<u64>,
        /// Text stdout must contain, e.g. `"Rails 4.2"` for `rails -v`.
        expect_stdout: Option<String>,
        id: Option<String>,
        phase: Option<String>,
        #[serde(default)]
        tolerate_failure: bool,
    },
    Copy {
        source: String,
        destination: String,
        #[serde(default)]
        overwrite: bool,
        #[serde(default)]
        executable: bool,
        id: Option<String>,
        phase: Option<String>,
        #[serde(default)]
        tolerate_failure: bool,
    },
    Render {
        source: String,
        destination: String,
        #[serde(default)]
        overwrite: bool,
        #[serde(default)]
        executable: bool,
        #[serde(default)]
        variables: BTreeMap<String, toml::Value>,
        id: Option<String>,
        phase: Option<String>,
        #[serde(default)]
        tolerate_failure: bool,
    },
    Append {
        destination: String,
        text: String,
        #[serde(default = "yes")]
        dedupe: bool,
        after: Option<String>,
        id: Option<String>,
        phase: Option<String>,
        #[serde(default)]
        tolerate_failure: bool,
    },
    Prompt {
        question: String,
        #[serde(default)]
        default: String,
        variable: String,
        id: Option<String>,
        phase: Option<String>,
        #[serde(default)]
        tolerate_failure: bool,
    },
    Group {
        name: String,
        prompt: Option<String>,
        flag: Option<String>,
        #[serde(default)]
        default: bool,
        #[serde(default)]
        steps: Vec<StepEntry>,
    },
}

/// One `[[hooks]]` table.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct HookEntry {
    pub phase: String,
    pub when: Option<String>,
    pub notice: String,
}

fn yes() -> bool {
    true
}

// ── Loader ────────────────────────────────────────────────────────────────────

/// A parsed plan plus where its resources live.
#[derive(Debug, Clone)]
pub struct LoadedPlan {
    pub plan: Plan,
    pub source: PathBuf,
    pub resource_dir: PathBuf,
}

/// Loads plans from TOML files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanLoader;

impl PlanLoader {
    pub fn new() -> Self {
        Self
    }

    /// Read and validate the plan at `path`.
    ///
    /// # Errors
    ///
    /// - `PlanLoad` if the file cannot be read or is not a valid plan file
    /// - a `DomainError` if the plan breaks a structural rule (duplicate
    ///   keys, bad group reference, unsafe path)
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn load(&self, path: &Path) -> ScaffoldResult<LoadedPlan> {
        let raw = fs::read_to_string(path).map_err(|e| plan_error(path, e))?;
        let manifest = self.parse(path, &raw)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let resource_dir = base.join(
            manifest
                .plan
                .resources
                .as_deref()
                .unwrap_or(DEFAULT_RESOURCE_DIR),
        );

        let plan = build_plan(path, manifest)?;
        debug!(
            name = plan.name(),
            steps = plan.step_count(),
            resources = %resource_dir.display(),
            "Plan loaded"
        );

        Ok(LoadedPlan {
            plan,
            source: path.to_path_buf(),
            resource_dir,
        })
    }

    /// Parse plan text; `path` is only used in error messages.
    pub fn parse(&self, path: &Path, raw: &str) -> ScaffoldResult<PlanManifest> {
        toml::from_str(raw).map_err(|e| plan_error(path, e))
    }

    /// Parse and validate plan text without touching the filesystem.
    pub fn plan_from_str(&self, path: &Path, raw: &str) -> ScaffoldResult<Plan> {
        build_plan(path, self.parse(path, raw)?)
    }
}

fn plan_error(path: &Path, reason: impl std::fmt::Display) -> ScaffoldError {
    ApplicationError::PlanLoad {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
    .into()
}

fn build_plan(path: &Path, manifest: PlanManifest) -> ScaffoldResult<Plan> {
    let mut builder = Plan::builder(manifest.plan.name).variables(to_variables(manifest.variables));

    for entry in manifest.steps {
        builder = match entry {
            StepEntry::Group {
                name,
                prompt,
                flag,
                default,
                steps,
            } => {
                let guard = match (prompt, flag) {
                    (Some(question), None) => Guard::Prompt { question, default },
                    (None, Some(variable)) => Guard::Flag { variable, default },
                    _ => {
                        return Err(plan_error(
                            path,
                            format!("group '{name}' needs exactly one of `prompt` or `flag`"),
                        ));
                    }
                };
                let mut group = ConditionalGroup::new(name.clone(), guard);
                for child in steps {
                    if matches!(child, StepEntry::Group { .. }) {
                        return Err(plan_error(
                            path,
                            format!("group '{name}' cannot contain another group"),
                        ));
                    }
                    group = group.step(build_step(child)?);
                }
                builder.group(group)
            }
            other => builder.step(build_step(other)?),
        };
    }

    for hook in manifest.hooks {
        builder = builder.hook(hook.phase, hook.when, hook.notice);
    }

    Ok(builder.build()?)
}

fn build_step(entry: StepEntry) -> ScaffoldResult<Step> {
    let (action, id, phase, tolerate_failure) = match entry {
        StepEntry::Run {
            command,
            args,
            cwd,
            timeout_secs,
            expect_stdout,
            id,
            phase,
            tolerate_failure,
        } => (
            StepAction::RunCommand {
                program: command,
                args,
                cwd: cwd.map(RelativePath::try_new).transpose()?,
                timeout: timeout_secs.map(Duration::from_secs),
                expect_stdout,
            },
            id,
            phase,
            tolerate_failure,
        ),
        StepEntry::Copy {
            source,
            destination,
            overwrite,
            executable,
            id,
            phase,
            tolerate_failure,
        } => (
            StepAction::CopyFile {
                resource: source,
                destination,
                overwrite,
                executable,
            },
            id,
            phase,
            tolerate_failure,
        ),
        StepEntry::Render {
            source,
            destination,
            overwrite,
            executable,
            variables,
            id,
            phase,
            tolerate_failure,
        } => (
            StepAction::RenderTemplate {
                resource: source,
                destination,
                overwrite,
                executable,
                variables: to_variables(variables),
            },
            id,
            phase,
            tolerate_failure,
        ),
        StepEntry::Append {
            destination,
            text,
            dedupe,
            after,
            id,
            phase,
            tolerate_failure,
        } => (
            StepAction::AppendText {
                destination,
                text,
                dedupe,
                after,
            },
            id,
            phase,
            tolerate_failure,
        ),
        StepEntry::Prompt {
            question,
            default,
            variable,
            id,
            phase,
            tolerate_failure,
        } => (
            StepAction::Prompt {
                question,
                default,
                variable,
            },
            id,
            phase,
            tolerate_failure,
        ),
        StepEntry::Group { name, .. } => {
            return Err(ScaffoldError::Internal {
                message: format!("group '{name}' reached the step builder"),
            });
        }
    };

    let mut step = Step::new(action);
    if let Some(id) = id {
        step = step.with_id(id);
    }
    if let Some(phase) = phase {
        step = step.in_phase(phase);
    }
    if tolerate_failure {
        step = step.tolerating_failure();
    }
    Ok(step)
}

fn to_variables(values: BTreeMap<String, toml::Value>) -> Variables {
    values
        .into_iter()
        .map(|(name, value)| {
            let text = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            (name, text)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scaffold_core::domain::{DomainError, PlanItem};
    use tempfile::TempDir;

    const RAILS: &str = r#"
[plan]
name = "rails-starter"

[variables]
app_name = "shop"
api_only = false

[[steps]]
kind = "run"
command = "rails"
args = ["new", "{{ app_name }}"]
phase = "bundle"
timeout_secs = 600

[[steps]]
kind = "copy"
source = "gitignore.tmpl"
destination = ".gitignore"

[[steps]]
kind = "group"
name = "devise"
prompt = "Use devise?"
default = false

  [[steps.steps]]
  kind = "append"
  destination = "Gemfile"
  text = "gem 'devise'"

  [[steps.steps]]
  kind = "run"
  command = "bin/rails"
  args = ["generate", "devise:install"]

[[hooks]]
phase = "bundle"
when = "devise"
notice = "Configure mailer defaults"
"#;

    fn parse(raw: &str) -> ScaffoldResult<Plan> {
        PlanLoader::new().plan_from_str(Path::new("plan.toml"), raw)
    }

    #[test]
    fn parses_full_plan() {
        let plan = parse(RAILS).unwrap();
        assert_eq!(plan.name(), "rails-starter");
        assert_eq!(plan.step_count(), 4);
        assert_eq!(plan.defaults().get("api_only"), Some("false"));
        assert_eq!(plan.hooks().len(), 1);

        let keys: Vec<&str> = plan.steps().map(|(_, s)| s.key().as_str()).collect();
        assert_eq!(keys[0], "run:rails new {{ app_name }}");
        assert_eq!(keys[1], "copy:gitignore.tmpl->.gitignore");

        match &plan.items()[2] {
            PlanItem::Group(group) => {
                assert_eq!(group.name(), "devise");
                assert_eq!(group.steps().len(), 2);
            }
            PlanItem::Step(_) => panic!("expected a group"),
        }
    }

    #[test]
    fn timeout_and_flags_are_mapped() {
        let plan = parse(RAILS).unwrap();
        let (_, first) = plan.steps().next().unwrap();
        match first.action() {
            StepAction::RunCommand { timeout, .. } => {
                assert_eq!(*timeout, Some(Duration::from_secs(600)));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn expect_stdout_is_mapped() {
        let raw = r#"
[plan]
name = "version-check"

[[steps]]
kind = "run"
command = "rails"
args = ["-v"]
expect_stdout = "Rails 4.2"
"#;
        let plan = parse(raw).unwrap();
        let (_, first) = plan.steps().next().unwrap();
        match first.action() {
            StepAction::RunCommand { expect_stdout, .. } => {
                assert_eq!(expect_stdout.as_deref(), Some("Rails 4.2"));
            }
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn misspelled_step_option_is_a_load_error() {
        let raw = r#"
[plan]
name = "typo"

[[steps]]
kind = "copy"
source = "gitignore.tmpl"
destination = ".gitignore"
overwite = true
"#;
        let err = parse(raw).unwrap_err();
        assert!(matches!(
            err,
            ScaffoldError::Application(ApplicationError::PlanLoad { .. })
        ));
        assert!(err.to_string().contains("overwite"));
    }

    #[test]
    fn unknown_keys_are_rejected_in_every_table() {
        let plan_typo = "[plan]\nname = \"x\"\nresource = \"files\"\n";
        let hook_typo = "[plan]\nname = \"x\"\n\n[[hooks]]\nphase = \"a\"\nnotice = \"n\"\nwhen_ = \"g\"\n";
        let top_typo = "[plan]\nname = \"x\"\n\n[[step]]\nkind = \"run\"\ncommand = \"ls\"\n";
        let group_typo = "[plan]\nname = \"x\"\n\n[[steps]]\nkind = \"group\"\nname = \"g\"\nflag = \"g\"\ndefualt = true\n";

        for raw in [plan_typo, hook_typo, top_typo, group_typo] {
            assert!(
                matches!(
                    parse(raw),
                    Err(ScaffoldError::Application(ApplicationError::PlanLoad { .. }))
                ),
                "accepted: {raw}"
            );
        }
    }

    #[test]
    fn duplicate_steps_fail_validation() {
        let raw = r#"
[plan]
name = "dup"

[[steps]]
kind = "run"
command = "bundle"

[[steps]]
kind = "run"
command = "bundle"
"#;
        let err = parse(raw).unwrap_err();
        assert!(matches!(
            err,
            ScaffoldError::Domain(DomainError::DuplicateIdempotencyKey { .. })
        ));
    }

    #[test]
    fn group_needs_exactly_one_guard() {
        let raw = r#"
[plan]
name = "bad"

[[steps]]
kind = "group"
name = "g"
"#;
        assert!(matches!(
            parse(raw).unwrap_err(),
            ScaffoldError::Application(ApplicationError::PlanLoad { .. })
        ));
    }

    #[test]
    fn unknown_kind_is_a_load_error() {
        let raw = r#"
[plan]
name = "bad"

[[steps]]
kind = "delete"
path = "x"
"#;
        assert!(matches!(
            parse(raw).unwrap_err(),
            ScaffoldError::Application(ApplicationError::PlanLoad { .. })
        ));
    }

    #[test]
    fn load_resolves_resource_dir_next_to_plan() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plan.toml");
        fs::write(&path, "[plan]\nname = \"empty\"\nresources = \"templates\"\n").unwrap();

        let loaded = PlanLoader::new().load(&path).unwrap();
        assert_eq!(loaded.resource_dir, temp.path().join("templates"));
        assert_eq!(loaded.plan.step_count(), 0);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = PlanLoader::new()
            .load(Path::new("/definitely/missing/plan.toml"))
            .unwrap_err();
        assert!(matches!(
            err,
            ScaffoldError::Application(ApplicationError::PlanLoad { .. })
        ));
    }
}
