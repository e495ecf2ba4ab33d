//! Step primitives - the side effects behind each step kind.
//!
//! Every primitive renders its string parameters with the run's variables
//! first, then talks to the ports. Paths are always resolved under the
//! target root.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::{
    application::{
        ApplicationError,
        ports::{CommandInvocation, CommandRunner, Filesystem, Prompter, ResourceStore},
    },
    domain::{RelativePath, StepAction, Variables},
    error::ScaffoldResult,
};

/// Ports and settings the primitives operate on.
#[derive(Clone, Copy)]
pub struct Workspace<'a> {
    pub root: &'a Path,
    pub filesystem: &'a dyn Filesystem,
    pub resources: &'a dyn ResourceStore,
    pub runner: &'a dyn CommandRunner,
    pub prompter: &'a dyn Prompter,
    /// Applied to commands that do not set their own timeout.
    pub default_timeout: Option<Duration>,
}

/// Run the primitive for `action`. Returns the answer for prompt steps.
pub fn execute(
    ws: &Workspace<'_>,
    action: &StepAction,
    variables: &Variables,
) -> ScaffoldResult<Option<String>> {
    match action {
        StepAction::RunCommand {
            program,
            args,
            cwd,
            timeout,
            expect_stdout,
        } => run_command(ws, program, args, cwd.as_ref(), *timeout, variables)
            .and_then(|stdout| expect_output(program, &stdout, expect_stdout.as_deref(), variables))
            .map(|_| None),
        StepAction::CopyFile {
            resource,
            destination,
            overwrite,
            executable,
        } => copy_file(ws, resource, destination, *overwrite, *executable, variables).map(|_| None),
        StepAction::RenderTemplate {
            resource,
            destination,
            overwrite,
            executable,
            variables: local,
        } => render_template(
            ws,
            resource,
            destination,
            *overwrite,
            *executable,
            &variables.merged(local),
        )
        .map(|_| None),
        StepAction::AppendText {
            destination,
            text,
            dedupe,
            after,
        } => append_text(ws, destination, text, *dedupe, after.as_deref(), variables).map(|_| None),
        StepAction::Prompt {
            question, default, ..
        } => prompt(ws, question, default, variables).map(Some),
    }
}

/// Run an external tool in the target directory (or `cwd` below it).
///
/// Returns the captured stdout.
///
/// # Errors
/// `ExternalTool` on a non-zero exit, a signal, or a timeout.
pub fn run_command(
    ws: &Workspace<'_>,
    program: &str,
    args: &[String],
    cwd: Option<&RelativePath>,
    timeout: Option<Duration>,
    variables: &Variables,
) -> ScaffoldResult<String> {
    let invocation = CommandInvocation {
        program: variables.render(program)?,
        args: args
            .iter()
            .map(|a| variables.render(a))
            .collect::<Result<_, _>>()?,
        cwd: cwd.map_or_else(|| ws.root.to_path_buf(), |c| c.under(ws.root)),
        timeout: timeout.or(ws.default_timeout),
    };

    info!(command = %invocation, "Running command");
    let output = ws.runner.run(&invocation)?;

    if output.is_success() {
        debug!(stdout_bytes = output.stdout.len(), "Command succeeded");
        return Ok(output.stdout);
    }

    Err(ApplicationError::ExternalTool {
        command: invocation.to_string(),
        exit_code: output.exit_code,
        stderr: output.stderr,
        timed_out: false,
    }
    .into())
}

/// Check a successful command's stdout for `expected`.
///
/// # Errors
/// `ExternalTool` with exit code 0 when the text is missing.
pub fn expect_output(
    program: &str,
    stdout: &str,
    expected: Option<&str>,
    variables: &Variables,
) -> ScaffoldResult<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let expected = variables.render(expected)?;
    if stdout.contains(&expected) {
        return Ok(());
    }

    Err(ApplicationError::ExternalTool {
        command: variables.render(program)?,
        exit_code: Some(0),
        stderr: format!(
            "expected output containing '{expected}', got: {}",
            stdout.trim()
        ),
        timed_out: false,
    }
    .into())
}

/// Copy a resource verbatim.
///
/// # Errors
/// - `ResourceNotFound` if the resource is missing
/// - `DestinationExists` if `!overwrite` and the destination is present
pub fn copy_file(
    ws: &Workspace<'_>,
    resource: &str,
    destination: &str,
    overwrite: bool,
    executable: bool,
    variables: &Variables,
) -> ScaffoldResult<()> {
    let target = destination_path(ws, destination, variables)?;
    refuse_existing(ws, &target, overwrite)?;

    let content = ws.resources.get(resource)?;
    write(ws, &target, &content, executable)?;
    info!(resource, path = %target.display(), "Copied file");
    Ok(())
}

/// Render a resource with `variables` and write the result.
///
/// # Errors
/// Same as [`copy_file`], plus `TemplateRender` for placeholders that do
/// not resolve.
pub fn render_template(
    ws: &Workspace<'_>,
    resource: &str,
    destination: &str,
    overwrite: bool,
    executable: bool,
    variables: &Variables,
) -> ScaffoldResult<()> {
    let target = destination_path(ws, destination, variables)?;
    refuse_existing(ws, &target, overwrite)?;

    let content = ws.resources.render(resource, variables)?;
    write(ws, &target, &content, executable)?;
    info!(resource, path = %target.display(), "Rendered template");
    Ok(())
}

/// Append `text` to a file, or insert it after the first line containing
/// `after`. The file is created when missing.
///
/// # Errors
/// `AnchorNotFound` when `after` is set and no line contains it.
pub fn append_text(
    ws: &Workspace<'_>,
    destination: &str,
    text: &str,
    dedupe: bool,
    after: Option<&str>,
    variables: &Variables,
) -> ScaffoldResult<()> {
    let target = destination_path(ws, destination, variables)?;
    let text = variables.render(text)?;

    let existing = if ws.filesystem.exists(&target) {
        ws.filesystem.read_to_string(&target)?
    } else {
        String::new()
    };

    if dedupe && contains_lines(&existing, &text) {
        debug!(path = %target.display(), "Text already present, nothing to append");
        return Ok(());
    }

    let updated = match after {
        Some(anchor) => {
            let anchor = variables.render(anchor)?;
            insert_after(&existing, &anchor, &text).ok_or_else(|| {
                ApplicationError::AnchorNotFound {
                    path: target.clone(),
                    anchor: anchor.clone(),
                }
            })?
        }
        None => append(&existing, &text),
    };

    write(ws, &target, &updated, false)?;
    info!(path = %target.display(), "Appended text");
    Ok(())
}

/// Ask the operator a question. An empty answer means `default`.
pub fn prompt(
    ws: &Workspace<'_>,
    question: &str,
    default: &str,
    variables: &Variables,
) -> ScaffoldResult<String> {
    let question = variables.render(question)?;
    let default = variables.render(default)?;

    let answer = ws.prompter.ask(&question, &default)?;
    let answer = answer.trim();
    Ok(if answer.is_empty() {
        default
    } else {
        answer.to_string()
    })
}

fn destination_path(
    ws: &Workspace<'_>,
    destination: &str,
    variables: &Variables,
) -> ScaffoldResult<PathBuf> {
    let rendered = variables.render(destination)?;
    Ok(RelativePath::try_new(rendered)?.under(ws.root))
}

fn refuse_existing(ws: &Workspace<'_>, path: &Path, overwrite: bool) -> ScaffoldResult<()> {
    if !overwrite && ws.filesystem.exists(path) {
        return Err(ApplicationError::DestinationExists {
            path: path.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

fn write(ws: &Workspace<'_>, path: &Path, content: &str, executable: bool) -> ScaffoldResult<()> {
    if let Some(parent) = path.parent() {
        ws.filesystem.create_dir_all(parent)?;
    }
    ws.filesystem.write_file(path, content)?;
    if executable {
        ws.filesystem.set_permissions(path, true)?;
    }
    Ok(())
}

fn append(existing: &str, text: &str) -> String {
    let mut out = String::with_capacity(existing.len() + text.len() + 2);
    out.push_str(existing);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(text);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Whether every line of `text` already appears as a whole line of
/// `existing`. Trailing whitespace is ignored on both sides.
fn contains_lines(existing: &str, text: &str) -> bool {
    let present: HashSet<&str> = existing.lines().map(str::trim_end).collect();
    let mut wanted = text.lines().map(str::trim_end).filter(|l| !l.is_empty()).peekable();
    wanted.peek().is_some() && wanted.all(|line| present.contains(line))
}

fn insert_after(existing: &str, anchor: &str, text: &str) -> Option<String> {
    let mut offset = 0;
    for line in existing.split_inclusive('\n') {
        offset += line.len();
        if !line.contains(anchor) {
            continue;
        }

        let mut out = String::with_capacity(existing.len() + text.len() + 2);
        out.push_str(&existing[..offset]);
        if !line.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(text);
        if !text.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&existing[offset..]);
        return Some(out);
    }
    None
}
