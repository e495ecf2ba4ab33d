//! Terminal prompter.
//!
//! Uses `dialoguer` when the `interactive` feature is enabled and falls back
//! to plain line reads on stdin otherwise.

use scaffold_core::{
    application::{ApplicationError, ports::Prompter},
    error::{ScaffoldError, ScaffoldResult},
};

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompter;

fn prompt_error(e: impl std::fmt::Display) -> ScaffoldError {
    ApplicationError::Prompt {
        reason: e.to_string(),
    }
    .into()
}

#[cfg(feature = "interactive")]
impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str, default: bool) -> ScaffoldResult<bool> {
        dialoguer::Confirm::new()
            .with_prompt(question)
            .default(default)
            .interact()
            .map_err(prompt_error)
    }

    fn ask(&self, question: &str, default: &str) -> ScaffoldResult<String> {
        let answer: String = dialoguer::Input::new()
            .with_prompt(question)
            .default(default.to_string())
            .allow_empty(true)
            .interact_text()
            .map_err(prompt_error)?;
        Ok(if answer.trim().is_empty() {
            default.to_string()
        } else {
            answer
        })
    }
}

#[cfg(not(feature = "interactive"))]
impl Prompter for TerminalPrompter {
    fn confirm(&self, question: &str, default: bool) -> ScaffoldResult<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        loop {
            let line = read_line(&format!("{question} {hint} "))?;
            match parse_yes_no(&line, default) {
                Some(answer) => return Ok(answer),
                None => eprintln!("Please answer y or n."),
            }
        }
    }

    fn ask(&self, question: &str, default: &str) -> ScaffoldResult<String> {
        let line = read_line(&format!("{question} [{default}] "))?;
        let line = line.trim();
        Ok(if line.is_empty() {
            default.to_string()
        } else {
            line.to_string()
        })
    }
}

#[cfg(not(feature = "interactive"))]
fn read_line(prompt: &str) -> ScaffoldResult<String> {
    use std::io::{self, Write};

    print!("{prompt}");
    io::stdout().flush().map_err(prompt_error)?;

    let mut input = String::new();
    let read = io::stdin().read_line(&mut input).map_err(prompt_error)?;
    if read == 0 {
        return Err(prompt_error("stdin closed"));
    }
    Ok(input)
}

/// `None` when the answer is neither yes nor no.
#[cfg_attr(feature = "interactive", allow(dead_code))]
fn parse_yes_no(input: &str, default: bool) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" => Some(default),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
