//! Prompter adapters that never touch a terminal.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::debug;

use scaffold_core::{
    application::{ApplicationError, ports::Prompter},
    error::ScaffoldResult,
};

/// Answers every question with its default. Used for `--non-interactive`
/// and whenever stdin is not a terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractivePrompter;

impl Prompter for NonInteractivePrompter {
    fn confirm(&self, question: &str, default: bool) -> ScaffoldResult<bool> {
        debug!(question, default, "Non-interactive: using default");
        Ok(default)
    }

    fn ask(&self, question: &str, default: &str) -> ScaffoldResult<String> {
        debug!(question, default, "Non-interactive: using default");
        Ok(default.to_string())
    }
}

/// Replays queued answers in order, then falls back to defaults.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far, in order.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn next(&self, question: &str) -> ScaffoldResult<Option<String>> {
        self.asked
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?
            .push(question.to_string());
        Ok(self
            .answers
            .lock()
            .map_err(|_| ApplicationError::StoreLockError)?
            .pop_front())
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, question: &str, default: bool) -> ScaffoldResult<bool> {
        match self.next(question)? {
            None => Ok(default),
            Some(answer) => match answer.trim().to_ascii_lowercase().as_str() {
                "" => Ok(default),
                "y" | "yes" | "true" => Ok(true),
                "n" | "no" | "false" => Ok(false),
                other => Err(ApplicationError::Prompt {
                    reason: format!("'{other}' is not a yes/no answer"),
                }
                .into()),
            },
        }
    }

    fn ask(&self, question: &str, default: &str) -> ScaffoldResult<String> {
        Ok(self
            .next(question)?
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| default.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_returns_defaults() {
        let p = NonInteractivePrompter;
        assert!(!p.confirm("use devise?", false).unwrap());
        assert_eq!(p.ask("model?", "user").unwrap(), "user");
    }

    #[test]
    fn scripted_answers_are_consumed_in_order() {
        let p = ScriptedPrompter::new(["yes", "", "account"]);
        assert!(p.confirm("devise?", false).unwrap());
        assert!(!p.confirm("styling?", false).unwrap());
        assert_eq!(p.ask("model?", "user").unwrap(), "account");
        assert_eq!(p.ask("extra?", "none").unwrap(), "none");
        assert_eq!(p.asked(), vec!["devise?", "styling?", "model?", "extra?"]);
    }

    #[test]
    fn scripted_rejects_garbage_confirmation() {
        let p = ScriptedPrompter::new(["maybe"]);
        assert!(p.confirm("devise?", false).is_err());
    }
}
