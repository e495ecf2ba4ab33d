//! Conditional Gate - resolves a group's boolean once per run.
//!
//! Resolution order, first match wins:
//!
//! 1. Decision recorded in the action log by an earlier run
//! 2. Command-line override `--var <group>=<bool>`
//! 3. The guard itself: a flag variable, or a question for the operator
//!
//! Without a prompter (dry runs) prompt guards fall back to their default.

use std::fmt;

use tracing::debug;

use crate::{
    application::ports::Prompter,
    domain::{ConditionalGroup, Guard, Variables, variables::parse_flag},
    error::ScaffoldResult,
};

/// Where a gate decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSource {
    Recorded,
    Override,
    Flag,
    Prompt,
    Default,
}

impl fmt::Display for GateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Recorded => "recorded",
            Self::Override => "override",
            Self::Flag => "flag",
            Self::Prompt => "prompt",
            Self::Default => "default",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub value: bool,
    pub source: GateSource,
}

pub struct GateEvaluator<'a> {
    prompter: Option<&'a dyn Prompter>,
}

impl<'a> GateEvaluator<'a> {
    pub fn new(prompter: &'a dyn Prompter) -> Self {
        Self {
            prompter: Some(prompter),
        }
    }

    /// Evaluator that never asks; prompt guards resolve to their default.
    pub fn without_prompts() -> Self {
        Self { prompter: None }
    }

    pub fn evaluate(
        &self,
        group: &ConditionalGroup,
        recorded: Option<&str>,
        overrides: &Variables,
        variables: &Variables,
    ) -> ScaffoldResult<GateDecision> {
        let decision = self.resolve(group, recorded, overrides, variables)?;
        debug!(
            group = group.name(),
            value = decision.value,
            source = %decision.source,
            "Gate evaluated"
        );
        Ok(decision)
    }

    fn resolve(
        &self,
        group: &ConditionalGroup,
        recorded: Option<&str>,
        overrides: &Variables,
        variables: &Variables,
    ) -> ScaffoldResult<GateDecision> {
        if let Some(value) = recorded.and_then(parse_flag) {
            return Ok(GateDecision {
                value,
                source: GateSource::Recorded,
            });
        }

        if let Some(value) = overrides.flag(group.name()) {
            return Ok(GateDecision {
                value,
                source: GateSource::Override,
            });
        }

        match group.guard() {
            Guard::Flag { variable, default } => Ok(match variables.flag(variable) {
                Some(value) => GateDecision {
                    value,
                    source: GateSource::Flag,
                },
                None => GateDecision {
                    value: *default,
                    source: GateSource::Default,
                },
            }),
            Guard::Prompt { question, default } => match self.prompter {
                Some(prompter) => {
                    let question = variables.render(question)?;
                    Ok(GateDecision {
                        value: prompter.confirm(&question, *default)?,
                        source: GateSource::Prompt,
                    })
                }
                None => Ok(GateDecision {
                    value: *default,
                    source: GateSource::Default,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Always {
        answer: bool,
        asked: AtomicUsize,
    }

    impl Prompter for Always {
        fn confirm(&self, _question: &str, _default: bool) -> ScaffoldResult<bool> {
            self.asked.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer)
        }

        fn ask(&self, _question: &str, default: &str) -> ScaffoldResult<String> {
            Ok(default.to_string())
        }
    }

    fn prompt_group() -> ConditionalGroup {
        ConditionalGroup::new(
            "devise",
            Guard::Prompt {
                question: "use devise?".into(),
                default: false,
            },
        )
    }

    #[test]
    fn recorded_decision_wins_without_prompting() {
        let prompter = Always {
            answer: true,
            asked: AtomicUsize::new(0),
        };
        let gate = GateEvaluator::new(&prompter);
        let d = gate
            .evaluate(&prompt_group(), Some("false"), &Variables::new(), &Variables::new())
            .unwrap();
        assert_eq!(d.value, false);
        assert_eq!(d.source, GateSource::Recorded);
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn override_beats_prompt() {
        let prompter = Always {
            answer: false,
            asked: AtomicUsize::new(0),
        };
        let overrides = Variables::new().with("devise", "yes");
        let d = GateEvaluator::new(&prompter)
            .evaluate(&prompt_group(), None, &overrides, &overrides)
            .unwrap();
        assert!(d.value);
        assert_eq!(d.source, GateSource::Override);
    }

    #[test]
    fn prompt_guard_asks_once() {
        let prompter = Always {
            answer: true,
            asked: AtomicUsize::new(0),
        };
        let d = GateEvaluator::new(&prompter)
            .evaluate(&prompt_group(), None, &Variables::new(), &Variables::new())
            .unwrap();
        assert!(d.value);
        assert_eq!(prompter.asked.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dry_run_uses_prompt_default() {
        let d = GateEvaluator::without_prompts()
            .evaluate(&prompt_group(), None, &Variables::new(), &Variables::new())
            .unwrap();
        assert_eq!(d.value, false);
        assert_eq!(d.source, GateSource::Default);
    }

    #[test]
    fn flag_guard_reads_variable_or_default() {
        let group = ConditionalGroup::new(
            "styling",
            Guard::Flag {
                variable: "with_styling".into(),
                default: true,
            },
        );
        let gate = GateEvaluator::without_prompts();

        let vars = Variables::new().with("with_styling", "no");
        let d = gate.evaluate(&group, None, &Variables::new(), &vars).unwrap();
        assert!(!d.value);
        assert_eq!(d.source, GateSource::Flag);

        let d = gate
            .evaluate(&group, None, &Variables::new(), &Variables::new())
            .unwrap();
        assert!(d.value);
        assert_eq!(d.source, GateSource::Default);
    }
}
