//! Plans: ordered steps, conditional groups and post-hooks.
//!
//! A plan is built once (from a plan file or in code) and is read-only while
//! it executes. [`PlanBuilder::build`] is the only way to obtain one and it
//! enforces the plan invariants:
//!
//! - every idempotency key (steps and group gates) is unique
//! - group names are unique, non-empty and groups do not nest
//! - hooks reference existing groups in `when`

use std::collections::HashSet;

use super::{DomainError, IdempotencyKey, Phase, Step, Variables};

/// Where a conditional group's boolean comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Guard {
    /// Ask the operator a yes/no question.
    Prompt { question: String, default: bool },
    /// Read a boolean variable (`--var name=true`).
    Flag { variable: String, default: bool },
}

impl Guard {
    pub fn default_value(&self) -> bool {
        match self {
            Self::Prompt { default, .. } | Self::Flag { default, .. } => *default,
        }
    }
}

/// A named collection of steps gated by a single boolean.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalGroup {
    name: String,
    guard: Guard,
    steps: Vec<Step>,
}

impl ConditionalGroup {
    pub fn new(name: impl Into<String>, guard: Guard) -> Self {
        Self {
            name: name.into(),
            guard,
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn gate_key(&self) -> IdempotencyKey {
        IdempotencyKey::gate(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanItem {
    Step(Step),
    Group(ConditionalGroup),
}

/// Operator-facing text emitted when a phase completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanHook {
    pub phase: Phase,
    /// Only fire when this group evaluated `true`.
    pub when: Option<String>,
    pub notice: String,
}

/// The ordered set of steps and groups describing a scaffolding run.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    name: String,
    defaults: Variables,
    items: Vec<PlanItem>,
    hooks: Vec<PlanHook>,
}

impl Plan {
    pub fn builder(name: impl Into<String>) -> PlanBuilder {
        PlanBuilder {
            name: name.into(),
            defaults: Variables::new(),
            items: Vec::new(),
            hooks: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defaults(&self) -> &Variables {
        &self.defaults
    }

    pub fn items(&self) -> &[PlanItem] {
        &self.items
    }

    pub fn hooks(&self) -> &[PlanHook] {
        &self.hooks
    }

    /// Every step in declared order, with the group it belongs to.
    pub fn steps(&self) -> impl Iterator<Item = (Option<&ConditionalGroup>, &Step)> {
        self.items.iter().flat_map(|item| match item {
            PlanItem::Step(step) => vec![(None, step)],
            PlanItem::Group(group) => group.steps.iter().map(|s| (Some(group), s)).collect(),
        })
    }

    pub fn step_count(&self) -> usize {
        self.steps().count()
    }

    pub fn groups(&self) -> impl Iterator<Item = &ConditionalGroup> {
        self.items.iter().filter_map(|item| match item {
            PlanItem::Group(g) => Some(g),
            PlanItem::Step(_) => None,
        })
    }

    /// Phases carried by at least one step.
    pub fn step_phases(&self) -> HashSet<&Phase> {
        self.steps().filter_map(|(_, s)| s.phase()).collect()
    }

    fn validate(&self) -> Result<(), DomainError> {
        if self.name.trim().is_empty() {
            return Err(DomainError::InvalidStep("plan name cannot be empty".into()));
        }

        let mut keys: HashSet<&IdempotencyKey> = HashSet::new();
        let mut group_keys = Vec::new();
        let mut group_names: HashSet<&str> = HashSet::new();

        for item in &self.items {
            if let PlanItem::Group(group) = item {
                if group.name.trim().is_empty() {
                    return Err(DomainError::InvalidGroup {
                        name: group.name.clone(),
                        reason: "group name cannot be empty".into(),
                    });
                }
                if !group_names.insert(group.name.as_str()) {
                    return Err(DomainError::InvalidGroup {
                        name: group.name.clone(),
                        reason: "group name is used twice".into(),
                    });
                }
                if let Guard::Flag { variable, .. } = &group.guard {
                    if variable.trim().is_empty() {
                        return Err(DomainError::InvalidGroup {
                            name: group.name.clone(),
                            reason: "flag guard needs a variable name".into(),
                        });
                    }
                }
                group_keys.push(group.gate_key());
            }
        }

        for (_, step) in self.steps() {
            step.validate()?;
            if !keys.insert(step.key()) {
                return Err(DomainError::DuplicateIdempotencyKey {
                    key: step.key().to_string(),
                });
            }
        }

        for key in &group_keys {
            if !keys.insert(key) {
                return Err(DomainError::DuplicateIdempotencyKey {
                    key: key.to_string(),
                });
            }
        }

        for hook in &self.hooks {
            if hook.phase.as_str().trim().is_empty() {
                return Err(DomainError::InvalidHook {
                    phase: hook.phase.to_string(),
                    reason: "phase cannot be empty".into(),
                });
            }
            if let Some(when) = &hook.when {
                if !group_names.contains(when.as_str()) {
                    return Err(DomainError::InvalidHook {
                        phase: hook.phase.to_string(),
                        reason: format!("`when` references unknown group '{when}'"),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Collects plan items, then validates them in [`PlanBuilder::build`].
#[derive(Debug)]
pub struct PlanBuilder {
    name: String,
    defaults: Variables,
    items: Vec<PlanItem>,
    hooks: Vec<PlanHook>,
}

impl PlanBuilder {
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.set(name, value);
        self
    }

    pub fn variables(mut self, vars: Variables) -> Self {
        self.defaults = self.defaults.merged(&vars);
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.items.push(PlanItem::Step(step));
        self
    }

    pub fn group(mut self, group: ConditionalGroup) -> Self {
        self.items.push(PlanItem::Group(group));
        self
    }

    pub fn hook(
        mut self,
        phase: impl Into<String>,
        when: Option<String>,
        notice: impl Into<String>,
    ) -> Self {
        self.hooks.push(PlanHook {
            phase: Phase::new(phase),
            when,
            notice: notice.into(),
        });
        self
    }

    pub fn build(self) -> Result<Plan, DomainError> {
        let plan = Plan {
            name: self.name,
            defaults: self.defaults,
            items: self.items,
            hooks: self.hooks,
        };
        plan.validate()?;
        Ok(plan)
    }
}
