//! Post-Hook Registry - callbacks deferred until a phase completes.
//!
//! Hooks run in registration order. A failing hook is reported and the
//! remaining hooks still run; nothing already applied is rolled back.

use tracing::{debug, warn};

use crate::{
    domain::{Phase, PlanHook, Variables},
    error::{ScaffoldError, ScaffoldResult},
};

/// What a hook can see and emit while it runs.
pub struct HookContext<'a> {
    phase: &'a Phase,
    variables: &'a Variables,
    notices: Vec<String>,
}

impl<'a> HookContext<'a> {
    pub fn new(phase: &'a Phase, variables: &'a Variables) -> Self {
        Self {
            phase,
            variables,
            notices: Vec::new(),
        }
    }

    pub fn phase(&self) -> &Phase {
        self.phase
    }

    pub fn variables(&self) -> &Variables {
        self.variables
    }

    /// Queue a message for the operator.
    pub fn notify(&mut self, text: impl Into<String>) {
        self.notices.push(text.into());
    }
}

pub trait PostHook: Send {
    fn run(&mut self, ctx: &mut HookContext<'_>) -> ScaffoldResult<()>;
}

impl<F> PostHook for F
where
    F: FnMut(&mut HookContext<'_>) -> ScaffoldResult<()> + Send,
{
    fn run(&mut self, ctx: &mut HookContext<'_>) -> ScaffoldResult<()> {
        self(ctx)
    }
}

/// Plan-declared hook: print a notice, optionally only when a group ran.
#[derive(Debug, Clone)]
pub struct NoticeHook {
    when: Option<String>,
    notice: String,
}

impl NoticeHook {
    pub fn new(when: Option<String>, notice: impl Into<String>) -> Self {
        Self {
            when,
            notice: notice.into(),
        }
    }
}

impl From<&PlanHook> for NoticeHook {
    fn from(hook: &PlanHook) -> Self {
        Self::new(hook.when.clone(), hook.notice.clone())
    }
}

impl PostHook for NoticeHook {
    fn run(&mut self, ctx: &mut HookContext<'_>) -> ScaffoldResult<()> {
        if let Some(group) = &self.when {
            if ctx.variables().flag(group) != Some(true) {
                debug!(group = %group, "Notice suppressed: group not enabled");
                return Ok(());
            }
        }
        let text = ctx.variables().render(&self.notice)?;
        ctx.notify(text);
        Ok(())
    }
}

/// A hook that returned an error.
#[derive(Debug, Clone, PartialEq)]
pub struct HookFailure {
    pub phase: Phase,
    /// Position among the hooks registered for that phase.
    pub index: usize,
    pub error: ScaffoldError,
}

/// Result of firing one phase.
#[derive(Debug, Default)]
pub struct HookReport {
    pub notices: Vec<String>,
    pub failures: Vec<HookFailure>,
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<(Phase, Box<dyn PostHook>)>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding one [`NoticeHook`] per plan hook, in plan order.
    pub fn from_plan_hooks(hooks: &[PlanHook]) -> Self {
        let mut registry = Self::new();
        for hook in hooks {
            registry.register(hook.phase.clone(), NoticeHook::from(hook));
        }
        registry
    }

    pub fn register(&mut self, phase: Phase, hook: impl PostHook + 'static) {
        self.hooks.push((phase, Box::new(hook)));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Distinct phases in order of first registration.
    pub fn phases(&self) -> Vec<Phase> {
        let mut out: Vec<Phase> = Vec::new();
        for (phase, _) in &self.hooks {
            if !out.contains(phase) {
                out.push(phase.clone());
            }
        }
        out
    }

    /// Run every hook registered for `phase`.
    pub fn fire(&mut self, phase: &Phase, variables: &Variables) -> HookReport {
        let mut report = HookReport::default();
        let mut index = 0;

        for (hook_phase, hook) in self.hooks.iter_mut() {
            if hook_phase != phase {
                continue;
            }
            let mut ctx = HookContext::new(phase, variables);
            let result = hook.run(&mut ctx);
            report.notices.append(&mut ctx.notices);

            if let Err(error) = result {
                warn!(phase = %phase, index, error = %error, "Post-hook failed");
                report.failures.push(HookFailure {
                    phase: phase.clone(),
                    index,
                    error,
                });
            }
            index += 1;
        }

        debug!(phase = %phase, hooks = index, "Phase fired");
        report
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("phases", &self.phases())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
