//! The goal capability consumed by the registry.
//!
//! A goal's build action is opaque here. The registry only needs its name,
//! the phases it depends on, the serialize hint, and a hook that registers
//! command-line options before anything runs.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::core::types::{Phase, PhaseId};
use crate::error::PhaseError;

/// A named unit of work installed into a phase.
pub trait Goal: fmt::Debug {
    fn name(&self) -> &str;

    /// Phases whose goals must be set up before this one.
    fn dependencies(&self) -> &[PhaseId];

    /// True if this goal must not run in parallel with others.
    fn serialize(&self) -> bool {
        false
    }

    /// Register this goal's options. Called at most once per execution plan.
    fn setup_parser(&self, phase: &Phase, parser: &mut ParserContext) -> anyhow::Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to an installed goal. Identity is the allocation, not the name.
pub type GoalRef = Rc<dyn Goal>;

/// Identity key for a goal handle.
pub(crate) fn goal_key(goal: &GoalRef) -> *const () {
    Rc::as_ptr(goal) as *const ()
}

/// A command-line option registered by a goal during parser setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalOption {
    pub phase: String,
    pub goal: String,
    pub flag: String,
    pub help: String,
}

/// Context passed through to every goal's `setup_parser` hook.
#[derive(Debug, Clone, Default)]
pub struct ParserContext {
    args: Vec<String>,
    options: Vec<GoalOption>,
}

impl ParserContext {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            options: Vec::new(),
        }
    }

    /// Raw arguments the build was invoked with.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Options in registration order.
    pub fn options(&self) -> &[GoalOption] {
        &self.options
    }

    /// Register `flag` on behalf of `goal`. Flags are global across goals.
    pub fn add_option(
        &mut self,
        phase: &Phase,
        goal: &str,
        flag: &str,
        help: &str,
    ) -> Result<(), PhaseError> {
        if let Some(existing) = self.options.iter().find(|opt| opt.flag == flag) {
            return Err(PhaseError::OptionConflict {
                flag: flag.to_string(),
                goal: format!("{}:{}", phase.name(), goal),
                existing: format!("{}:{}", existing.phase, existing.goal),
            });
        }
        self.options.push(GoalOption {
            phase: phase.name().to_string(),
            goal: goal.to_string(),
            flag: flag.to_string(),
            help: help.to_string(),
        });
        Ok(())
    }

    /// True if `flag` appears among the raw arguments.
    pub fn is_set(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| {
            arg == flag
                || arg
                    .strip_prefix(flag)
                    .is_some_and(|rest| rest.starts_with('='))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phase(name: &str) -> Phase {
        Phase {
            id: PhaseId(1),
            name: name.to_string(),
            description: None,
        }
    }

    #[test]
    fn add_option_rejects_duplicate_flags() {
        let mut ctx = ParserContext::default();
        ctx.add_option(&phase("compile"), "javac", "--javac-args", "args")
            .expect("first registration");
        let err = ctx
            .add_option(&phase("test"), "junit", "--javac-args", "args")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "option --javac-args registered by test:junit already registered by compile:javac"
        );
        assert_eq!(ctx.options().len(), 1);
    }

    #[test]
    fn is_set_matches_bare_and_assigned_flags() {
        let ctx = ParserContext::new(vec!["--verbose".to_string(), "--jobs=4".to_string()]);
        assert!(ctx.is_set("--verbose"));
        assert!(ctx.is_set("--jobs"));
        assert!(!ctx.is_set("--job"));
    }
}
