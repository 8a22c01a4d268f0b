//! Dependency closure walk that builds an execution plan.
//!
//! Each goal of each requested phase is set up after every goal of the phases
//! it depends on, transitively. A goal reachable through several paths is set
//! up once.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::core::goal::{ParserContext, goal_key};
use crate::core::registry::PhaseRegistry;
use crate::core::types::{ExecutionPlan, PhaseId, PlannedGoal};
use crate::error::PhaseError;

/// Walk `roots` in order, invoking each reachable goal's `setup_parser` hook
/// dependencies-first, and return the goals in invocation order.
///
/// A dependency cycle fails with [`PhaseError::CyclicDependency`] before the
/// goals on the cycle are set up.
#[instrument(skip_all, fields(roots = roots.len()))]
pub fn setup_execution_plan(
    registry: &PhaseRegistry,
    roots: &[PhaseId],
    parser: &mut ParserContext,
) -> Result<ExecutionPlan, PhaseError> {
    let mut walk = Walk {
        registry,
        parser,
        visited: HashSet::new(),
        stack: Vec::new(),
        plan: ExecutionPlan::default(),
    };
    for root in roots {
        walk.visit_phase(*root)?;
    }
    debug!(goals = walk.plan.len(), "execution plan ready");
    Ok(walk.plan)
}

struct Walk<'r, 'p> {
    registry: &'r PhaseRegistry,
    parser: &'p mut ParserContext,
    visited: HashSet<*const ()>,
    /// Goals whose dependencies are still being walked, with their labels.
    stack: Vec<(*const (), String)>,
    plan: ExecutionPlan,
}

impl Walk<'_, '_> {
    fn visit_phase(&mut self, id: PhaseId) -> Result<(), PhaseError> {
        let registry = self.registry;
        let Some(phase) = registry.phase(id) else {
            return Ok(());
        };

        for goal in registry.goals(id) {
            let key = goal_key(goal);
            let label = format!("{}:{}", phase.name(), goal.name());

            if let Some(start) = self.stack.iter().position(|(k, _)| *k == key) {
                let mut cycle: Vec<String> = self.stack[start..]
                    .iter()
                    .map(|(_, label)| label.clone())
                    .collect();
                cycle.push(label);
                return Err(PhaseError::CyclicDependency { cycle });
            }
            if !self.visited.insert(key) {
                continue;
            }

            self.stack.push((key, label));
            for dependency in goal.dependencies() {
                self.visit_phase(*dependency)?;
            }
            self.stack.pop();

            debug!(phase = phase.name(), goal = goal.name(), "setting up goal");
            goal.setup_parser(phase, self.parser)
                .map_err(|source| PhaseError::GoalSetup {
                    phase: phase.name().to_string(),
                    goal: goal.name().to_string(),
                    source,
                })?;
            self.plan.steps.push(PlannedGoal {
                phase: id,
                phase_name: phase.name().to_string(),
                goal: goal.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Placement;
    use crate::test_support::{StubGoal, stub_with_deps};

    #[test]
    fn chain_is_set_up_dependencies_first_once_each() {
        let mut registry = PhaseRegistry::new();
        let a = registry.resolve("a");
        let b = registry.resolve("b");
        let c = registry.resolve("c");
        let goal_c = StubGoal::new("gc").into_shared();
        let goal_b = StubGoal::new("gb").with_deps(&[c]).into_shared();
        let goal_a = StubGoal::new("ga").with_deps(&[b]).into_shared();
        registry.install(c, goal_c.clone(), Placement::Append).expect("install c");
        registry.install(b, goal_b.clone(), Placement::Append).expect("install b");
        registry.install(a, goal_a.clone(), Placement::Append).expect("install a");

        let mut parser = ParserContext::default();
        let plan = setup_execution_plan(&registry, &[a, b], &mut parser).expect("plan");

        assert_eq!(plan.labels(), vec!["c:gc", "b:gb", "a:ga"]);
        assert_eq!(goal_a.setup_calls(), 1);
        assert_eq!(goal_b.setup_calls(), 1);
        assert_eq!(goal_c.setup_calls(), 1);
    }

    #[test]
    fn diamond_sets_up_shared_dependency_once() {
        let mut registry = PhaseRegistry::new();
        let a = registry.resolve("a");
        let b = registry.resolve("b");
        let c = registry.resolve("c");
        let goal_c = StubGoal::new("gc").into_shared();
        registry.install(c, goal_c.clone(), Placement::Append).expect("install c");
        registry
            .install(b, stub_with_deps("gb", &[c]), Placement::Append)
            .expect("install b");
        registry
            .install(a, stub_with_deps("ga", &[c]), Placement::Append)
            .expect("install a");

        let mut parser = ParserContext::default();
        let plan = setup_execution_plan(&registry, &[a, b], &mut parser).expect("plan");

        assert_eq!(plan.labels(), vec!["c:gc", "a:ga", "b:gb"]);
        assert_eq!(goal_c.setup_calls(), 1);
    }

    #[test]
    fn siblings_follow_stored_order() {
        let mut registry = PhaseRegistry::new();
        let build = registry.resolve("build");
        registry
            .install(build, stub_with_deps("second", &[]), Placement::Append)
            .expect("install");
        registry
            .install(build, stub_with_deps("first", &[]), Placement::First)
            .expect("install");

        let mut parser = ParserContext::default();
        let plan = setup_execution_plan(&registry, &[build], &mut parser).expect("plan");
        assert_eq!(plan.labels(), vec!["build:first", "build:second"]);
    }

    #[test]
    fn cycle_is_reported_instead_of_recursing() {
        let mut registry = PhaseRegistry::new();
        let a = registry.resolve("a");
        let b = registry.resolve("b");
        let goal_a = StubGoal::new("ga").with_deps(&[b]).into_shared();
        registry.install(a, goal_a.clone(), Placement::Append).expect("install a");
        registry
            .install(b, stub_with_deps("gb", &[a]), Placement::Append)
            .expect("install b");

        let mut parser = ParserContext::default();
        let err = setup_execution_plan(&registry, &[a], &mut parser).unwrap_err();
        assert_eq!(err.to_string(), "cyclic dependency: a:ga -> b:gb -> a:ga");
        assert_eq!(goal_a.setup_calls(), 0);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut registry = PhaseRegistry::new();
        let a = registry.resolve("a");
        registry
            .install(a, stub_with_deps("ga", &[a]), Placement::Append)
            .expect("install");

        let mut parser = ParserContext::default();
        let err = setup_execution_plan(&registry, &[a], &mut parser).unwrap_err();
        assert!(matches!(err, PhaseError::CyclicDependency { .. }));
    }

    #[test]
    fn hook_failure_aborts_the_walk() {
        let mut registry = PhaseRegistry::new();
        let a = registry.resolve("a");
        registry
            .install(a, StubGoal::new("broken").failing().into_ref(), Placement::Append)
            .expect("install");

        let mut parser = ParserContext::default();
        let err = setup_execution_plan(&registry, &[a], &mut parser).unwrap_err();
        assert!(matches!(err, PhaseError::GoalSetup { .. }));
        assert!(err.to_string().starts_with("setup of goal a:broken failed"));
    }

    #[test]
    fn hooks_register_options_through_the_shared_context() {
        let mut registry = PhaseRegistry::new();
        let compile = registry.resolve("compile");
        registry
            .install(
                compile,
                StubGoal::new("javac").with_option("--javac-args").into_ref(),
                Placement::Append,
            )
            .expect("install");

        let mut parser = ParserContext::new(vec!["--javac-args=-g".to_string()]);
        setup_execution_plan(&registry, &[compile], &mut parser).expect("plan");
        assert_eq!(parser.options().len(), 1);
        assert_eq!(parser.options()[0].goal, "javac");
        assert!(parser.is_set("--javac-args"));
    }

    #[test]
    fn dependency_on_uninstalled_phase_contributes_nothing() {
        let mut registry = PhaseRegistry::new();
        let gone = registry.resolve("gone");
        let a = registry.resolve("a");
        registry.uninstall(gone).expect("uninstall");
        registry
            .install(a, stub_with_deps("ga", &[gone]), Placement::Append)
            .expect("install");

        let mut parser = ParserContext::default();
        let plan = setup_execution_plan(&registry, &[a], &mut parser).expect("plan");
        assert_eq!(plan.labels(), vec!["a:ga"]);
    }
}
