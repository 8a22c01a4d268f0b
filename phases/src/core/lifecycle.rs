//! Dependency integrity check guarding phase removal.

use crate::core::registry::PhaseRegistry;
use crate::core::types::{Dependent, PhaseId};

/// Every `(phase, goal)` pair whose dependency list names `target`.
///
/// Sorted by phase name, then by position in the phase's list. Goals inside
/// `target` itself count too.
pub fn find_dependents(registry: &PhaseRegistry, target: PhaseId) -> Vec<Dependent> {
    let mut dependents = Vec::new();
    for (phase, goals) in registry.all() {
        for goal in goals {
            if goal.dependencies().contains(&target) {
                dependents.push(Dependent {
                    phase: phase.name().to_string(),
                    goal: goal.name().to_string(),
                });
            }
        }
    }
    dependents
}
