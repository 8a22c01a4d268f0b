//! Shared deterministic types for the phase registry.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;

use serde::Serialize;

use crate::core::goal::GoalRef;
use crate::error::PhaseError;

/// Identity handle for a registered phase.
///
/// Ids are never reused: a phase re-created after `uninstall` gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhaseId(pub(crate) u64);

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase#{}", self.0)
    }
}

/// A named stage of a build pipeline.
///
/// `name` changes only through `PhaseRegistry::rename`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub(crate) id: PhaseId,
    pub(crate) name: String,
    pub description: Option<String>,
}

impl Phase {
    pub fn id(&self) -> PhaseId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Where an installed goal lands in a phase's ordered goal list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Placement {
    /// Append to the end of the list.
    #[default]
    Append,
    /// Insert at index 0.
    First,
    /// Clear the list; the goal becomes its sole element.
    Replace,
    /// Insert before the first goal with this name, or append if absent.
    Before(String),
    /// Insert after the first goal with this name, or append if absent.
    After(String),
}

/// Flag-style placement request, as written in build files.
///
/// At most one modifier may be set; [`InstallOptions::placement`] enforces it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    pub first: bool,
    pub replace: bool,
    pub before: Option<String>,
    pub after: Option<String>,
}

impl InstallOptions {
    /// Validate the modifiers and collapse them into a single [`Placement`].
    pub fn placement(&self) -> Result<Placement, PhaseError> {
        let mut given = Vec::new();
        if self.first {
            given.push("first".to_string());
        }
        if self.replace {
            given.push("replace".to_string());
        }
        if let Some(name) = &self.before {
            given.push(format!("before={name}"));
        }
        if let Some(name) = &self.after {
            given.push(format!("after={name}"));
        }
        if given.len() > 1 {
            return Err(PhaseError::Configuration {
                given: given.join(", "),
            });
        }

        if self.first {
            Ok(Placement::First)
        } else if self.replace {
            Ok(Placement::Replace)
        } else if let Some(name) = &self.before {
            Ok(Placement::Before(name.clone()))
        } else if let Some(name) = &self.after {
            Ok(Placement::After(name.clone()))
        } else {
            Ok(Placement::Append)
        }
    }
}

/// A goal that depends on a phase, reported by the removal guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependent {
    /// Name of the phase whose list holds the goal.
    pub phase: String,
    /// Name of the dependent goal.
    pub goal: String,
}

/// One step of an execution plan: a goal and the phase it was reached through.
#[derive(Debug, Clone)]
pub struct PlannedGoal {
    pub phase: PhaseId,
    pub phase_name: String,
    pub goal: GoalRef,
}

/// Goals in hook-invocation order, dependencies first.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub steps: Vec<PlannedGoal>,
}

impl ExecutionPlan {
    /// `phase:goal` labels in plan order.
    pub fn labels(&self) -> Vec<String> {
        self.steps
            .iter()
            .map(|step| format!("{}:{}", step.phase_name, step.goal.name()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_modifiers_means_append() {
        let placement = InstallOptions::default().placement().expect("placement");
        assert_eq!(placement, Placement::Append);
    }

    #[test]
    fn single_modifier_maps_to_placement() {
        let opts = InstallOptions {
            after: Some("compile".to_string()),
            ..InstallOptions::default()
        };
        assert_eq!(
            opts.placement().expect("placement"),
            Placement::After("compile".to_string())
        );
    }

    #[test]
    fn conflicting_modifiers_are_rejected() {
        let opts = InstallOptions {
            first: true,
            after: Some("x".to_string()),
            ..InstallOptions::default()
        };
        let err = opts.placement().unwrap_err();
        assert!(matches!(err, PhaseError::Configuration { .. }));
        assert!(err.to_string().contains("first, after=x"));
    }

    #[test]
    fn three_modifiers_are_rejected() {
        let opts = InstallOptions {
            first: true,
            replace: true,
            before: Some("x".to_string()),
            after: None,
        };
        assert!(opts.placement().is_err());
    }
}
