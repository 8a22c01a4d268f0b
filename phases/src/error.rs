//! Error types for phase registry operations.

use thiserror::Error;

use crate::core::types::Dependent;

/// Errors raised while registering, mutating, or planning phases.
///
/// All variants are raised before any goal executes; none are transient.
#[derive(Debug, Error)]
pub enum PhaseError {
    /// More than one placement modifier was given to an install.
    #[error("can only specify one of first, replace, before or after (got {given})")]
    Configuration { given: String },

    /// `remove` named a goal that is not in the phase's list.
    #[error("goal {goal} does not exist in phase {phase}, members are: [{}]", .members.join(", "))]
    GoalNotFound {
        phase: String,
        goal: String,
        members: Vec<String>,
    },

    /// `uninstall` was blocked by goals that still depend on the phase.
    #[error("{phase} is depended on by {}", format_dependents(.dependents))]
    UnsatisfiedDependency {
        phase: String,
        dependents: Vec<Dependent>,
    },

    /// The phase handle no longer refers to a registered phase.
    #[error("phase {0} is not registered")]
    UnknownPhase(String),

    /// A rename target is already held by a different phase.
    #[error("cannot rename {from} to {to}: {to} is already registered")]
    NameTaken { from: String, to: String },

    /// The dependency closure revisited a goal that was still being set up.
    #[error("cyclic dependency: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// Two goals registered the same command-line flag.
    #[error("option {flag} registered by {goal} already registered by {existing}")]
    OptionConflict {
        flag: String,
        goal: String,
        existing: String,
    },

    /// A goal's parser setup hook failed.
    #[error("setup of goal {phase}:{goal} failed: {source}")]
    GoalSetup {
        phase: String,
        goal: String,
        #[source]
        source: anyhow::Error,
    },
}

fn format_dependents(dependents: &[Dependent]) -> String {
    dependents
        .iter()
        .map(|dep| format!("{}:{}", dep.phase, dep.goal))
        .collect::<Vec<_>>()
        .join(", ")
}
