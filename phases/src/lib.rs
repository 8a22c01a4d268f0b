//! Phase and goal registry for a build tool.
//!
//! Phases are named stages that hold ordered lists of goals. Goals declare
//! which phases they depend on, and an execution plan sets every goal up
//! after the goals it depends on. The crate is split the same way throughout:
//!
//! - **[`core`]**: Pure, deterministic logic (identity registry, goal-list
//!   placement, dependency closure, removal guard). No I/O.
//! - **[`io`]**: Side-effecting operations (build files, child processes,
//!   Java distribution discovery).
//!
//! [`session`] coordinates the two to implement the CLI commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use crate::core::goal::{Goal, GoalRef, ParserContext};
pub use crate::core::registry::PhaseRegistry;
pub use crate::core::types::{InstallOptions, Phase, PhaseId, Placement};
pub use crate::error::PhaseError;
