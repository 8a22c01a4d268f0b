//! Stable exit codes for `phases` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid build file, unknown phase, or any other setup error.
pub const INVALID: i32 = 1;
/// A dependency cycle or an unsatisfied phase dependency.
pub const DEPENDENCY: i32 = 2;
/// `phases java` found no suitable distribution.
pub const NOT_FOUND: i32 = 3;
