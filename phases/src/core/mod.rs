//! Deterministic, pure logic for the phase registry.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod closure;
pub mod goal;
pub mod lifecycle;
pub mod placement;
pub mod registry;
pub mod revision;
pub mod types;
