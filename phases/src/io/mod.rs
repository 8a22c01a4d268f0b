//! I/O helpers: build files, child processes, and Java discovery.

pub mod config;
pub mod distribution;
pub mod process;
