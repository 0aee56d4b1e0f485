//! Partial-update types for store mutations.

pub mod debug_log;
pub mod task;
