//! # waypoint-core
//!
//! Core types for the Waypoint progress tracker.
//!
//! This crate provides the foundational types shared across all Waypoint crates:
//! - Entity structs for tasks, build requests, and debug logs
//! - Canonical status enums with state machine transitions
//! - The status normalizer that folds upstream vocabularies into `TaskStatus`
//! - The progress estimator for tasks that do not report their own progress
//! - Tolerant parsing of remote rows into entities
//! - ID prefix constants and generation
//! - Cross-cutting error types

pub mod entities;
pub mod enums;
pub mod errors;
pub mod ids;
pub mod normalize;
pub mod progress;
pub mod rows;
