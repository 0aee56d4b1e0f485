//! Cross-cutting error types for Waypoint.
//!
//! Domain-specific errors (`DatabaseError`, `SyncError`) are defined in their
//! respective crates and convert from `CoreError` where they need to.

use thiserror::Error;

/// Errors that can be raised by any Waypoint crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        from: String,
        to: String,
    },

    /// Input failed validation before reaching any backend.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A remote row does not match the tolerant schema for its collection.
    #[error("Unparseable {collection} row: {reason}")]
    Parse { collection: String, reason: String },

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    pub(crate) fn parse(collection: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            collection: collection.into(),
            reason: reason.into(),
        }
    }
}
