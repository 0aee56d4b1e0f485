//! Error types for the task store and its sync coordinator.

use thiserror::Error;
use waypoint_core::enums::{Collection, TaskStatus};
use waypoint_core::errors::CoreError;
use waypoint_db::DatabaseError;

/// Errors surfaced by `TaskStore` operations.
///
/// Background sync failures are never returned through this type; they are
/// recorded on the collection's status instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Input rejected before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{collection} entry not found: {id}")]
    NotFound { collection: Collection, id: String },

    /// A task update tried to leave a terminal status.
    #[error("Invalid task transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// The backend refused the write; the optimistic change was rolled back.
    #[error("Remote write to {collection} failed: {source}")]
    RemoteWrite {
        collection: Collection,
        #[source]
        source: DatabaseError,
    },

    /// The backend was unreachable during a write; the optimistic change was
    /// rolled back.
    #[error("Connection failed while writing {collection}: {source}")]
    Connection {
        collection: Collection,
        #[source]
        source: DatabaseError,
    },

    /// The store has been closed.
    #[error("Task store is closed")]
    Closed,

    #[error("Local cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Classify a failed remote write.
    pub(crate) fn from_write(collection: Collection, source: DatabaseError) -> Self {
        if source.is_transport() {
            Self::Connection { collection, source }
        } else {
            Self::RemoteWrite { collection, source }
        }
    }

    pub(crate) fn not_found(collection: Collection, id: &str) -> Self {
        Self::NotFound {
            collection,
            id: id.to_string(),
        }
    }
}
