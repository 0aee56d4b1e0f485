//! Database error types for waypoint-db.

use thiserror::Error;

use crate::retry::is_transient_libsql_error;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The backend could not be reached. Transient; retried on the next poll.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The backend refused a write (constraint, permission, validation).
    #[error("Write rejected: {0}")]
    Rejected(String),

    /// A query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DatabaseError {
    /// Whether this is a transport-level failure worth retrying later.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::LibSql(e) => is_transient_libsql_error(e),
            _ => false,
        }
    }
}
