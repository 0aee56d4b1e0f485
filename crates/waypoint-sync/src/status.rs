//! Per-collection sync status.

use chrono::{DateTime, Utc};
use serde::Serialize;
use waypoint_core::enums::Collection;
use waypoint_db::DatabaseError;

/// Lifecycle phase of one collection's sync.
///
/// `Idle` until sync starts, `Subscribed` while the worker runs (with or
/// without a push channel), `Refetching` while a refetch is in flight,
/// `Closed` after teardown. Derived at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Subscribed,
    Refetching,
    Closed,
}

/// What happened to one refetch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefetchOutcome {
    /// The result replaced the collection.
    Applied,
    /// Another refetch for the collection was already in flight.
    Suppressed,
    /// The store closed before the result arrived.
    Discarded,
    /// The query failed; recorded on the status.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStatus {
    pub collection: Collection,
    pub phase: SyncPhase,
    /// A push subscription is currently open.
    pub push: bool,
    /// Most recent background failure. Kept until dismissed.
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    /// Failed refetches since the last successful one. Drives poll backoff.
    pub consecutive_failures: u32,
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Refetch results applied so far.
    pub replacements: u64,
    /// Malformed rows dropped across all refetches.
    pub dropped_rows: u64,
    /// Optimistic writes not yet confirmed by a refetch.
    pub pending_writes: usize,
}

impl CollectionStatus {
    #[must_use]
    pub const fn new(collection: Collection) -> Self {
        Self {
            collection,
            phase: SyncPhase::Idle,
            push: false,
            last_error: None,
            last_error_at: None,
            consecutive_failures: 0,
            last_synced_at: None,
            replacements: 0,
            dropped_rows: 0,
            pending_writes: 0,
        }
    }

    /// No failure since the last successful refetch.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.consecutive_failures == 0
    }

    pub(crate) fn record_failure(&mut self, error: &DatabaseError, at: DateTime<Utc>) {
        self.last_error = Some(error.to_string());
        self.last_error_at = Some(at);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub(crate) fn record_success(&mut self, at: DateTime<Utc>, dropped: usize) {
        self.consecutive_failures = 0;
        self.last_synced_at = Some(at);
        self.replacements += 1;
        self.dropped_rows += dropped as u64;
    }

    pub(crate) fn dismiss_error(&mut self) {
        self.last_error = None;
        self.last_error_at = None;
    }
}
