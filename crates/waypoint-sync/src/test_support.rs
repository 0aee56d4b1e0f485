//! Shared test utilities for waypoint-sync unit tests.

#[cfg(test)]
pub(crate) mod helpers {
    use chrono::{DateTime, Utc};
    use waypoint_db::DocumentStore;

    use crate::TaskStore;
    use crate::clock::ManualClock;

    pub fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    /// Install a test-writer subscriber filtered by `WAYPOINT_LOG` (default `warn`).
    pub fn init_tracing() {
        let filter = tracing_subscriber::EnvFilter::try_from_env("WAYPOINT_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }

    /// Unstarted store over an empty document store, with no cache and a
    /// manual clock at [`t0`].
    pub fn test_store() -> (TaskStore<DocumentStore>, DocumentStore, ManualClock) {
        init_tracing();
        let remote = DocumentStore::new();
        let clock = ManualClock::new(t0());
        let store = TaskStore::builder(remote.clone())
            .clock(clock.clone())
            .build();
        (store, remote, clock)
    }
}
