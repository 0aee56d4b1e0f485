//! Capped exponential backoff for polling after transport errors.
//!
//! A healthy collection is polled at the fixed interval. After `n`
//! consecutive transport failures the next poll waits
//! `min(interval * 2^n, max_delay)`, so a dead backend is not hammered and a
//! recovered one is picked up within `max_delay`.

use std::time::Duration;

use waypoint_config::SyncConfig;

/// Poll delay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay between polls while healthy.
    pub base_delay: Duration,
    /// Maximum delay between polls (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_sync(&SyncConfig::default())
    }
}

impl RetryConfig {
    #[must_use]
    pub fn from_sync(config: &SyncConfig) -> Self {
        Self {
            base_delay: config.poll_interval(),
            max_delay: config.backoff_max().max(config.poll_interval()),
        }
    }

    /// Delay before the next poll given the current failure streak.
    #[must_use]
    pub fn delay_for(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return self.base_delay;
        }
        let factor = 1u32.checked_shl(consecutive_failures.min(31)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |d| d.min(self.max_delay))
            .max(self.base_delay)
    }
}

/// Detect transient libSQL errors (lock contention, dropped remote streams).
///
/// The predicate is intentionally narrow to avoid retrying genuine SQL or
/// constraint errors.
pub fn is_transient_libsql_error(e: &libsql::Error) -> bool {
    let msg = e.to_string();
    msg.contains("database is locked")
        || msg.contains("unable to acquire shared lock")
        || msg.contains("stream closed")
        || msg.contains("connection reset")
}
