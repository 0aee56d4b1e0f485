//! Remote sync scheduling configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_poll_interval_ms() -> u64 {
    4_000
}

const fn default_page_size() -> u32 {
    100
}

const fn default_backoff_max_ms() -> u64 {
    60_000
}

const fn default_max_reassertions() -> u32 {
    5
}

const fn default_recent_window_hours() -> u32 {
    24
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Fixed poll interval while subscribed, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Rows fetched per refetch (most recently updated first).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound on the poll delay after repeated transport failures.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// How many refetches an acknowledged optimistic write is re-asserted
    /// over before it is dropped as unobservable.
    #[serde(default = "default_max_reassertions")]
    pub max_reassertions: u32,

    /// Default window for the recently-completed task view.
    #[serde(default = "default_recent_window_hours")]
    pub recent_window_hours: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            page_size: default_page_size(),
            backoff_max_ms: default_backoff_max_ms(),
            max_reassertions: default_max_reassertions(),
            recent_window_hours: default_recent_window_hours(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}
