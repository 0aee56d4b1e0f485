//! Progress heuristic configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_assumed_duration_secs() -> u64 {
    300
}

const fn default_ceiling() -> u8 {
    95
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProgressConfig {
    /// Duration assumed for a task that reports no progress, in seconds.
    #[serde(default = "default_assumed_duration_secs")]
    pub assumed_duration_secs: u64,

    /// Highest percent an in-progress task may display.
    #[serde(default = "default_ceiling")]
    pub ceiling: u8,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            assumed_duration_secs: default_assumed_duration_secs(),
            ceiling: default_ceiling(),
        }
    }
}

impl ProgressConfig {
    #[must_use]
    pub const fn assumed_duration(&self) -> Duration {
        Duration::from_secs(self.assumed_duration_secs)
    }
}
