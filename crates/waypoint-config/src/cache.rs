//! Local task cache configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Mirror the task list to disk so it survives restarts.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Cache file path. Empty means `<data_dir>/waypoint/tasks.jsonl`.
    #[serde(default)]
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: String::new(),
        }
    }
}

impl CacheConfig {
    /// Resolved cache file, or `None` when disabled or no data directory exists.
    #[must_use]
    pub fn resolved_path(&self) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        if !self.path.is_empty() {
            return Some(PathBuf::from(&self.path));
        }
        dirs::data_dir().map(|p| p.join("waypoint").join("tasks.jsonl"))
    }
}
