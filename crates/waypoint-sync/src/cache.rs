//! Durable JSONL mirror of the task list.
//!
//! One task per line at the configured path. The mirror only exists to
//! survive restarts: the first successful refetch replaces whatever it held.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use waypoint_config::CacheConfig;
use waypoint_core::entities::Task;
use waypoint_core::enums::TaskStatus;

use crate::error::SyncError;

/// Id of the placeholder task returned when the cache cannot be read.
pub const SEED_TASK_ID: &str = "tsk-00000000";

#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Cache at the configured location, or `None` when caching is disabled.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.resolved_path().map(Self::new)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the mirror with `tasks`.
    ///
    /// Writes a sibling temp file and renames it over the mirror, so a crash
    /// mid-write leaves the previous contents intact.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Cache` if the file cannot be written.
    pub fn save(&self, tasks: &[Task]) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::Cache(e.to_string()))?;
        }
        let tmp = self.path.with_extension("jsonl.tmp");
        serde_jsonlines::write_json_lines(&tmp, tasks)
            .map_err(|e| SyncError::Cache(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| SyncError::Cache(format!("rename {}: {e}", self.path.display())))?;
        Ok(())
    }

    /// Read the mirror. A missing or unreadable file yields a single
    /// placeholder task.
    #[must_use]
    pub fn load(&self) -> Vec<Task> {
        match self.read() {
            Ok(tasks) => tasks,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no task cache yet, using seed task");
                vec![seed_task()]
            }
            Err(error) => {
                tracing::warn!(path = %self.path.display(), %error, "task cache unreadable, using seed task");
                vec![seed_task()]
            }
        }
    }

    /// Delete the mirror. Deleting a missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Cache` if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), SyncError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Cache(format!("remove {}: {e}", self.path.display()))),
        }
    }

    fn read(&self) -> std::io::Result<Vec<Task>> {
        serde_jsonlines::json_lines(&self.path)?.collect()
    }
}

fn seed_task() -> Task {
    let now = Utc::now();
    Task {
        id: SEED_TASK_ID.to_string(),
        title: "Welcome to Waypoint".to_string(),
        description: Some("Tasks you create show up here.".to_string()),
        status: TaskStatus::Pending,
        progress: 0,
        reported_progress: None,
        created_at: now,
        updated_at: now,
        estimated_remaining_minutes: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn sample(id: &str) -> Task {
        Task {
            id: id.into(),
            title: format!("task {id}"),
            ..seed_task()
        }
    }

    #[test]
    fn save_then_load_returns_same_tasks() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("nested/tasks.jsonl"));
        let tasks = vec![sample("tsk-1"), sample("tsk-2")];

        cache.save(&tasks).unwrap();
        assert_eq!(cache.load(), tasks);
    }

    #[test]
    fn missing_file_loads_seed_task() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("tasks.jsonl"));

        let loaded = cache.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, SEED_TASK_ID);
        assert!(!cache.path().exists());
    }

    #[test]
    fn empty_file_loads_no_tasks() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("tasks.jsonl"));
        cache.save(&[]).unwrap();
        assert!(cache.load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_seed_task() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.jsonl");
        std::fs::write(&path, "{not json}\n").unwrap();

        let loaded = LocalCache::new(&path).load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, SEED_TASK_ID);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = LocalCache::new(dir.path().join("tasks.jsonl"));
        cache.save(&[sample("tsk-1")]).unwrap();
        cache.clear().unwrap();
        cache.clear().unwrap();
        assert!(!cache.path().exists());
    }
}
