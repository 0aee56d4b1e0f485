//! Task operations and views.

use chrono::{DateTime, TimeDelta, Utc};
use waypoint_core::entities::{NewTask, Task};
use waypoint_core::enums::{Collection, TaskStatus};
use waypoint_core::ids::{PREFIX_TASK, generate_id};
use waypoint_core::progress::ProgressEstimator;
use waypoint_core::rows::task_to_row;
use waypoint_db::PersistenceAdapter;

use crate::error::SyncError;
use crate::store::TaskStore;
use crate::updates::task::TaskUpdate;

const COLLECTION: Collection = Collection::Tasks;

/// A task as displayed at `now`: in-progress estimates move forward with the
/// clock, never backward.
fn present(task: &Task, estimator: &ProgressEstimator, now: DateTime<Utc>) -> Task {
    if task.status != TaskStatus::InProgress {
        return task.clone();
    }
    let percent = estimator.estimate_task(task, now).percent.max(task.progress);
    Task {
        progress: percent,
        estimated_remaining_minutes: Some(estimator.remaining_minutes(percent)),
        ..task.clone()
    }
}

impl<A: PersistenceAdapter> TaskStore<A> {
    /// Create a pending task and return its id.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` for a blank title, or the remote write
    /// error after rolling the task back out of the table.
    pub async fn create_task(&self, new: NewTask) -> Result<String, SyncError> {
        self.ensure_open()?;
        let title = new.title.trim();
        if title.is_empty() {
            return Err(SyncError::Validation("task title must not be empty".into()));
        }

        let now = self.shared.now();
        let task = Task {
            id: generate_id(PREFIX_TASK)?,
            title: title.to_string(),
            description: new
                .description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            status: TaskStatus::Pending,
            progress: 0,
            reported_progress: None,
            created_at: now,
            updated_at: now,
            estimated_remaining_minutes: None,
        };
        let id = task.id.clone();
        let row = task_to_row(&task);
        let seq = self.shared.state.lock().tasks.upsert_local(task);

        self.commit(COLLECTION, seq, async {
            self.shared
                .adapter
                .insert(COLLECTION, row)
                .await
                .map(|_| ())
                .map_err(|e| SyncError::from_write(COLLECTION, e))
        })
        .await?;

        self.record_activity("task.created", &id);
        Ok(id)
    }

    /// Change a task's status, self-reported progress, or text.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` or `SyncError::InvalidTransition`
    /// before any network call, `SyncError::NotFound` for an unknown id, or
    /// the remote write error after rolling the change back.
    pub async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task, SyncError> {
        self.ensure_open()?;
        update.validate()?;

        let now = self.shared.now();
        let (seq, next) = {
            let mut state = self.shared.state.lock();
            let current = state
                .tasks
                .get(id)
                .ok_or_else(|| SyncError::not_found(COLLECTION, id))?;
            let next = update.apply_to(current, &self.shared.estimator, now)?;
            (state.tasks.upsert_local(next.clone()), next)
        };
        let patch = update.to_patch(next.updated_at);

        self.commit(COLLECTION, seq, async {
            match self.shared.adapter.update(COLLECTION, id, patch).await {
                Ok(true) => Ok(()),
                Ok(false) => Err(SyncError::not_found(COLLECTION, id)),
                Err(e) => Err(SyncError::from_write(COLLECTION, e)),
            }
        })
        .await?;

        self.record_activity("task.updated", id);
        Ok(next)
    }

    /// Delete a task.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotFound` for an unknown id, or the remote write
    /// error after restoring the task.
    pub async fn delete_task(&self, id: &str) -> Result<(), SyncError> {
        self.ensure_open()?;
        let seq = self
            .shared
            .state
            .lock()
            .tasks
            .delete_local(id)
            .ok_or_else(|| SyncError::not_found(COLLECTION, id))?;

        self.commit(COLLECTION, seq, async {
            match self.shared.adapter.delete(COLLECTION, id).await {
                Ok(found) => {
                    if !found {
                        tracing::debug!(id, "task already absent remotely");
                    }
                    Ok(())
                }
                Err(e) => Err(SyncError::from_write(COLLECTION, e)),
            }
        })
        .await?;

        self.record_activity("task.deleted", id);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SyncError::NotFound` if no task has this id.
    pub fn get_task(&self, id: &str) -> Result<Task, SyncError> {
        let now = self.shared.now();
        self.shared
            .state
            .lock()
            .tasks
            .get(id)
            .map(|t| present(t, &self.shared.estimator, now))
            .ok_or_else(|| SyncError::not_found(COLLECTION, id))
    }

    /// Every task, newest first.
    #[must_use]
    pub fn list_tasks(&self) -> Vec<Task> {
        self.tasks_where(|_| true)
    }

    /// Pending and in-progress tasks, newest first.
    #[must_use]
    pub fn list_active(&self) -> Vec<Task> {
        self.tasks_where(|t| !t.status.is_terminal())
    }

    /// Tasks completed within the last `window_hours` (default
    /// `sync.recent_window_hours`), most recently finished first.
    #[must_use]
    pub fn list_recently_completed(&self, window_hours: Option<u32>) -> Vec<Task> {
        let hours = window_hours.unwrap_or(self.shared.config.recent_window_hours);
        let cutoff = self.shared.now() - TimeDelta::hours(i64::from(hours));
        let mut tasks =
            self.tasks_where(|t| t.status == TaskStatus::Completed && t.updated_at >= cutoff);
        tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        tasks
    }

    fn tasks_where(&self, keep: impl Fn(&Task) -> bool) -> Vec<Task> {
        let now = self.shared.now();
        let mut tasks: Vec<Task> = self
            .shared
            .state
            .lock()
            .tasks
            .rows()
            .iter()
            .filter(|t| keep(t))
            .map(|t| present(t, &self.shared.estimator, now))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        tasks
    }
}
