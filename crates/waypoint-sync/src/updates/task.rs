//! Task update builder.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use waypoint_core::entities::Task;
use waypoint_core::enums::TaskStatus;
use waypoint_core::progress::ProgressEstimator;
use waypoint_core::rows::Row;

use crate::error::SyncError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Self-reported progress, 0–100.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl TaskUpdate {
    /// Reject an update before it reaches the table or the network.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Validation` for an empty update, progress above
    /// 100, or a blank title.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.status.is_none()
            && self.progress.is_none()
            && self.title.is_none()
            && self.description.is_none()
        {
            return Err(SyncError::Validation("task update changes nothing".into()));
        }
        if let Some(progress) = self.progress
            && progress > 100
        {
            return Err(SyncError::Validation(format!(
                "progress must be 0-100, got {progress}"
            )));
        }
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(SyncError::Validation("task title must not be empty".into()));
        }
        Ok(())
    }

    /// The task as it looks after this update at `now`.
    ///
    /// Progress is re-estimated; a task that stays in progress never shows
    /// less than it did before.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::InvalidTransition` if the update leaves a terminal
    /// status.
    pub fn apply_to(
        &self,
        current: &Task,
        estimator: &ProgressEstimator,
        now: DateTime<Utc>,
    ) -> Result<Task, SyncError> {
        let status = self.status.unwrap_or(current.status);
        if !current.status.can_transition_to(status) {
            return Err(SyncError::InvalidTransition {
                id: current.id.clone(),
                from: current.status,
                to: status,
            });
        }

        let mut next = current.clone();
        next.status = status;
        if let Some(progress) = self.progress {
            next.reported_progress = Some(progress);
        }
        if let Some(title) = &self.title {
            next.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            next.description = description.clone();
        }
        next.updated_at = now.max(current.created_at);

        let estimate = estimator.estimate_task(&next, now);
        let percent = if current.status == TaskStatus::InProgress && status == TaskStatus::InProgress
        {
            estimate.percent.max(current.progress)
        } else {
            estimate.percent
        };
        next.progress = percent;
        next.estimated_remaining_minutes =
            (status == TaskStatus::InProgress).then(|| estimator.remaining_minutes(percent));
        Ok(next)
    }

    /// Patch row sent to the remote store, stamped with `updated_at`.
    #[must_use]
    pub fn to_patch(&self, updated_at: DateTime<Utc>) -> Row {
        let mut patch = Row::new();
        if let Some(status) = self.status {
            patch.insert("status".into(), json!(status.as_str()));
        }
        if let Some(progress) = self.progress {
            patch.insert("progress".into(), json!(progress));
        }
        if let Some(title) = &self.title {
            patch.insert("title".into(), json!(title.trim()));
        }
        if let Some(description) = &self.description {
            patch.insert(
                "description".into(),
                description.as_ref().map_or(Value::Null, |d| json!(d)),
            );
        }
        patch.insert("updated_at".into(), json!(updated_at.to_rfc3339()));
        patch
    }
}

pub struct TaskUpdateBuilder(TaskUpdate);

impl TaskUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(TaskUpdate::default())
    }

    #[must_use]
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.0.status = Some(status);
        self
    }

    #[must_use]
    pub fn progress(mut self, progress: u8) -> Self {
        self.0.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.0.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.0.description = Some(description);
        self
    }

    #[must_use]
    pub fn build(self) -> TaskUpdate {
        self.0
    }
}

impl Default for TaskUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
