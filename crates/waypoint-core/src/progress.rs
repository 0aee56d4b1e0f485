//! Progress estimation for tasks that do not report fine-grained progress.
//!
//! | status        | percent                                                   |
//! |---------------|-----------------------------------------------------------|
//! | `pending`     | 0                                                         |
//! | `completed`   | 100                                                       |
//! | `failed`      | 100                                                       |
//! | `in-progress` | reported value, or `floor(elapsed / assumed * 100)`, both capped at the ceiling |
//!
//! The ceiling (95 by default) keeps the estimator from ever claiming
//! completion; only a terminal status reaches 100. A reported progress of `0`
//! carries no information and falls through to the elapsed-time heuristic.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::entities::Task;
use crate::enums::TaskStatus;

/// Assumed duration of a task that reports no progress.
pub const DEFAULT_ASSUMED_DURATION: Duration = Duration::from_secs(5 * 60);

/// Highest percent an in-progress task can show.
pub const DEFAULT_CEILING: u8 = 95;

const MS_PER_MINUTE: u128 = 60_000;

/// Result of estimating one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimate {
    pub percent: u8,
    /// Present only while the task is in progress.
    pub remaining_minutes: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEstimator {
    assumed_duration: Duration,
    ceiling: u8,
}

impl Default for ProgressEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_ASSUMED_DURATION, DEFAULT_CEILING)
    }
}

impl ProgressEstimator {
    /// Create an estimator. The ceiling is capped at 99 so an in-progress
    /// task can never display 100.
    #[must_use]
    pub fn new(assumed_duration: Duration, ceiling: u8) -> Self {
        Self {
            assumed_duration,
            ceiling: ceiling.min(99),
        }
    }

    #[must_use]
    pub const fn assumed_duration(&self) -> Duration {
        self.assumed_duration
    }

    #[must_use]
    pub const fn ceiling(&self) -> u8 {
        self.ceiling
    }

    /// Estimate progress from the raw inputs.
    #[must_use]
    pub fn estimate(
        &self,
        status: TaskStatus,
        reported: Option<u8>,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Estimate {
        match status {
            TaskStatus::Pending => Estimate {
                percent: 0,
                remaining_minutes: None,
            },
            TaskStatus::Completed | TaskStatus::Failed => Estimate {
                percent: 100,
                remaining_minutes: None,
            },
            TaskStatus::InProgress => {
                let percent = match reported {
                    Some(value) if value > 0 => value.min(self.ceiling),
                    _ => self.heuristic_percent(created_at, now),
                };
                Estimate {
                    percent,
                    remaining_minutes: Some(self.remaining_minutes(percent)),
                }
            }
        }
    }

    /// Estimate a task as of `now`.
    #[must_use]
    pub fn estimate_task(&self, task: &Task, now: DateTime<Utc>) -> Estimate {
        self.estimate(task.status, task.reported_progress, task.created_at, now)
    }

    fn heuristic_percent(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> u8 {
        let assumed_ms = self.assumed_duration.as_millis();
        if assumed_ms == 0 {
            return self.ceiling;
        }
        // Clock skew can put `created_at` in the future; treat that as no time elapsed.
        let elapsed_ms = u128::try_from((now - created_at).num_milliseconds()).unwrap_or(0);
        let percent = elapsed_ms.saturating_mul(100) / assumed_ms;
        u8::try_from(percent.min(u128::from(self.ceiling))).unwrap_or(self.ceiling)
    }

    /// Minutes left for an in-progress task showing `percent`, rounded up.
    #[must_use]
    pub fn remaining_minutes(&self, percent: u8) -> u32 {
        let left = u128::from(100 - percent.min(100));
        let numerator = left * self.assumed_duration.as_millis();
        let denominator = 100 * MS_PER_MINUTE;
        u32::try_from(numerator.div_ceil(denominator)).unwrap_or(u32::MAX)
    }
}
