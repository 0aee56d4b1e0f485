//! Upstream status token normalization.
//!
//! Backends report task status in their own vocabulary (`"in_progress"`,
//! `"in-progress"`, `"done"`, `"error"`, ...). `normalize` folds every token
//! into a [`TaskStatus`]. Lookup is case-sensitive over a fixed table and
//! anything unknown or missing degrades to `Pending`, the least-progressed
//! state.

use crate::enums::TaskStatus;

/// Fixed synonym table. Tokens are matched exactly.
pub const SYNONYMS: &[(&str, TaskStatus)] = &[
    ("pending", TaskStatus::Pending),
    ("queued", TaskStatus::Pending),
    ("waiting", TaskStatus::Pending),
    ("open", TaskStatus::Pending),
    ("todo", TaskStatus::Pending),
    ("in_progress", TaskStatus::InProgress),
    ("in-progress", TaskStatus::InProgress),
    ("inprogress", TaskStatus::InProgress),
    ("running", TaskStatus::InProgress),
    ("processing", TaskStatus::InProgress),
    ("started", TaskStatus::InProgress),
    ("active", TaskStatus::InProgress),
    ("completed", TaskStatus::Completed),
    ("complete", TaskStatus::Completed),
    ("done", TaskStatus::Completed),
    ("finished", TaskStatus::Completed),
    ("success", TaskStatus::Completed),
    ("succeeded", TaskStatus::Completed),
    ("failed", TaskStatus::Failed),
    ("failure", TaskStatus::Failed),
    ("error", TaskStatus::Failed),
    ("errored", TaskStatus::Failed),
    ("cancelled", TaskStatus::Failed),
    ("canceled", TaskStatus::Failed),
];

/// Map an upstream status token to its canonical status. Never fails.
#[must_use]
pub fn normalize(raw: Option<&str>) -> TaskStatus {
    raw.and_then(|token| {
        SYNONYMS
            .iter()
            .find(|(synonym, _)| *synonym == token)
            .map(|(_, status)| *status)
    })
    .unwrap_or(TaskStatus::Pending)
}
