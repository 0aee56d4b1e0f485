//! Status enums, lanes, severities, and collections for Waypoint.
//!
//! `TaskStatus` is the canonical four-state lifecycle. It is produced from
//! upstream tokens only by [`crate::normalize::normalize`]; nothing else in the
//! workspace branches on raw backend strings.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

/// Canonical status of a task.
///
/// ```text
/// pending → in-progress → completed
///         ↘             ↘ failed
///           completed | failed
/// ```
///
/// `completed` and `failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::InProgress, Self::Completed, Self::Failed],
            Self::InProgress => &[Self::Completed, Self::Failed],
            Self::Completed | Self::Failed => &[],
        }
    }

    /// Check whether moving to `next` is allowed.
    ///
    /// Staying in a non-terminal state is always allowed (progress updates
    /// re-send `in-progress`); re-asserting a terminal state is a no-op.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self == next || self.allowed_next_states().contains(&next)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Lane
// ---------------------------------------------------------------------------

/// Stage of a build request in the lane flow.
///
/// Lanes change only through explicit operator moves. Every new request
/// starts in `Backlog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Lane {
    #[serde(rename = "BACKLOG")]
    Backlog,
    #[serde(rename = "CURRENT SPRINT")]
    CurrentSprint,
    #[serde(rename = "IN PROGRESS")]
    InProgress,
    #[serde(rename = "TESTING")]
    Testing,
    #[serde(rename = "DONE")]
    Done,
}

impl Lane {
    pub const ALL: [Self; 5] = [
        Self::Backlog,
        Self::CurrentSprint,
        Self::InProgress,
        Self::Testing,
        Self::Done,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::CurrentSprint => "CURRENT SPRINT",
            Self::InProgress => "IN PROGRESS",
            Self::Testing => "TESTING",
            Self::Done => "DONE",
        }
    }

    /// Parse a lane token as stored by either backend.
    ///
    /// Accepts the display form (`"CURRENT SPRINT"`) and the snake/kebab forms
    /// (`"current_sprint"`, `"current-sprint"`), ignoring ASCII case.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let folded: String = token
            .trim()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c })
            .collect();
        Self::ALL
            .into_iter()
            .find(|lane| lane.as_str().eq_ignore_ascii_case(&folded))
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Severity of a logged defect.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Major => "major",
            Self::Critical => "critical",
        }
    }

    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        [Self::Minor, Self::Major, Self::Critical]
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(token.trim()))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DebugStatus
// ---------------------------------------------------------------------------

/// Status of a logged defect. Any status may be set by the operator; a fixed
/// defect can be reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DebugStatus {
    Open,
    InProgress,
    Fixed,
}

impl DebugStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Fixed => "fixed",
        }
    }

    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        let folded = token.trim().replace('-', "_");
        [Self::Open, Self::InProgress, Self::Fixed]
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(&folded))
    }
}

impl fmt::Display for DebugStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// A named collection in the remote row store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Tasks,
    BuildRequests,
    DebugLogs,
    Activity,
}

impl Collection {
    /// Collections mirrored into the task store and kept fresh by sync.
    pub const SYNCED: [Self; 3] = [Self::Tasks, Self::BuildRequests, Self::DebugLogs];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::BuildRequests => "build_requests",
            Self::DebugLogs => "debug_logs",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
