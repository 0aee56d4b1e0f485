use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{DebugStatus, Severity};

/// A logged defect.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DebugLog {
    pub id: String,
    pub date_logged: DateTime<Utc>,
    pub component: String,
    pub description: String,
    pub severity: Severity,
    pub status: DebugStatus,
    /// Commit, PR, or ticket that fixed the defect.
    pub fix_reference: Option<String>,
    pub logged_by: String,
}

impl DebugLog {
    /// Critical and not yet fixed.
    #[must_use]
    pub fn is_critical_open(&self) -> bool {
        self.severity == Severity::Critical && self.status != DebugStatus::Fixed
    }
}

/// Input for logging a defect. New logs start `open`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NewDebugLog {
    pub component: String,
    pub description: String,
    pub severity: Severity,
    pub logged_by: String,
}
