//! Debug log update builder.

use serde::Serialize;
use serde_json::{Value, json};
use waypoint_core::entities::DebugLog;
use waypoint_core::enums::DebugStatus;
use waypoint_core::rows::Row;

use crate::error::SyncError;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugLogUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DebugStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_reference: Option<Option<String>>,
}

impl DebugLogUpdate {
    /// # Errors
    ///
    /// Returns `SyncError::Validation` if the update changes nothing.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.status.is_none() && self.fix_reference.is_none() {
            return Err(SyncError::Validation("debug log update changes nothing".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn apply_to(&self, current: &DebugLog) -> DebugLog {
        let mut next = current.clone();
        if let Some(status) = self.status {
            next.status = status;
        }
        if let Some(fix_reference) = &self.fix_reference {
            next.fix_reference.clone_from(fix_reference);
        }
        next
    }

    #[must_use]
    pub fn to_patch(&self, updated_at: chrono::DateTime<chrono::Utc>) -> Row {
        let mut patch = Row::new();
        if let Some(status) = self.status {
            patch.insert("status".into(), json!(status.as_str()));
        }
        if let Some(fix_reference) = &self.fix_reference {
            patch.insert(
                "fix_reference".into(),
                fix_reference.as_ref().map_or(Value::Null, |r| json!(r)),
            );
        }
        patch.insert("updated_at".into(), json!(updated_at.to_rfc3339()));
        patch
    }
}

pub struct DebugLogUpdateBuilder(DebugLogUpdate);

impl DebugLogUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(DebugLogUpdate::default())
    }

    #[must_use]
    pub fn status(mut self, status: DebugStatus) -> Self {
        self.0.status = Some(status);
        self
    }

    #[must_use]
    pub fn fix_reference(mut self, fix_reference: Option<String>) -> Self {
        self.0.fix_reference = Some(fix_reference);
        self
    }

    #[must_use]
    pub fn build(self) -> DebugLogUpdate {
        self.0
    }
}

impl Default for DebugLogUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
