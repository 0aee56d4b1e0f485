use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Lane;

/// A request moving through the lane flow, owned by its creator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct BuildRequest {
    pub id: String,
    pub name: String,
    pub context: String,
    pub module: String,
    pub deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub lane: Lane,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a build request. New requests always land in `BACKLOG`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NewBuildRequest {
    pub name: String,
    pub context: String,
    pub module: String,
    pub deadline: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_by: String,
}
