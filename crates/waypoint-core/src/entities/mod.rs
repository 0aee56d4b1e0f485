//! Entity structs for all Waypoint domain objects.
//!
//! Each entity maps to one collection in the remote row store. All structs
//! derive `Serialize`, `Deserialize`, and `JsonSchema` for JSON roundtrip and
//! schema validation.

mod build_request;
mod debug_log;
mod task;

pub use build_request::{BuildRequest, NewBuildRequest};
pub use debug_log::{DebugLog, NewDebugLog};
pub use task::{NewTask, Task};
