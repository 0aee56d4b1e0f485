//! # waypoint-sync
//!
//! The Waypoint task store: an authoritative in-memory view of tasks, build
//! requests, and debug logs, kept in step with a remote row store.
//!
//! - [`TaskStore`] owns the tables and exposes CRUD operations and views
//! - Writes are optimistic: applied locally first, rolled back if the remote
//!   refuses them, and re-asserted over stale refetches until observed
//! - One background worker per collection refetches on push notifications,
//!   after local writes, and on a poll timer with exponential backoff
//! - Sync failures never fail reads; they are kept on [`CollectionStatus`]
//! - The task table is mirrored to a JSONL [`LocalCache`] for fast startup

pub mod cache;
pub mod clock;
pub mod error;
mod repos;
pub mod status;
mod store;
mod sync;
pub mod table;
pub mod updates;

mod test_support;

pub use cache::LocalCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SyncError;
pub use status::{CollectionStatus, RefetchOutcome, SyncPhase};
pub use store::{TaskStore, TaskStoreBuilder};
pub use updates::debug_log::{DebugLogUpdate, DebugLogUpdateBuilder};
pub use updates::task::{TaskUpdate, TaskUpdateBuilder};
