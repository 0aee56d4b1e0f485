//! Per-entity operations on [`TaskStore`](crate::TaskStore).
//!
//! Every mutation follows the same path: validate, apply optimistically under
//! the state lock, release the lock, call the adapter, then acknowledge or
//! roll back. Views are computed from the table on every call.

mod build_request;
mod debug_log;
mod task;
