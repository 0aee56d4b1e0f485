//! Sample rows for demos and local development.
//!
//! The rows deliberately mix upstream vocabularies (`queued`, `running`,
//! `done`, `task_title`, epoch timestamps) so a seeded store exercises the
//! tolerant row parsers the same way a real remote would.

use chrono::{Duration, Utc};
use serde_json::{Value, json};
use waypoint_core::enums::Collection;
use waypoint_core::rows::Row;

use crate::adapter::PersistenceAdapter;
use crate::error::DatabaseError;

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn sample_rows() -> Vec<(Collection, Row)> {
    let now = Utc::now();
    let ago = |minutes: i64| (now - Duration::minutes(minutes)).to_rfc3339();

    vec![
        (
            Collection::Tasks,
            row(json!({
                "id": "tsk-5eed0001",
                "title": "Nightly export",
                "description": "Dump the reporting tables to CSV",
                "status": "queued",
                "created_at": ago(2),
                "updated_at": ago(2),
            })),
        ),
        (
            Collection::Tasks,
            row(json!({
                "id": "tsk-5eed0002",
                "task_title": "Quick data processing",
                "status": "running",
                "created_at": ago(3),
                "updated_at": ago(1),
            })),
        ),
        (
            Collection::Tasks,
            row(json!({
                "id": "tsk-5eed0003",
                "title": "Re-index search",
                "status": "processing",
                "progress": 40,
                "created_at": ago(10),
                "updated_at": ago(1),
            })),
        ),
        (
            Collection::Tasks,
            row(json!({
                "id": "tsk-5eed0004",
                "task_title": "Thumbnail backfill",
                "task_description": "Regenerate missing thumbnails",
                "status": "done",
                "created_at": (now - Duration::hours(3)).timestamp(),
                "updated_at": ago(90),
            })),
        ),
        (
            Collection::Tasks,
            row(json!({
                "id": "tsk-5eed0005",
                "title": "Mail digest",
                "status": "errored",
                "created_at": ago(45),
                "updated_at": ago(40),
            })),
        ),
        (
            Collection::BuildRequests,
            row(json!({
                "id": "brq-5eed0001",
                "name": "Usage dashboard",
                "context": "Ops wants per-team usage",
                "module": "analytics",
                "lane": "BACKLOG",
                "created_by": "ops",
                "created_at": ago(600),
            })),
        ),
        (
            Collection::BuildRequests,
            row(json!({
                "id": "brq-5eed0002",
                "name": "SSO login",
                "context": "Replace password login",
                "module": "auth",
                "deadline": (now + Duration::days(14)).to_rfc3339(),
                "lane": "in_progress",
                "created_by": "security",
                "created_at": ago(3000),
            })),
        ),
        (
            Collection::DebugLogs,
            row(json!({
                "id": "dbg-5eed0001",
                "date_logged": ago(30),
                "component": "sync",
                "description": "Refetch stalls after network flap",
                "severity": "critical",
                "status": "open",
                "logged_by": "oncall",
            })),
        ),
        (
            Collection::DebugLogs,
            row(json!({
                "id": "dbg-5eed0002",
                "dateLogged": ago(300),
                "component": "cache",
                "description": "Cache file left behind after clear",
                "severity": "minor",
                "status": "fixed",
                "fix_reference": "PR 212",
                "logged_by": "qa",
            })),
        ),
    ]
}

/// Insert the sample rows into `adapter`. Returns the number inserted.
///
/// # Errors
///
/// Returns the first `DatabaseError` the adapter reports.
pub async fn seed<A: PersistenceAdapter>(adapter: &A) -> Result<usize, DatabaseError> {
    let rows = sample_rows();
    let count = rows.len();
    for (collection, row) in rows {
        adapter.insert(collection, row).await?;
    }
    tracing::info!(count, "seeded sample rows");
    Ok(count)
}
