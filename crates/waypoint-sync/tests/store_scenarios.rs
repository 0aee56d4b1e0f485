//! # Task store scenarios
//!
//! End-to-end behavior of `TaskStore` over the in-memory document store,
//! driven by explicit refetches and a manual clock so every step is
//! deterministic.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use waypoint_config::SyncConfig;
use waypoint_core::entities::{NewDebugLog, NewTask};
use waypoint_core::enums::{Collection, DebugStatus, Severity, TaskStatus};
use waypoint_core::rows::Row;
use waypoint_db::{DocumentStore, PersistenceAdapter};
use waypoint_sync::{
    DebugLogUpdateBuilder, ManualClock, RefetchOutcome, SyncError, TaskStore, TaskUpdateBuilder,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn t0() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn setup_with(config: SyncConfig) -> (TaskStore<DocumentStore>, DocumentStore, ManualClock) {
    let remote = DocumentStore::new();
    let clock = ManualClock::new(t0());
    let store = TaskStore::builder(remote.clone())
        .sync_config(config)
        .clock(clock.clone())
        .build();
    (store, remote, clock)
}

fn setup() -> (TaskStore<DocumentStore>, DocumentStore, ManualClock) {
    setup_with(SyncConfig::default())
}

// ---------------------------------------------------------------------------
// Creation and views
// ---------------------------------------------------------------------------

#[tokio::test]
async fn created_task_is_the_only_active_entry() {
    let (store, remote, _) = setup();
    let id = store.create_task(NewTask::new("Export invoices")).await.unwrap();

    let active = store.list_active();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, id);
    assert_eq!(active[0].title, "Export invoices");
    assert_eq!(active[0].status, TaskStatus::Pending);
    assert_eq!(active[0].progress, 0);

    assert_eq!(store.refetch(Collection::Tasks).await, RefetchOutcome::Applied);
    assert_eq!(store.list_active().len(), 1);
    assert_eq!(remote.len(Collection::Tasks), 1);
    assert_eq!(store.status(Collection::Tasks).pending_writes, 0);
}

#[tokio::test]
async fn quick_data_processing_reaches_half_way() {
    let (store, _, clock) = setup();
    let id = store
        .create_task(NewTask::new("Quick data processing"))
        .await
        .unwrap();
    let update = TaskUpdateBuilder::new()
        .status(TaskStatus::InProgress)
        .progress(0)
        .build();
    store.update_task(&id, update).await.unwrap();

    clock.advance(TimeDelta::seconds(150));
    let task = store.get_task(&id).unwrap();
    assert!(task.progress.abs_diff(50) <= 1, "got {}", task.progress);
    assert!(task.progress <= 95);

    // A refetch must not pull the estimate back.
    store.refetch(Collection::Tasks).await;
    assert!(store.get_task(&id).unwrap().progress >= task.progress);

    clock.advance(TimeDelta::hours(1));
    assert_eq!(store.get_task(&id).unwrap().progress, 95);
}

#[tokio::test]
async fn malformed_row_is_dropped_from_batch() {
    let (store, remote, _) = setup();
    let stamp = t0().to_rfc3339();
    for i in 0..4 {
        remote.put_raw(
            Collection::Tasks,
            format!("tsk-{i}"),
            row(json!({"id": format!("tsk-{i}"), "task_title": format!("Job {i}"),
                       "status": "queued", "created_at": stamp})),
        );
    }
    remote.put_raw(
        Collection::Tasks,
        "tsk-bad",
        row(json!({"id": "tsk-bad", "status": "running", "created_at": stamp})),
    );

    assert_eq!(store.refetch(Collection::Tasks).await, RefetchOutcome::Applied);
    assert_eq!(store.list_tasks().len(), 4);
    assert!(store.get_task("tsk-bad").is_err());

    let status = store.status(Collection::Tasks);
    assert_eq!(status.dropped_rows, 1);
    assert_eq!(status.replacements, 1);
    assert!(status.is_healthy());
}

#[tokio::test]
async fn only_unfixed_critical_logs_are_listed() {
    let (store, _, _) = setup();
    let log = |severity| NewDebugLog {
        component: "ingest".into(),
        description: "drops rows".into(),
        severity,
        logged_by: "qa".into(),
    };
    let open = store.log_debug(log(Severity::Critical)).await.unwrap();
    let fixed = store.log_debug(log(Severity::Critical)).await.unwrap();
    store.log_debug(log(Severity::Major)).await.unwrap();
    store
        .update_debug_log(
            &fixed,
            DebugLogUpdateBuilder::new().status(DebugStatus::Fixed).build(),
        )
        .await
        .unwrap();

    let critical: Vec<String> = store.list_critical_open().into_iter().map(|l| l.id).collect();
    assert_eq!(critical, vec![open]);
}

// ---------------------------------------------------------------------------
// Refetch coordination
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_refetch_applies_once() {
    let (store, remote, _) = setup();
    remote.set_query_delay(Duration::from_millis(200));

    let (a, b) = tokio::join!(
        store.refetch(Collection::Tasks),
        store.refetch(Collection::Tasks)
    );
    let mut outcomes = [a, b];
    outcomes.sort_by_key(|o| format!("{o:?}"));
    assert_eq!(outcomes, [RefetchOutcome::Applied, RefetchOutcome::Suppressed]);
    assert_eq!(store.status(Collection::Tasks).replacements, 1);
    assert_eq!(remote.query_count(), 1);
}

#[tokio::test]
async fn refetch_of_unsynced_collection_is_discarded() {
    let (store, _, _) = setup();
    assert_eq!(
        store.refetch(Collection::Activity).await,
        RefetchOutcome::Discarded
    );
}

// ---------------------------------------------------------------------------
// Optimistic writes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_create_is_rolled_back() {
    let (store, remote, _) = setup();
    remote.set_reject_writes(true);

    let err = store.create_task(NewTask::new("Export")).await.unwrap_err();
    assert!(matches!(err, SyncError::RemoteWrite { .. }), "got {err:?}");
    assert!(store.list_tasks().is_empty());
    assert_eq!(store.status(Collection::Tasks).pending_writes, 0);
}

#[tokio::test]
async fn offline_update_is_rolled_back() {
    let (store, remote, _) = setup();
    let id = store.create_task(NewTask::new("Export")).await.unwrap();
    remote.set_offline(true);

    let update = TaskUpdateBuilder::new().status(TaskStatus::Completed).build();
    let err = store.update_task(&id, update).await.unwrap_err();
    assert!(matches!(err, SyncError::Connection { .. }), "got {err:?}");
    assert_eq!(store.get_task(&id).unwrap().status, TaskStatus::Pending);
}

#[tokio::test]
async fn terminal_task_cannot_be_reopened() {
    let (store, remote, _) = setup();
    let id = store.create_task(NewTask::new("Export")).await.unwrap();
    let done = TaskUpdateBuilder::new().status(TaskStatus::Failed).build();
    store.update_task(&id, done).await.unwrap();
    let queries = remote.query_count();

    let reopen = TaskUpdateBuilder::new().status(TaskStatus::InProgress).build();
    let err = store.update_task(&id, reopen).await.unwrap_err();
    assert!(matches!(err, SyncError::InvalidTransition { .. }));
    assert_eq!(remote.query_count(), queries);
    assert_eq!(store.get_task(&id).unwrap().progress, 100);
}

#[tokio::test]
async fn pending_write_survives_stale_refetch_then_expires() {
    let config = SyncConfig {
        max_reassertions: 2,
        ..SyncConfig::default()
    };
    let (store, remote, _) = setup_with(config);
    let id = store.create_task(NewTask::new("Export")).await.unwrap();
    let start = TaskUpdateBuilder::new().status(TaskStatus::InProgress).build();
    store.update_task(&id, start).await.unwrap();

    // Another client overwrites the row with an older view of it.
    let stale = (t0() - TimeDelta::hours(1)).to_rfc3339();
    remote.put_raw(
        Collection::Tasks,
        id.clone(),
        row(json!({"id": id, "title": "Export", "status": "pending",
                   "created_at": stale, "updated_at": stale})),
    );

    for _ in 0..2 {
        store.refetch(Collection::Tasks).await;
        assert_eq!(store.get_task(&id).unwrap().status, TaskStatus::InProgress);
        assert_eq!(store.status(Collection::Tasks).pending_writes, 1);
    }

    store.refetch(Collection::Tasks).await;
    assert_eq!(store.get_task(&id).unwrap().status, TaskStatus::Pending);
    assert_eq!(store.status(Collection::Tasks).pending_writes, 0);
}

#[tokio::test]
async fn acknowledged_write_is_confirmed_by_refetch() {
    let (store, _, _) = setup();
    let id = store.create_task(NewTask::new("Export")).await.unwrap();
    assert_eq!(store.status(Collection::Tasks).pending_writes, 1);

    store.refetch(Collection::Tasks).await;
    assert_eq!(store.status(Collection::Tasks).pending_writes, 0);
    assert_eq!(store.get_task(&id).unwrap().title, "Export");
}

// ---------------------------------------------------------------------------
// Failures and lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refetch_failure_is_sticky_and_reads_keep_working() {
    let (store, remote, _) = setup();
    store.create_task(NewTask::new("Export")).await.unwrap();
    store.refetch(Collection::Tasks).await;

    remote.set_offline(true);
    assert_eq!(store.refetch(Collection::Tasks).await, RefetchOutcome::Failed);
    assert_eq!(store.list_tasks().len(), 1);
    let status = store.status(Collection::Tasks);
    assert_eq!(status.consecutive_failures, 1);
    assert!(status.last_error.is_some());

    remote.set_offline(false);
    assert_eq!(store.refetch(Collection::Tasks).await, RefetchOutcome::Applied);
    let status = store.status(Collection::Tasks);
    assert!(status.is_healthy());
    assert!(status.last_error.is_some());

    store.dismiss_error(Collection::Tasks);
    assert_eq!(store.status(Collection::Tasks).last_error, None);
}

#[tokio::test]
async fn close_is_idempotent_and_blocks_writes() {
    let (store, _, _) = setup();
    let id = store.create_task(NewTask::new("Export")).await.unwrap();
    store.start().unwrap();

    store.close().await;
    store.close().await;

    assert!(store.is_closed());
    assert!(matches!(
        store.create_task(NewTask::new("Late")).await,
        Err(SyncError::Closed)
    ));
    assert!(matches!(store.delete_task(&id).await, Err(SyncError::Closed)));
    assert!(matches!(store.start(), Err(SyncError::Closed)));
    assert_eq!(store.refetch(Collection::Tasks).await, RefetchOutcome::Discarded);

    assert_eq!(store.list_tasks().len(), 1);
    for status in store.statuses() {
        assert_eq!(status.phase, waypoint_sync::SyncPhase::Closed);
        assert!(!status.push);
    }
}

#[tokio::test]
async fn refetch_in_flight_at_close_is_discarded() {
    let (store, remote, _) = setup();
    remote.set_query_delay(Duration::from_millis(300));

    let (outcome, ()) = tokio::join!(store.refetch(Collection::Tasks), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        remote.put_raw(
            Collection::Tasks,
            "tsk-late0001",
            row(json!({"id": "tsk-late0001", "title": "Late",
                       "created_at": t0().to_rfc3339()})),
        );
        store.close().await;
    });

    assert_eq!(outcome, RefetchOutcome::Discarded);
    assert!(store.get_task("tsk-late0001").is_err());
    assert!(store.list_tasks().is_empty());
    assert_eq!(store.status(Collection::Tasks).replacements, 0);
}

#[tokio::test]
async fn activity_is_recorded_for_mutations() {
    let (store, remote, _) = setup();
    store.create_task(NewTask::new("Export")).await.unwrap();

    for _ in 0..50 {
        if remote.len(Collection::Activity) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let rows = remote
        .query(Collection::Activity, &waypoint_db::QueryFilter::page(10))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["kind"], json!("task.created"));
}
