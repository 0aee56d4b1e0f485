//! libSQL row store. Request/response only: no push, so the sync layer polls.
//!
//! Each collection maps to one table. Incoming rows are filtered against a
//! per-table column list; the tasks table stores `title` and `description`
//! under the legacy `task_title` and `task_description` column names, and
//! rows are returned with those raw names for the row parsers to absorb.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::Builder;
use serde_json::Value;
use waypoint_core::enums::Collection;
use waypoint_core::ids::generate_id;
use waypoint_core::rows::{Row, datetime_from_value};

use crate::adapter::{PersistenceAdapter, QueryFilter, Subscription};
use crate::error::DatabaseError;
use crate::helpers::{collection_to_table, json_to_sql, row_to_json};
use crate::retry::is_transient_libsql_error;

const TASK_COLUMNS: &[&str] = &[
    "id",
    "task_title",
    "task_description",
    "status",
    "progress",
    "created_at",
    "updated_at",
];
const BUILD_REQUEST_COLUMNS: &[&str] = &[
    "id",
    "name",
    "context",
    "module",
    "deadline",
    "notes",
    "lane",
    "created_by",
    "created_at",
    "updated_at",
];
const DEBUG_LOG_COLUMNS: &[&str] = &[
    "id",
    "date_logged",
    "component",
    "description",
    "severity",
    "status",
    "fix_reference",
    "logged_by",
    "updated_at",
];
const ACTIVITY_COLUMNS: &[&str] = &["id", "kind", "detail", "created_at", "updated_at"];

const fn columns(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::Tasks => TASK_COLUMNS,
        Collection::BuildRequests => BUILD_REQUEST_COLUMNS,
        Collection::DebugLogs => DEBUG_LOG_COLUMNS,
        Collection::Activity => ACTIVITY_COLUMNS,
    }
}

/// Resolve an incoming field name to a column of `collection`'s table.
fn column_for(collection: Collection, key: &str) -> Option<&'static str> {
    let key = match (collection, key) {
        (Collection::Tasks, "title") => "task_title",
        (Collection::Tasks, "description") => "task_description",
        (Collection::DebugLogs, "dateLogged") => "date_logged",
        (Collection::DebugLogs, "fixReference") => "fix_reference",
        (Collection::DebugLogs, "loggedBy") => "logged_by",
        (_, "createdAt") => "created_at",
        (_, "updatedAt") => "updated_at",
        _ => key,
    };
    columns(collection).iter().copied().find(|c| *c == key)
}

/// Columns compared by `ORDER BY`, stored as fixed-width RFC 3339 UTC text.
const TIMESTAMP_COLUMNS: &[&str] = &["created_at", "updated_at", "date_logged"];

fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Convert one field to its column value. Timestamps in any accepted shape
/// are rewritten so text order matches time order; unreadable ones are kept
/// as given.
fn column_value(column: &str, value: &Value) -> libsql::Value {
    if TIMESTAMP_COLUMNS.contains(&column)
        && let Ok(at) = datetime_from_value(value)
    {
        return libsql::Value::Text(stamp(at));
    }
    json_to_sql(value)
}

/// Keep only known columns, translating aliases. Later duplicates win.
fn to_columns(collection: Collection, row: Row) -> Vec<(&'static str, libsql::Value)> {
    let mut out: Vec<(&'static str, libsql::Value)> = Vec::with_capacity(row.len());
    for (key, value) in row {
        match column_for(collection, &key) {
            Some(column) => {
                let value = column_value(column, &value);
                if let Some(slot) = out.iter_mut().find(|(c, _)| *c == column) {
                    slot.1 = value;
                } else {
                    out.push((column, value));
                }
            }
            None => tracing::debug!(%collection, field = %key, "dropping unknown column"),
        }
    }
    out
}

fn map_write_error(e: libsql::Error) -> DatabaseError {
    if is_transient_libsql_error(&e) {
        return DatabaseError::Connection(e.to_string());
    }
    let msg = e.to_string();
    if msg.contains("constraint") || msg.contains("NOT NULL") {
        DatabaseError::Rejected(msg)
    } else {
        DatabaseError::LibSql(e)
    }
}

fn map_read_error(e: libsql::Error) -> DatabaseError {
    if is_transient_libsql_error(&e) {
        DatabaseError::Connection(e.to_string())
    } else {
        DatabaseError::Query(e.to_string())
    }
}

/// Cloneable handle to a libSQL database and its connection.
#[derive(Clone)]
pub struct SqlStore {
    _db: Arc<libsql::Database>,
    conn: libsql::Connection,
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore").finish_non_exhaustive()
    }
}

impl SqlStore {
    /// Open a local database at `path` (or `":memory:"`) and run migrations.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        let store = Self {
            _db: Arc::new(db),
            conn,
        };
        store.run_migrations().await?;
        tracing::debug!(path, "opened sql store");
        Ok(store)
    }

    /// Direct connection access for tests and ad-hoc queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }
}

impl PersistenceAdapter for SqlStore {
    fn supports_push(&self) -> bool {
        false
    }

    fn subscribe(&self, _collection: Collection) -> Result<Option<Subscription>, DatabaseError> {
        Ok(None)
    }

    async fn query(
        &self,
        collection: Collection,
        filter: &QueryFilter,
    ) -> Result<Vec<Row>, DatabaseError> {
        let table = collection_to_table(collection);
        let mut rows = self
            .conn
            .query(
                &format!("SELECT * FROM {table} ORDER BY updated_at DESC LIMIT ?1"),
                [i64::from(filter.limit)],
            )
            .await
            .map_err(map_read_error)?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(map_read_error)? {
            out.push(row_to_json(&row)?);
        }
        Ok(out)
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<String, DatabaseError> {
        let mut cols = to_columns(collection, row);
        let id = match cols.iter().find(|(c, _)| *c == "id") {
            Some((_, libsql::Value::Text(id))) if !id.is_empty() => id.clone(),
            _ => {
                let id = generate_id("sql").map_err(|e| DatabaseError::Other(e.into()))?;
                cols.retain(|(c, _)| *c != "id");
                cols.push(("id", libsql::Value::Text(id.clone())));
                id
            }
        };
        let now = stamp(Utc::now());
        for stamp in ["created_at", "updated_at"] {
            if columns(collection).contains(&stamp) && !cols.iter().any(|(c, _)| *c == stamp) {
                cols.push((stamp, libsql::Value::Text(now.clone())));
            }
        }

        let table = collection_to_table(collection);
        let names: Vec<&str> = cols.iter().map(|(c, _)| *c).collect();
        let placeholders: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            names.join(", "),
            placeholders.join(", ")
        );
        let params: Vec<libsql::Value> = cols.into_iter().map(|(_, v)| v).collect();

        self.conn
            .execute(&sql, libsql::params_from_iter(params))
            .await
            .map_err(map_write_error)?;
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        mut patch: Row,
    ) -> Result<bool, DatabaseError> {
        patch.remove("id");
        let mut cols = to_columns(collection, patch);
        if !cols.iter().any(|(c, _)| *c == "updated_at") {
            cols.push(("updated_at", libsql::Value::Text(stamp(Utc::now()))));
        }

        let table = collection_to_table(collection);
        let sets: Vec<String> = cols
            .iter()
            .enumerate()
            .map(|(i, (c, _))| format!("{c} = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE {table} SET {} WHERE id = ?{}",
            sets.join(", "),
            cols.len() + 1
        );
        let mut params: Vec<libsql::Value> = cols.into_iter().map(|(_, v)| v).collect();
        params.push(libsql::Value::Text(id.to_string()));

        let affected = self
            .conn
            .execute(&sql, libsql::params_from_iter(params))
            .await
            .map_err(map_write_error)?;
        Ok(affected > 0)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, DatabaseError> {
        let table = collection_to_table(collection);
        let affected = self
            .conn
            .execute(&format!("DELETE FROM {table} WHERE id = ?1"), [id])
            .await
            .map_err(map_write_error)?;
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn task_aliases_map_to_legacy_columns() {
        let cols = to_columns(
            Collection::Tasks,
            row(json!({"title": "Export", "description": "csv", "bogus": 1})),
        );
        let mut names: Vec<&str> = cols.iter().map(|(c, _)| *c).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["task_description", "task_title"]);
    }

    #[test]
    fn alias_for_other_collection_is_not_translated() {
        assert_eq!(column_for(Collection::DebugLogs, "description"), Some("description"));
        assert_eq!(column_for(Collection::BuildRequests, "title"), None);
        assert_eq!(column_for(Collection::Activity, "updatedAt"), Some("updated_at"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schema_has_all_tables() {
        let store = SqlStore::open_local(":memory:").await.unwrap();
        for table in ["tasks", "build_requests", "debug_logs", "activity"] {
            let mut rows = store
                .conn()
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                )
                .await
                .unwrap();
            assert!(rows.next().await.unwrap().is_some(), "table '{table}' should exist");
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn insert_update_delete_roundtrip() {
        let store = SqlStore::open_local(":memory:").await.unwrap();
        let id = store
            .insert(
                Collection::Tasks,
                row(json!({"id": "tsk-00000001", "title": "Export", "status": "queued"})),
            )
            .await
            .unwrap();
        assert_eq!(id, "tsk-00000001");

        assert!(
            store
                .update(Collection::Tasks, &id, row(json!({"status": "running", "progress": 40})))
                .await
                .unwrap()
        );

        let rows = store
            .query(Collection::Tasks, &QueryFilter::page(10))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["task_title"], json!("Export"));
        assert_eq!(rows[0]["status"], json!("running"));

        assert!(store.delete(Collection::Tasks, &id).await.unwrap());
        assert!(!store.delete(Collection::Tasks, &id).await.unwrap());
    }

    #[test]
    fn timestamps_are_normalized_to_utc_text() {
        let cols = to_columns(
            Collection::Tasks,
            row(json!({
                "created_at": "2026-03-01 09:00:00",
                "updated_at": "2026-03-01T12:00:00+02:00",
            })),
        );
        let text = |name: &str| match cols.iter().find(|(c, _)| *c == name) {
            Some((_, libsql::Value::Text(t))) => t.clone(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(text("created_at"), "2026-03-01T09:00:00.000000Z");
        assert_eq!(text("updated_at"), "2026-03-01T10:00:00.000000Z");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mixed_timestamp_formats_query_in_time_order() {
        let store = SqlStore::open_local(":memory:").await.unwrap();
        for (id, updated_at) in [
            ("tsk-a", json!("2026-03-01T12:00:00+02:00")),
            ("tsk-b", json!("2026-03-01 11:00:00")),
            ("tsk-c", json!(1_772_366_400)),
        ] {
            store
                .insert(
                    Collection::Tasks,
                    row(json!({"id": id, "title": id, "updated_at": updated_at})),
                )
                .await
                .unwrap();
        }
        let rows = store
            .query(Collection::Tasks, &QueryFilter::page(10))
            .await
            .unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["tsk-c", "tsk-b", "tsk-a"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_id_is_rejected() {
        let store = SqlStore::open_local(":memory:").await.unwrap();
        let r = row(json!({"id": "tsk-1", "title": "Once"}));
        store.insert(Collection::Tasks, r.clone()).await.unwrap();
        let err = store.insert(Collection::Tasks, r).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Rejected(_)), "got {err:?}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn no_push_channel() {
        let store = SqlStore::open_local(":memory:").await.unwrap();
        assert!(!store.supports_push());
        assert!(store.subscribe(Collection::Tasks).unwrap().is_none());
    }
}
