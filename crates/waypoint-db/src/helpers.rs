//! Conversion helpers between libSQL values and JSON rows.

use serde_json::{Number, Value};
use waypoint_core::enums::Collection;
use waypoint_core::rows::{Row, datetime_from_value};

use crate::error::DatabaseError;

/// Map a `Collection` to its SQL table name.
///
/// Uses exhaustive match: adding a collection forces updating this.
#[must_use]
pub const fn collection_to_table(collection: Collection) -> &'static str {
    match collection {
        Collection::Tasks => "tasks",
        Collection::BuildRequests => "build_requests",
        Collection::DebugLogs => "debug_logs",
        Collection::Activity => "activity",
    }
}

/// Convert a JSON field value into a libSQL parameter.
///
/// Arrays and objects are stored as JSON text.
#[must_use]
pub fn json_to_sql(value: &Value) -> libsql::Value {
    match value {
        Value::Null => libsql::Value::Null,
        Value::Bool(b) => libsql::Value::Integer(i64::from(*b)),
        Value::Number(n) => n.as_i64().map_or_else(
            || libsql::Value::Real(n.as_f64().unwrap_or_default()),
            libsql::Value::Integer,
        ),
        Value::String(s) => libsql::Value::Text(s.clone()),
        other => libsql::Value::Text(other.to_string()),
    }
}

/// Convert a libSQL column value into JSON.
#[must_use]
pub fn sql_to_json(value: libsql::Value) -> Value {
    match value {
        libsql::Value::Null => Value::Null,
        libsql::Value::Integer(i) => Value::Number(i.into()),
        libsql::Value::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        libsql::Value::Text(s) => Value::String(s),
        libsql::Value::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Read every column of a libSQL row into a JSON row keyed by column name.
///
/// # Errors
///
/// Returns `DatabaseError` if a column value cannot be read.
pub fn row_to_json(row: &libsql::Row) -> Result<Row, DatabaseError> {
    let mut out = Row::new();
    for idx in 0..row.column_count() {
        let Some(name) = row.column_name(idx) else {
            continue;
        };
        out.insert(name.to_string(), sql_to_json(row.get_value(idx)?));
    }
    Ok(out)
}

/// Recency key used to order rows most-recently-updated first.
///
/// Falls back through `updated_at`, `updatedAt`, `created_at`,
/// `date_logged`, accepting every timestamp shape the row parsers accept;
/// unparseable rows sort last.
#[must_use]
pub fn recency_key(row: &Row) -> i64 {
    ["updated_at", "updatedAt", "created_at", "date_logged"]
        .iter()
        .filter_map(|k| row.get(*k).filter(|v| !v.is_null()))
        .find_map(|v| datetime_from_value(v).ok())
        .map_or(i64::MIN, |dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_sql_roundtrip_for_scalars() {
        for value in [json!(null), json!(42), json!(12.5), json!("in_progress")] {
            assert_eq!(sql_to_json(json_to_sql(&value)), value);
        }
        assert!(matches!(json_to_sql(&json!(true)), libsql::Value::Integer(1)));
    }

    #[test]
    fn recency_prefers_updated_at() {
        let Value::Object(newer) = json!({
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-03-01T00:00:00Z",
        }) else {
            unreachable!()
        };
        let Value::Object(older) = json!({"created_at": "2026-02-01T00:00:00Z"}) else {
            unreachable!()
        };
        assert!(recency_key(&newer) > recency_key(&older));
        assert_eq!(recency_key(&Row::new()), i64::MIN);
    }

    #[test]
    fn recency_reads_epoch_and_object_timestamps() {
        let Value::Object(text) = json!({"updated_at": "2020-01-01T00:00:00Z"}) else {
            unreachable!()
        };
        let Value::Object(epoch) = json!({"updated_at": 1_900_000_000}) else {
            unreachable!()
        };
        let Value::Object(object) = json!({
            "updated_at": null,
            "updatedAt": {"seconds": 1_800_000_000, "nanoseconds": 0},
        }) else {
            unreachable!()
        };
        assert!(recency_key(&epoch) > recency_key(&object));
        assert!(recency_key(&object) > recency_key(&text));
    }
}
