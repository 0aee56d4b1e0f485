//! Tolerant conversion between remote rows and entities.
//!
//! Rows arrive as loose JSON objects from either backend. Field names vary
//! (`title` vs `task_title`, `created_at` vs `createdAt`), timestamps may be
//! RFC 3339, `SQLite`'s `datetime('now')` format, epoch numbers, or a
//! `{seconds, nanoseconds}` object. A row that lacks a required field becomes
//! a `CoreError::Parse`; callers drop that row and keep the rest of the batch.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};

use crate::entities::{BuildRequest, DebugLog, Task};
use crate::enums::{Collection, DebugStatus, Lane, Severity};
use crate::errors::CoreError;
use crate::normalize::normalize;
use crate::progress::ProgressEstimator;

/// One row from the remote store.
pub type Row = Map<String, Value>;

/// Epoch values above this are taken as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Parse a timestamp string as `DateTime<Utc>`.
///
/// Handles RFC 3339 (`"2026-02-09T14:30:00+00:00"`), `SQLite`'s default format
/// (`"2026-02-09 14:30:00"`), and naive ISO-8601 without offset.
///
/// # Errors
///
/// Returns a description of the failure if no format matches.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("Failed to parse datetime '{s}'"))
}

/// Parse a timestamp stored as a string, an epoch number (seconds or
/// milliseconds), or a `{seconds, nanoseconds}` object.
///
/// # Errors
///
/// Returns a description of the failure for any other shape or an
/// out-of-range value.
pub fn datetime_from_value(value: &Value) -> Result<DateTime<Utc>, String> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => {
            let raw = n
                .as_i64()
                .ok_or_else(|| format!("timestamp {n} is not an integer"))?;
            let parsed = if raw.abs() >= EPOCH_MILLIS_THRESHOLD {
                DateTime::from_timestamp_millis(raw)
            } else {
                DateTime::from_timestamp(raw, 0)
            };
            parsed.ok_or_else(|| format!("timestamp {raw} out of range"))
        }
        Value::Object(obj) => {
            let seconds = obj
                .get("seconds")
                .or_else(|| obj.get("_seconds"))
                .and_then(Value::as_i64)
                .ok_or_else(|| "timestamp object without seconds".to_string())?;
            let nanos = obj
                .get("nanoseconds")
                .or_else(|| obj.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, nanos)
                .ok_or_else(|| format!("timestamp {seconds}s out of range"))
        }
        other => Err(format!("unsupported timestamp value {other}")),
    }
}

/// First non-null value under any of `keys`.
fn field<'a>(row: &'a Row, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .find(|v| !v.is_null())
}

/// First non-empty string under any of `keys`.
fn text<'a>(row: &'a Row, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| row.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn required_text(row: &Row, keys: &[&str], collection: Collection) -> Result<String, CoreError> {
    text(row, keys)
        .map(String::from)
        .ok_or_else(|| CoreError::parse(collection.as_str(), format!("missing {}", keys.join("|"))))
}

fn row_id(row: &Row, collection: Collection) -> Result<String, CoreError> {
    match row.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(CoreError::parse(collection.as_str(), "missing id")),
    }
}

fn timestamp(
    row: &Row,
    keys: &[&str],
    collection: Collection,
) -> Result<Option<DateTime<Utc>>, CoreError> {
    field(row, keys)
        .map(datetime_from_value)
        .transpose()
        .map_err(|reason| CoreError::parse(collection.as_str(), reason))
}

/// Self-reported progress, if the row carries a usable number.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn reported_progress(row: &Row) -> Option<u8> {
    let value = field(row, &["progress"])?.as_f64()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.clamp(0.0, 100.0).floor() as u8)
}

/// Parse a task row, normalizing its status and estimating its progress as of `now`.
///
/// # Errors
///
/// Returns `CoreError::Parse` if the row has no id, no `title`/`task_title`,
/// or no usable creation timestamp.
pub fn task_from_row(
    row: &Row,
    estimator: &ProgressEstimator,
    now: DateTime<Utc>,
) -> Result<Task, CoreError> {
    let collection = Collection::Tasks;
    let id = row_id(row, collection)?;
    let title = required_text(row, &["title", "task_title"], collection)?;
    let description = text(row, &["description", "task_description"]).map(String::from);
    let status = normalize(field(row, &["status"]).and_then(Value::as_str));

    let updated_at = timestamp(row, &["updated_at", "updatedAt"], collection)?;
    let created_at = timestamp(row, &["created_at", "createdAt"], collection)?
        .or(updated_at)
        .ok_or_else(|| CoreError::parse(collection.as_str(), "missing created_at"))?;
    let updated_at = updated_at.map_or(created_at, |u| u.max(created_at));

    let reported = reported_progress(row);
    let estimate = estimator.estimate(status, reported, created_at, now);

    Ok(Task {
        id,
        title,
        description,
        status,
        progress: estimate.percent,
        reported_progress: reported,
        created_at,
        updated_at,
        estimated_remaining_minutes: estimate.remaining_minutes,
    })
}

/// Row written to the remote store for a task.
///
/// `progress` carries only the self-reported value; the displayed estimate is
/// derived locally and never written back.
#[must_use]
pub fn task_to_row(task: &Task) -> Row {
    to_row(json!({
        "id": task.id,
        "title": task.title,
        "description": task.description,
        "status": task.status.as_str(),
        "progress": task.reported_progress,
        "created_at": task.created_at.to_rfc3339(),
        "updated_at": task.updated_at.to_rfc3339(),
    }))
}

/// Parse a build request row.
///
/// A missing lane falls back to `BACKLOG`; an unrecognized lane is an error.
///
/// # Errors
///
/// Returns `CoreError::Parse` if the row has no id, no name, an unknown lane,
/// or no creation timestamp.
pub fn build_request_from_row(row: &Row) -> Result<BuildRequest, CoreError> {
    let collection = Collection::BuildRequests;
    let id = row_id(row, collection)?;
    let name = required_text(row, &["name"], collection)?;
    let lane = match text(row, &["lane"]) {
        None => Lane::Backlog,
        Some(token) => Lane::from_token(token)
            .ok_or_else(|| CoreError::parse(collection.as_str(), format!("unknown lane '{token}'")))?,
    };
    let created_at = timestamp(row, &["created_at", "createdAt"], collection)?
        .ok_or_else(|| CoreError::parse(collection.as_str(), "missing created_at"))?;
    // An unreadable deadline is dropped rather than failing the row.
    let deadline = field(row, &["deadline"]).and_then(|v| datetime_from_value(v).ok());

    Ok(BuildRequest {
        id,
        name,
        context: text(row, &["context"]).unwrap_or_default().to_string(),
        module: text(row, &["module"]).unwrap_or_default().to_string(),
        deadline,
        notes: text(row, &["notes"]).map(String::from),
        lane,
        created_by: text(row, &["created_by", "owner"])
            .unwrap_or_default()
            .to_string(),
        created_at,
    })
}

#[must_use]
pub fn build_request_to_row(request: &BuildRequest) -> Row {
    to_row(json!({
        "id": request.id,
        "name": request.name,
        "context": request.context,
        "module": request.module,
        "deadline": request.deadline.map(|d| d.to_rfc3339()),
        "notes": request.notes,
        "lane": request.lane.as_str(),
        "created_by": request.created_by,
        "created_at": request.created_at.to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    }))
}

/// Parse a debug log row. A missing status defaults to `open`.
///
/// # Errors
///
/// Returns `CoreError::Parse` if the row has no id, component, known severity,
/// or logging timestamp, or carries an unknown status.
pub fn debug_log_from_row(row: &Row) -> Result<DebugLog, CoreError> {
    let collection = Collection::DebugLogs;
    let id = row_id(row, collection)?;
    let component = required_text(row, &["component"], collection)?;
    let severity_token = required_text(row, &["severity"], collection)?;
    let severity = Severity::from_token(&severity_token).ok_or_else(|| {
        CoreError::parse(collection.as_str(), format!("unknown severity '{severity_token}'"))
    })?;
    let status = match text(row, &["status"]) {
        None => DebugStatus::Open,
        Some(token) => DebugStatus::from_token(token).ok_or_else(|| {
            CoreError::parse(collection.as_str(), format!("unknown status '{token}'"))
        })?,
    };
    let date_logged = timestamp(row, &["date_logged", "dateLogged", "created_at"], collection)?
        .ok_or_else(|| CoreError::parse(collection.as_str(), "missing date_logged"))?;

    Ok(DebugLog {
        id,
        date_logged,
        component,
        description: text(row, &["description"]).unwrap_or_default().to_string(),
        severity,
        status,
        fix_reference: text(row, &["fix_reference", "fixReference"]).map(String::from),
        logged_by: text(row, &["logged_by", "loggedBy"])
            .unwrap_or_default()
            .to_string(),
    })
}

#[must_use]
pub fn debug_log_to_row(log: &DebugLog) -> Row {
    to_row(json!({
        "id": log.id,
        "date_logged": log.date_logged.to_rfc3339(),
        "component": log.component,
        "description": log.description,
        "severity": log.severity.as_str(),
        "status": log.status.as_str(),
        "fix_reference": log.fix_reference,
        "logged_by": log.logged_by,
        "updated_at": Utc::now().to_rfc3339(),
    }))
}

fn to_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}
