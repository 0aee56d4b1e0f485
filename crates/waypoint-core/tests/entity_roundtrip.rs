//! Serde roundtrip and JsonSchema validation tests for all entity types.

use chrono::Utc;
use schemars::schema_for;
use waypoint_core::entities::*;
use waypoint_core::enums::*;

/// Validate a JSON value against a schemars-generated schema.
fn validate_against_schema(
    schema: &serde_json::Value,
    instance: &serde_json::Value,
) -> Vec<String> {
    let validator = jsonschema::validator_for(schema).expect("schema should be valid");
    validator
        .iter_errors(instance)
        .map(|e| format!("{e}"))
        .collect()
}

macro_rules! roundtrip_and_validate {
    ($name:ident, $ty:ty, $instance:expr) => {
        #[test]
        fn $name() {
            let val: $ty = $instance;

            let json_str = serde_json::to_string_pretty(&val).unwrap();
            let recovered: $ty = serde_json::from_str(&json_str).unwrap();
            assert_eq!(
                recovered,
                val,
                "serde roundtrip failed for {}",
                stringify!($ty)
            );

            let schema = serde_json::to_value(schema_for!($ty)).unwrap();
            let instance = serde_json::to_value(&val).unwrap();
            let errors = validate_against_schema(&schema, &instance);
            assert!(
                errors.is_empty(),
                "Schema validation failed for {}: {:?}",
                stringify!($ty),
                errors
            );
        }
    };
}

roundtrip_and_validate!(
    task_in_progress_roundtrip,
    Task,
    Task {
        id: "tsk-a3f8b2c1".into(),
        title: "Quick data processing".into(),
        description: Some("Normalize the March export".into()),
        status: TaskStatus::InProgress,
        progress: 37,
        reported_progress: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        estimated_remaining_minutes: Some(4),
    }
);

roundtrip_and_validate!(
    task_completed_roundtrip,
    Task,
    Task {
        id: "tsk-00000002".into(),
        title: "Report generation".into(),
        description: None,
        status: TaskStatus::Completed,
        progress: 100,
        reported_progress: Some(100),
        created_at: Utc::now(),
        updated_at: Utc::now(),
        estimated_remaining_minutes: None,
    }
);

roundtrip_and_validate!(
    new_task_roundtrip,
    NewTask,
    NewTask::new("Warm caches").with_description("before the launch email")
);

roundtrip_and_validate!(
    build_request_roundtrip,
    BuildRequest,
    BuildRequest {
        id: "brq-0000beef".into(),
        name: "Survey export endpoint".into(),
        context: "Ops needs weekly CSVs".into(),
        module: "reports".into(),
        deadline: Some(Utc::now()),
        notes: None,
        lane: Lane::CurrentSprint,
        created_by: "dana".into(),
        created_at: Utc::now(),
    }
);

roundtrip_and_validate!(
    debug_log_roundtrip,
    DebugLog,
    DebugLog {
        id: "dbg-00c0ffee".into(),
        date_logged: Utc::now(),
        component: "chat-widget".into(),
        description: "Export button hangs on long threads".into(),
        severity: Severity::Critical,
        status: DebugStatus::Open,
        fix_reference: Some("PR #418".into()),
        logged_by: "qa-bot".into(),
    }
);

roundtrip_and_validate!(
    new_debug_log_roundtrip,
    NewDebugLog,
    NewDebugLog {
        component: "onboarding".into(),
        description: "Step 3 skips validation".into(),
        severity: Severity::Minor,
        logged_by: "sam".into(),
    }
);

#[test]
fn collections_serialize_snake_case() {
    assert_eq!(
        serde_json::to_value(Collection::BuildRequests).unwrap(),
        serde_json::json!("build_requests")
    );
    assert_eq!(Collection::SYNCED.len(), 3);
    assert!(!Collection::SYNCED.contains(&Collection::Activity));
}

#[test]
fn critical_open_predicate() {
    let base = DebugLog {
        id: "dbg-1".into(),
        date_logged: Utc::now(),
        component: "api".into(),
        description: String::new(),
        severity: Severity::Critical,
        status: DebugStatus::InProgress,
        fix_reference: None,
        logged_by: String::new(),
    };
    assert!(base.is_critical_open());
    assert!(
        !DebugLog {
            status: DebugStatus::Fixed,
            ..base.clone()
        }
        .is_critical_open()
    );
    assert!(
        !DebugLog {
            severity: Severity::Major,
            ..base
        }
        .is_critical_open()
    );
}
