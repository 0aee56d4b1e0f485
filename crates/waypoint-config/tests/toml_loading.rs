//! Integration tests for TOML and environment configuration loading.
//!
//! Uses figment::Jail for sandboxed file and env var manipulation.

use figment::{
    Figment, Jail,
    providers::{Env, Format, Serialized, Toml},
};
use pretty_assertions::assert_eq;
use waypoint_config::{BackendKind, WaypointConfig};

#[test]
fn loads_sync_config_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[sync]
poll_interval_ms = 3000
page_size = 25
backoff_max_ms = 30000
max_reassertions = 2
recent_window_hours = 48
"#,
        )?;

        let config: WaypointConfig = Figment::from(Serialized::defaults(WaypointConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.sync.poll_interval_ms, 3000);
        assert_eq!(config.sync.page_size, 25);
        assert_eq!(config.sync.backoff_max_ms, 30_000);
        assert_eq!(config.sync.max_reassertions, 2);
        assert_eq!(config.sync.recent_window_hours, 48);
        assert_eq!(config.progress.assumed_duration_secs, 300);
        Ok(())
    });
}

#[test]
fn loads_backend_and_cache_from_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[backend]
kind = "sql"
sql_path = "./tracker.db"

[cache]
enabled = false
"#,
        )?;

        let config: WaypointConfig = Figment::from(Serialized::defaults(WaypointConfig::default()))
            .merge(Toml::file("config.toml"))
            .extract()?;

        assert_eq!(config.backend.kind, BackendKind::Sql);
        assert!(!config.backend.supports_push());
        assert_eq!(config.backend.sql_path, "./tracker.db");
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.resolved_path(), None);
        Ok(())
    });
}

#[test]
fn project_file_is_picked_up_by_load() {
    Jail::expect_with(|jail| {
        jail.create_dir(".waypoint")?;
        jail.create_file(
            ".waypoint/config.toml",
            r#"
[progress]
assumed_duration_secs = 120
ceiling = 90
"#,
        )?;

        let config = WaypointConfig::load().expect("config loads");
        assert_eq!(config.progress.assumed_duration_secs, 120);
        assert_eq!(config.progress.ceiling, 90);
        Ok(())
    });
}

#[test]
fn env_overrides_toml() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[sync]
poll_interval_ms = 3000
"#,
        )?;
        jail.set_env("WAYPOINT_SYNC__POLL_INTERVAL_MS", "5000");
        jail.set_env("WAYPOINT_BACKEND__KIND", "sql");

        let config: WaypointConfig = Figment::from(Serialized::defaults(WaypointConfig::default()))
            .merge(Toml::file("config.toml"))
            .merge(Env::prefixed("WAYPOINT_").split("__"))
            .extract()?;

        assert_eq!(config.sync.poll_interval_ms, 5000);
        assert_eq!(config.backend.kind, BackendKind::Sql);
        Ok(())
    });
}

#[test]
fn load_rejects_invalid_values() {
    Jail::expect_with(|jail| {
        jail.set_env("WAYPOINT_SYNC__PAGE_SIZE", "0");
        let err = WaypointConfig::load().unwrap_err();
        assert!(err.to_string().contains("sync.page_size"));
        Ok(())
    });
}
