//! # waypoint-config
//!
//! Layered configuration loading for Waypoint using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`WAYPOINT_*` prefix, `__` as separator)
//! 2. Project-level `.waypoint/config.toml`
//! 3. User-level `~/.config/waypoint/config.toml`
//! 4. Built-in defaults
//!
//! # Environment Variable Mapping
//!
//! Figment maps `WAYPOINT_SYNC__POLL_INTERVAL_MS` -> `sync.poll_interval_ms`,
//! `WAYPOINT_BACKEND__KIND` -> `backend.kind`, etc.
//!
//! # Usage
//!
//! ```no_run
//! use waypoint_config::WaypointConfig;
//!
//! let config = WaypointConfig::load_with_dotenv().expect("config");
//! println!("polling every {:?}", config.sync.poll_interval());
//! ```

mod backend;
mod cache;
mod error;
mod progress;
mod sync;

pub use backend::{BackendConfig, BackendKind};
pub use cache::CacheConfig;
pub use error::ConfigError;
pub use progress::ProgressConfig;
pub use sync::SyncConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WaypointConfig {
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl WaypointConfig {
    /// Load configuration from all sources (TOML files + environment variables).
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration after reading `.env` from the current directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or add providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        let local_path = PathBuf::from(".waypoint/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("WAYPOINT_").split("__"))
    }

    /// Reject values the sync loop and estimator cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "sync.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.sync.page_size == 0 {
            return Err(ConfigError::invalid("sync.page_size", "must be greater than zero"));
        }
        if self.sync.backoff_max_ms < self.sync.poll_interval_ms {
            return Err(ConfigError::invalid(
                "sync.backoff_max_ms",
                "must not be below sync.poll_interval_ms",
            ));
        }
        if self.progress.assumed_duration_secs == 0 {
            return Err(ConfigError::invalid(
                "progress.assumed_duration_secs",
                "must be greater than zero",
            ));
        }
        if self.progress.ceiling > 99 {
            return Err(ConfigError::invalid(
                "progress.ceiling",
                "must be at most 99; only a terminal status reaches 100",
            ));
        }
        Ok(())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("waypoint").join("config.toml"))
    }
}
