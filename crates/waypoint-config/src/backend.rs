//! Persistence backend selection.

use serde::{Deserialize, Serialize};

/// Which row store backs the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Document store with real-time push notifications.
    #[default]
    Document,
    /// libSQL row store, request/response only (polled).
    Sql,
}

fn default_sql_path() -> String {
    ":memory:".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    /// Database path for the `sql` backend, or `":memory:"`.
    #[serde(default = "default_sql_path")]
    pub sql_path: String,

    /// Populate the document store with sample rows on startup.
    #[serde(default)]
    pub seed: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            sql_path: default_sql_path(),
            seed: false,
        }
    }
}

impl BackendConfig {
    #[must_use]
    pub fn supports_push(&self) -> bool {
        self.kind == BackendKind::Document
    }
}
