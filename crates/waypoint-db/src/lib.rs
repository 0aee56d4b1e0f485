//! # waypoint-db
//!
//! Persistence layer for Waypoint: the [`PersistenceAdapter`] interface and
//! its two backends.
//!
//! - [`DocumentStore`]: in-process document store with real-time push.
//! - [`SqlStore`]: libSQL row store, request/response only.
//!
//! [`Backend`] picks one at construction from [`BackendConfig`] and is itself
//! an adapter, so callers stay generic over a single type.

pub mod adapter;
pub mod error;
pub mod helpers;
pub mod memory;
mod migrations;
pub mod mock;
pub mod retry;
pub mod sql;

pub use adapter::{PersistenceAdapter, QueryFilter, Subscription};
pub use error::DatabaseError;
pub use memory::DocumentStore;
pub use retry::RetryConfig;
pub use sql::SqlStore;

use waypoint_config::{BackendConfig, BackendKind};
use waypoint_core::enums::Collection;
use waypoint_core::rows::Row;

/// The backend selected at construction.
#[derive(Debug, Clone)]
pub enum Backend {
    Document(DocumentStore),
    Sql(SqlStore),
}

impl Backend {
    /// Build the configured backend, seeding sample rows if `config.seed` is set.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the SQL database cannot be opened or
    /// seeding fails.
    pub async fn from_config(config: &BackendConfig) -> Result<Self, DatabaseError> {
        let backend = match config.kind {
            BackendKind::Document => Self::Document(DocumentStore::new()),
            BackendKind::Sql => Self::Sql(SqlStore::open_local(&config.sql_path).await?),
        };
        if config.seed {
            mock::seed(&backend).await?;
        }
        tracing::info!(kind = ?config.kind, push = backend.supports_push(), "backend ready");
        Ok(backend)
    }

    #[must_use]
    pub const fn as_document(&self) -> Option<&DocumentStore> {
        match self {
            Self::Document(store) => Some(store),
            Self::Sql(_) => None,
        }
    }
}

impl PersistenceAdapter for Backend {
    fn supports_push(&self) -> bool {
        match self {
            Self::Document(store) => store.supports_push(),
            Self::Sql(store) => store.supports_push(),
        }
    }

    fn subscribe(&self, collection: Collection) -> Result<Option<Subscription>, DatabaseError> {
        match self {
            Self::Document(store) => store.subscribe(collection),
            Self::Sql(store) => store.subscribe(collection),
        }
    }

    async fn query(
        &self,
        collection: Collection,
        filter: &QueryFilter,
    ) -> Result<Vec<Row>, DatabaseError> {
        match self {
            Self::Document(store) => store.query(collection, filter).await,
            Self::Sql(store) => store.query(collection, filter).await,
        }
    }

    async fn insert(&self, collection: Collection, row: Row) -> Result<String, DatabaseError> {
        match self {
            Self::Document(store) => store.insert(collection, row).await,
            Self::Sql(store) => store.insert(collection, row).await,
        }
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Row,
    ) -> Result<bool, DatabaseError> {
        match self {
            Self::Document(store) => store.update(collection, id, patch).await,
            Self::Sql(store) => store.update(collection, id, patch).await,
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, DatabaseError> {
        match self {
            Self::Document(store) => store.delete(collection, id).await,
            Self::Sql(store) => store.delete(collection, id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn from_config_selects_backend() {
        let document = Backend::from_config(&BackendConfig::default()).await.unwrap();
        assert!(document.supports_push());
        assert!(document.as_document().is_some());

        let sql = Backend::from_config(&BackendConfig {
            kind: BackendKind::Sql,
            ..BackendConfig::default()
        })
        .await
        .unwrap();
        assert!(!sql.supports_push());
        assert!(sql.subscribe(Collection::Tasks).unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn seed_flag_populates_either_backend() {
        for kind in [BackendKind::Document, BackendKind::Sql] {
            let backend = Backend::from_config(&BackendConfig {
                kind,
                seed: true,
                ..BackendConfig::default()
            })
            .await
            .unwrap();
            let rows = backend
                .query(Collection::Tasks, &QueryFilter::page(50))
                .await
                .unwrap();
            assert_eq!(rows.len(), 5, "{kind:?}");
        }
    }
}
