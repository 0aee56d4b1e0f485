//! The persistence adapter interface shared by every backend.
//!
//! A backend is an opaque row store with four operations plus an optional
//! push channel. Push is an optimization: a backend without it returns `None`
//! from [`PersistenceAdapter::subscribe`] and the sync layer relies on polling
//! alone.

use std::future::Future;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use waypoint_core::enums::Collection;
use waypoint_core::rows::Row;

use crate::error::DatabaseError;

/// Bounds on a collection query. Results are always most-recently-updated first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryFilter {
    pub limit: u32,
}

impl QueryFilter {
    #[must_use]
    pub const fn page(limit: u32) -> Self {
        Self { limit }
    }
}

pub trait PersistenceAdapter: Send + Sync + 'static {
    /// Whether [`Self::subscribe`] can deliver change notifications.
    fn supports_push(&self) -> bool;

    /// Open a change subscription for `collection`, if the backend supports push.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Connection` if the push channel cannot be opened.
    fn subscribe(&self, collection: Collection) -> Result<Option<Subscription>, DatabaseError>;

    /// Fetch up to `filter.limit` rows, most recently updated first.
    fn query(
        &self,
        collection: Collection,
        filter: &QueryFilter,
    ) -> impl Future<Output = Result<Vec<Row>, DatabaseError>> + Send;

    /// Insert a row and return its id. A row carrying an `id` keeps it.
    fn insert(
        &self,
        collection: Collection,
        row: Row,
    ) -> impl Future<Output = Result<String, DatabaseError>> + Send;

    /// Merge `patch` into the row with `id`. Returns `false` if no such row exists.
    fn update(
        &self,
        collection: Collection,
        id: &str,
        patch: Row,
    ) -> impl Future<Output = Result<bool, DatabaseError>> + Send;

    /// Remove the row with `id`. Returns `false` if no such row exists.
    fn delete(
        &self,
        collection: Collection,
        id: &str,
    ) -> impl Future<Output = Result<bool, DatabaseError>> + Send;
}

/// A live change subscription for one collection.
///
/// Notifications carry no payload: each one only means "refetch needed".
/// Dropping the subscription or calling [`Subscription::unsubscribe`]
/// releases it; both are idempotent.
#[derive(Debug)]
pub struct Subscription {
    collection: Collection,
    rx: Option<broadcast::Receiver<Collection>>,
}

impl Subscription {
    #[must_use]
    pub const fn new(collection: Collection, rx: broadcast::Receiver<Collection>) -> Self {
        Self {
            collection,
            rx: Some(rx),
        }
    }

    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    /// Wait for the next change to this collection.
    ///
    /// Returns `false` once the subscription is closed, either by
    /// `unsubscribe` or because the backend went away. A lagged receiver
    /// reports a change: missed signals collapse into one refetch.
    pub async fn changed(&mut self) -> bool {
        let collection = self.collection;
        let Some(rx) = self.rx.as_mut() else {
            return false;
        };
        let changed = loop {
            match rx.recv().await {
                Ok(c) if c == collection => break true,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => break true,
                Err(RecvError::Closed) => break false,
            }
        };
        if !changed {
            self.rx = None;
        }
        changed
    }

    pub fn unsubscribe(&mut self) {
        self.rx = None;
    }
}
