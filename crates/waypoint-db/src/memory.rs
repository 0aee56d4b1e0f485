//! In-process document store with real-time push.
//!
//! Every write broadcasts the collection name to all subscribers. The store
//! also exposes fault knobs (offline, rejected writes, query latency) so it
//! can stand in for a flaky or slow remote in tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use waypoint_core::enums::Collection;
use waypoint_core::ids::generate_id;
use waypoint_core::rows::Row;

use crate::adapter::{PersistenceAdapter, QueryFilter, Subscription};
use crate::error::DatabaseError;
use crate::helpers::recency_key;

const CHANNEL_CAPACITY: usize = 64;
const GENERATED_ID_PREFIX: &str = "doc";

#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    offline: bool,
    reject_writes: bool,
    query_delay: Duration,
}

#[derive(Debug)]
struct Inner {
    collections: Mutex<HashMap<Collection, BTreeMap<String, Row>>>,
    changes: broadcast::Sender<Collection>,
    faults: Mutex<Faults>,
    queries: AtomicU64,
}

/// Cloneable handle to a shared in-memory document store.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    inner: Arc<Inner>,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                collections: Mutex::new(HashMap::new()),
                changes,
                faults: Mutex::new(Faults::default()),
                queries: AtomicU64::new(0),
            }),
        }
    }

    /// Make every operation fail with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.inner.faults.lock().offline = offline;
    }

    /// Make inserts, updates, and deletes fail with `Rejected`.
    pub fn set_reject_writes(&self, reject: bool) {
        self.inner.faults.lock().reject_writes = reject;
    }

    /// Delay every query by `delay` before it reads the collection.
    pub fn set_query_delay(&self, delay: Duration) {
        self.inner.faults.lock().query_delay = delay;
    }

    /// Number of queries served so far, including failed ones.
    #[must_use]
    pub fn query_count(&self) -> u64 {
        self.inner.queries.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.inner
            .collections
            .lock()
            .get(&collection)
            .map_or(0, BTreeMap::len)
    }

    #[must_use]
    pub fn get(&self, collection: Collection, id: &str) -> Option<Row> {
        self.inner
            .collections
            .lock()
            .get(&collection)
            .and_then(|rows| rows.get(id).cloned())
    }

    /// Store a row exactly as given, bypassing faults, and notify subscribers.
    ///
    /// Stands in for a write made by another client of the remote store.
    pub fn put_raw(&self, collection: Collection, id: impl Into<String>, row: Row) {
        self.inner
            .collections
            .lock()
            .entry(collection)
            .or_default()
            .insert(id.into(), row);
        self.notify(collection);
    }

    /// Broadcast a change signal without touching any row.
    pub fn notify(&self, collection: Collection) {
        // No receivers is fine: nobody is subscribed yet.
        let _ = self.inner.changes.send(collection);
    }

    fn faults(&self) -> Faults {
        *self.inner.faults.lock()
    }

    fn check_write(&self) -> Result<(), DatabaseError> {
        let faults = self.faults();
        if faults.offline {
            return Err(DatabaseError::Connection("document store offline".into()));
        }
        if faults.reject_writes {
            return Err(DatabaseError::Rejected("document store rejected write".into()));
        }
        Ok(())
    }
}

fn touch(row: &mut Row) {
    if !row.contains_key("updated_at") && !row.contains_key("updatedAt") {
        row.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
    }
}

impl PersistenceAdapter for DocumentStore {
    fn supports_push(&self) -> bool {
        true
    }

    fn subscribe(&self, collection: Collection) -> Result<Option<Subscription>, DatabaseError> {
        if self.faults().offline {
            return Err(DatabaseError::Connection("document store offline".into()));
        }
        Ok(Some(Subscription::new(
            collection,
            self.inner.changes.subscribe(),
        )))
    }

    async fn query(
        &self,
        collection: Collection,
        filter: &QueryFilter,
    ) -> Result<Vec<Row>, DatabaseError> {
        self.inner.queries.fetch_add(1, Ordering::SeqCst);
        let faults = self.faults();
        if !faults.query_delay.is_zero() {
            tokio::time::sleep(faults.query_delay).await;
        }
        if faults.offline || self.faults().offline {
            return Err(DatabaseError::Connection("document store offline".into()));
        }

        let mut rows: Vec<Row> = self
            .inner
            .collections
            .lock()
            .get(&collection)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        rows.sort_by_key(|row| std::cmp::Reverse(recency_key(row)));
        rows.truncate(usize::try_from(filter.limit).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn insert(&self, collection: Collection, mut row: Row) -> Result<String, DatabaseError> {
        self.check_write()?;
        let id = match row.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => generate_id(GENERATED_ID_PREFIX).map_err(|e| DatabaseError::Other(e.into()))?,
        };
        row.insert("id".into(), Value::String(id.clone()));
        touch(&mut row);

        {
            let mut collections = self.inner.collections.lock();
            let rows = collections.entry(collection).or_default();
            if rows.contains_key(&id) {
                return Err(DatabaseError::Rejected(format!(
                    "{collection} row {id} already exists"
                )));
            }
            rows.insert(id.clone(), row);
        }
        self.notify(collection);
        Ok(id)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        mut patch: Row,
    ) -> Result<bool, DatabaseError> {
        self.check_write()?;
        patch.remove("id");
        touch(&mut patch);

        let found = {
            let mut collections = self.inner.collections.lock();
            match collections.get_mut(&collection).and_then(|rows| rows.get_mut(id)) {
                Some(existing) => {
                    existing.extend(patch);
                    true
                }
                None => false,
            }
        };
        if found {
            self.notify(collection);
        }
        Ok(found)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, DatabaseError> {
        self.check_write()?;
        let removed = self
            .inner
            .collections
            .lock()
            .get_mut(&collection)
            .and_then(|rows| rows.remove(id))
            .is_some();
        if removed {
            self.notify(collection);
        }
        Ok(removed)
    }
}
