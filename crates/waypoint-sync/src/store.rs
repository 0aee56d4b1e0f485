//! The task store: authoritative in-memory tables plus their lifecycle.
//!
//! Per-entity operations live in `repos/`; the push/poll coordinator lives in
//! `sync`. Every table mutation goes through the single `State` mutex, which
//! is never held across an adapter call.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Notify;
use waypoint_config::{SyncConfig, WaypointConfig};
use waypoint_core::entities::{BuildRequest, DebugLog, Task};
use waypoint_core::enums::Collection;
use waypoint_core::ids::{PREFIX_ACTIVITY, generate_id};
use waypoint_core::progress::ProgressEstimator;
use waypoint_db::PersistenceAdapter;

use crate::cache::LocalCache;
use crate::clock::{Clock, SystemClock};
use crate::error::SyncError;
use crate::status::{CollectionStatus, RefetchOutcome, SyncPhase};
use crate::sync::RemoteSync;
use crate::table::CollectionTable;

/// Everything guarded by the store's one mutex.
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) tasks: CollectionTable<Task>,
    pub(crate) build_requests: CollectionTable<BuildRequest>,
    pub(crate) debug_logs: CollectionTable<DebugLog>,
    status: HashMap<Collection, CollectionStatus>,
}

impl State {
    fn new(cached_tasks: Vec<Task>) -> Self {
        Self {
            tasks: CollectionTable::from_rows(cached_tasks),
            build_requests: CollectionTable::default(),
            debug_logs: CollectionTable::default(),
            status: Collection::SYNCED
                .iter()
                .map(|&c| (c, CollectionStatus::new(c)))
                .collect(),
        }
    }

    pub(crate) fn status_mut(&mut self, collection: Collection) -> &mut CollectionStatus {
        self.status
            .entry(collection)
            .or_insert_with(|| CollectionStatus::new(collection))
    }

    pub(crate) fn pending_len(&self, collection: Collection) -> usize {
        match collection {
            Collection::Tasks => self.tasks.pending_len(),
            Collection::BuildRequests => self.build_requests.pending_len(),
            Collection::DebugLogs => self.debug_logs.pending_len(),
            Collection::Activity => 0,
        }
    }

    fn acknowledge(&mut self, collection: Collection, seq: u64) {
        match collection {
            Collection::Tasks => self.tasks.acknowledge(seq),
            Collection::BuildRequests => self.build_requests.acknowledge(seq),
            Collection::DebugLogs => self.debug_logs.acknowledge(seq),
            Collection::Activity => {}
        }
    }

    fn rollback(&mut self, collection: Collection, seq: u64) {
        match collection {
            Collection::Tasks => self.tasks.rollback(seq),
            Collection::BuildRequests => self.build_requests.rollback(seq),
            Collection::DebugLogs => self.debug_logs.rollback(seq),
            Collection::Activity => {}
        }
    }
}

/// Per-collection coordination shared between the store and its worker.
#[derive(Debug, Default)]
pub(crate) struct Channel {
    pub(crate) in_flight: AtomicBool,
    pub(crate) nudge: Notify,
}

/// State shared by the store handle and the sync workers.
pub(crate) struct Shared<A> {
    pub(crate) adapter: A,
    pub(crate) state: Mutex<State>,
    pub(crate) estimator: ProgressEstimator,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: SyncConfig,
    pub(crate) cache: Option<LocalCache>,
    channels: HashMap<Collection, Channel>,
    started: AtomicBool,
    closed: AtomicBool,
}

impl<A: PersistenceAdapter> Shared<A> {
    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Current phase, derived from the lifecycle flags and the in-flight guard.
    pub(crate) fn phase(&self, collection: Collection) -> SyncPhase {
        if self.is_closed() {
            SyncPhase::Closed
        } else if self
            .channel(collection)
            .is_some_and(|c| c.in_flight.load(Ordering::Acquire))
        {
            SyncPhase::Refetching
        } else if self.started.load(Ordering::Acquire) {
            SyncPhase::Subscribed
        } else {
            SyncPhase::Idle
        }
    }

    pub(crate) fn channel(&self, collection: Collection) -> Option<&Channel> {
        self.channels.get(&collection)
    }

    /// Ask the collection's worker for a refetch. Stored until the worker waits.
    pub(crate) fn nudge(&self, collection: Collection) {
        if let Some(channel) = self.channel(collection) {
            channel.nudge.notify_one();
        }
    }

    pub(crate) fn consecutive_failures(&self, collection: Collection) -> u32 {
        self.state.lock().status_mut(collection).consecutive_failures
    }

    /// Mirror the current task table to the local cache. Failures are logged.
    pub(crate) fn save_cache(&self) {
        let Some(cache) = &self.cache else {
            return;
        };
        let tasks = self.state.lock().tasks.rows().to_vec();
        if let Err(error) = cache.save(&tasks) {
            tracing::warn!(path = %cache.path().display(), %error, "failed to write task cache");
        }
    }
}

/// Builder for [`TaskStore`] with injectable clock, estimator, and cache.
pub struct TaskStoreBuilder<A> {
    adapter: A,
    config: SyncConfig,
    estimator: ProgressEstimator,
    clock: Arc<dyn Clock>,
    cache: Option<LocalCache>,
}

impl<A: PersistenceAdapter> TaskStoreBuilder<A> {
    #[must_use]
    pub fn new(adapter: A) -> Self {
        Self {
            adapter,
            config: SyncConfig::default(),
            estimator: ProgressEstimator::default(),
            clock: Arc::new(SystemClock),
            cache: None,
        }
    }

    #[must_use]
    pub fn sync_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn estimator(mut self, estimator: ProgressEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: Option<LocalCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Build the store, seeding the task table from the cache if one is set.
    ///
    /// On first run the cache has no file yet and the table starts with the
    /// placeholder task until the first refetch replaces it.
    #[must_use]
    pub fn build(self) -> TaskStore<A> {
        let cached = self.cache.as_ref().map(LocalCache::load).unwrap_or_default();
        if !cached.is_empty() {
            tracing::debug!(count = cached.len(), "loaded tasks from local cache");
        }
        let shared = Shared {
            adapter: self.adapter,
            state: Mutex::new(State::new(cached)),
            estimator: self.estimator,
            clock: self.clock,
            config: self.config,
            cache: self.cache,
            channels: Collection::SYNCED
                .iter()
                .map(|&c| (c, Channel::default()))
                .collect(),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        };
        TaskStore {
            shared: Arc::new(shared),
            sync: Mutex::new(None),
        }
    }
}

/// Authoritative local view of tasks, build requests, and debug logs, kept in
/// sync with a remote row store.
///
/// Create with [`TaskStore::new`] or [`TaskStore::builder`], call
/// [`TaskStore::start`] to begin push/poll sync, and [`TaskStore::close`] to
/// tear it down. Dropping the store also stops sync.
pub struct TaskStore<A: PersistenceAdapter> {
    pub(crate) shared: Arc<Shared<A>>,
    sync: Mutex<Option<RemoteSync>>,
}

impl<A: PersistenceAdapter> TaskStore<A> {
    /// Store configured from a loaded [`WaypointConfig`], on the system clock.
    #[must_use]
    pub fn new(adapter: A, config: &WaypointConfig) -> Self {
        Self::builder(adapter)
            .sync_config(config.sync.clone())
            .estimator(ProgressEstimator::new(
                config.progress.assumed_duration(),
                config.progress.ceiling,
            ))
            .cache(LocalCache::from_config(&config.cache))
            .build()
    }

    #[must_use]
    pub fn builder(adapter: A) -> TaskStoreBuilder<A> {
        TaskStoreBuilder::new(adapter)
    }

    /// The backing adapter.
    #[must_use]
    pub fn adapter(&self) -> &A {
        &self.shared.adapter
    }

    /// Start push subscriptions and poll timers for every synced collection.
    ///
    /// Must be called from within a Tokio runtime. Starting twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Closed` if the store has been closed.
    pub fn start(&self) -> Result<(), SyncError> {
        let mut sync = self.sync.lock();
        // Under the sync lock so a concurrent close cannot slip in between.
        self.ensure_open()?;
        if sync.is_none() {
            self.shared.started.store(true, Ordering::Release);
            *sync = Some(RemoteSync::start(&self.shared));
            tracing::info!(push = self.shared.adapter.supports_push(), "task sync started");
        }
        Ok(())
    }

    /// Stop sync and refuse further writes. Reads keep serving the last
    /// known state. Closing twice is a no-op.
    pub async fn close(&self) {
        let sync = {
            let mut sync = self.sync.lock();
            if self.shared.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            sync.take()
        };
        if let Some(sync) = sync {
            sync.shutdown().await;
        }
        // Workers are gone, so nothing can reopen a subscription past here.
        let mut state = self.shared.state.lock();
        for collection in Collection::SYNCED {
            state.status_mut(collection).push = false;
        }
        drop(state);
        tracing::info!("task store closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    #[must_use]
    pub fn status(&self, collection: Collection) -> CollectionStatus {
        let mut state = self.shared.state.lock();
        let pending = state.pending_len(collection);
        let mut status = state.status_mut(collection).clone();
        drop(state);
        status.pending_writes = pending;
        status.phase = self.shared.phase(collection);
        status
    }

    /// Status of every synced collection.
    #[must_use]
    pub fn statuses(&self) -> Vec<CollectionStatus> {
        Collection::SYNCED.iter().map(|&c| self.status(c)).collect()
    }

    /// Clear the sticky error on `collection`.
    pub fn dismiss_error(&self, collection: Collection) {
        self.shared.state.lock().status_mut(collection).dismiss_error();
    }

    /// Refetch `collection` now, sharing the in-flight guard with the worker.
    pub async fn refetch(&self, collection: Collection) -> RefetchOutcome {
        self.shared.refetch(collection).await
    }

    /// Append an entry to the activity collection without waiting for it.
    ///
    /// Failures are logged, never returned. Outside a Tokio runtime this only
    /// logs.
    pub fn record_activity(&self, kind: &str, detail: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!(kind, "no runtime, skipping activity entry");
            return;
        };
        let id = match generate_id(PREFIX_ACTIVITY) {
            Ok(id) => id,
            Err(error) => {
                tracing::warn!(kind, %error, "failed to generate activity id");
                return;
            }
        };
        let now = self.shared.now().to_rfc3339();
        let row = match json!({
            "id": id,
            "kind": kind,
            "detail": detail,
            "created_at": now,
            "updated_at": now,
        }) {
            Value::Object(map) => map,
            _ => return,
        };
        let shared = Arc::clone(&self.shared);
        let kind = kind.to_string();
        handle.spawn(async move {
            if let Err(error) = shared.adapter.insert(Collection::Activity, row).await {
                tracing::warn!(kind, %error, "failed to record activity");
            }
        });
    }

    pub(crate) fn ensure_open(&self) -> Result<(), SyncError> {
        if self.shared.is_closed() {
            Err(SyncError::Closed)
        } else {
            Ok(())
        }
    }

    /// Await a remote write for optimistic write `seq` and settle it.
    ///
    /// On success the write is acknowledged, the worker is nudged to refetch,
    /// and the task cache is refreshed. On failure the write is rolled back
    /// and the error returned.
    pub(crate) async fn commit(
        &self,
        collection: Collection,
        seq: u64,
        write: impl Future<Output = Result<(), SyncError>>,
    ) -> Result<(), SyncError> {
        match write.await {
            Ok(()) => {
                self.shared.state.lock().acknowledge(collection, seq);
                self.shared.nudge(collection);
                if collection == Collection::Tasks {
                    self.shared.save_cache();
                }
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%collection, %error, "remote write failed, rolling back");
                self.shared.state.lock().rollback(collection, seq);
                Err(error)
            }
        }
    }
}
