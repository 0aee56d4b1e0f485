//! Push/poll coordinator.
//!
//! One worker per synced collection waits on three triggers: a push
//! notification (when the backend supports it), a nudge after a local write,
//! and the poll deadline. Each trigger runs a full refetch through the shared
//! in-flight guard, so at most one refetch per collection is ever running and
//! bursts of triggers collapse into one.
//!
//! The poll deadline only moves on poll ticks: pushes and nudges never delay
//! the next poll. After `n` consecutive failed refetches the poll delay grows
//! to `min(interval * 2^n, backoff_max)`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use waypoint_core::entities::Task;
use waypoint_core::enums::{Collection, TaskStatus};
use waypoint_core::errors::CoreError;
use waypoint_core::progress::ProgressEstimator;
use waypoint_core::rows::{Row, build_request_from_row, debug_log_from_row, task_from_row};
use waypoint_db::{PersistenceAdapter, QueryFilter, RetryConfig, Subscription};

use crate::status::RefetchOutcome;
use crate::store::{Shared, State};
use crate::table::ReplaceSummary;

/// Handle to the running workers. Dropping it cancels them.
#[derive(Debug)]
pub(crate) struct RemoteSync {
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl RemoteSync {
    pub(crate) fn start<A: PersistenceAdapter>(shared: &Arc<Shared<A>>) -> Self {
        let cancel = CancellationToken::new();
        let workers = Collection::SYNCED
            .iter()
            .map(|&collection| {
                let sub = shared.open_subscription(collection);
                tokio::spawn(run_worker(
                    Arc::clone(shared),
                    collection,
                    sub,
                    cancel.child_token(),
                ))
            })
            .collect();
        Self { cancel, workers }
    }

    /// Cancel every worker and wait for it to finish.
    pub(crate) async fn shutdown(mut self) {
        self.cancel.cancel();
        for handle in self.workers.drain(..) {
            if let Err(error) = handle.await
                && !error.is_cancelled()
            {
                warn!(%error, "sync worker ended abnormally");
            }
        }
    }
}

impl Drop for RemoteSync {
    fn drop(&mut self) {
        self.cancel.cancel();
        for handle in &self.workers {
            handle.abort();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wake {
    Cancelled,
    Push,
    PushClosed,
    Nudge,
    Poll,
}

async fn next_change(sub: &mut Option<Subscription>) -> bool {
    match sub {
        Some(sub) => sub.changed().await,
        None => std::future::pending().await,
    }
}

async fn run_worker<A: PersistenceAdapter>(
    shared: Arc<Shared<A>>,
    collection: Collection,
    mut sub: Option<Subscription>,
    cancel: CancellationToken,
) {
    let Some(channel) = shared.channel(collection) else {
        return;
    };
    let retry = RetryConfig::from_sync(&shared.config);
    // First pass refetches immediately.
    let mut next_poll = Instant::now();
    debug!(%collection, push = sub.is_some(), "sync worker started");

    loop {
        let wake = tokio::select! {
            biased;
            () = cancel.cancelled() => Wake::Cancelled,
            changed = next_change(&mut sub) => {
                if changed { Wake::Push } else { Wake::PushClosed }
            }
            () = channel.nudge.notified() => Wake::Nudge,
            () = tokio::time::sleep_until(next_poll) => Wake::Poll,
        };

        match wake {
            Wake::Cancelled => break,
            Wake::PushClosed => {
                debug!(%collection, "push subscription ended, polling only");
                sub = None;
                shared.state.lock().status_mut(collection).push = false;
                continue;
            }
            Wake::Poll if sub.is_none() && shared.adapter.supports_push() => {
                sub = shared.open_subscription(collection);
            }
            Wake::Push | Wake::Nudge | Wake::Poll => {}
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = shared.refetch(collection) => outcome,
        };
        debug!(%collection, ?wake, ?outcome, "refetch finished");

        if wake == Wake::Poll {
            next_poll = Instant::now() + retry.delay_for(shared.consecutive_failures(collection));
        }
    }

    if let Some(mut sub) = sub {
        sub.unsubscribe();
    }
    debug!(%collection, "sync worker stopped");
}

/// Clears the in-flight flag when the refetch ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<A: PersistenceAdapter> Shared<A> {
    /// Open the push channel for `collection`, if the backend has one.
    ///
    /// A failure is recorded on the status and sync continues by polling.
    pub(crate) fn open_subscription(&self, collection: Collection) -> Option<Subscription> {
        let sub = if self.adapter.supports_push() {
            match self.adapter.subscribe(collection) {
                Ok(sub) => sub,
                Err(error) => {
                    warn!(%collection, %error, "push subscription failed, polling only");
                    let now = self.now();
                    self.state
                        .lock()
                        .status_mut(collection)
                        .record_failure(&error, now);
                    None
                }
            }
        } else {
            None
        };

        self.state.lock().status_mut(collection).push = sub.is_some();
        sub
    }

    /// Run one full refetch of `collection` and replace it wholesale.
    pub(crate) async fn refetch(&self, collection: Collection) -> RefetchOutcome {
        if self.is_closed() {
            return RefetchOutcome::Discarded;
        }
        let Some(channel) = self.channel(collection) else {
            debug!(%collection, "collection is not synced");
            return RefetchOutcome::Discarded;
        };
        let Some(_guard) = InFlight::acquire(&channel.in_flight) else {
            debug!(%collection, "refetch already in flight, suppressing");
            return RefetchOutcome::Suppressed;
        };

        let result = self
            .adapter
            .query(collection, &QueryFilter::page(self.config.page_size))
            .await;

        let now = self.now();
        let outcome = {
            let mut state = self.state.lock();
            // Checked under the lock so a concurrent close cannot interleave.
            if self.is_closed() {
                debug!(%collection, "store closed during refetch, discarding result");
                return RefetchOutcome::Discarded;
            }
            match result {
                Ok(rows) => {
                    let (summary, dropped) = self.apply(&mut state, collection, &rows, now);
                    debug!(
                        %collection,
                        rows = summary.rows,
                        dropped,
                        reasserted = summary.reasserted,
                        confirmed = summary.confirmed,
                        expired = summary.expired,
                        "applied refetch"
                    );
                    state.status_mut(collection).record_success(now, dropped);
                    RefetchOutcome::Applied
                }
                Err(error) => {
                    warn!(%collection, %error, "refetch failed");
                    state.status_mut(collection).record_failure(&error, now);
                    RefetchOutcome::Failed
                }
            }
        };

        if outcome == RefetchOutcome::Applied && collection == Collection::Tasks {
            self.save_cache();
        }
        outcome
    }

    fn apply(
        &self,
        state: &mut State,
        collection: Collection,
        rows: &[Row],
        now: DateTime<Utc>,
    ) -> (ReplaceSummary, usize) {
        let max = self.config.max_reassertions;
        match collection {
            Collection::Tasks => {
                let (parsed, dropped) = parse_batch(collection, rows, |row| {
                    task_from_row(row, &self.estimator, now)
                });
                let estimator = self.estimator;
                let summary = state.tasks.replace(parsed, max, |prev, incoming| {
                    reconcile_task(prev, incoming, &estimator)
                });
                (summary, dropped)
            }
            Collection::BuildRequests => {
                let (parsed, dropped) = parse_batch(collection, rows, build_request_from_row);
                let summary = state.build_requests.replace(parsed, max, |_, incoming| incoming);
                (summary, dropped)
            }
            Collection::DebugLogs => {
                let (parsed, dropped) = parse_batch(collection, rows, debug_log_from_row);
                let summary = state.debug_logs.replace(parsed, max, |_, incoming| incoming);
                (summary, dropped)
            }
            Collection::Activity => (ReplaceSummary::default(), 0),
        }
    }
}

/// Parse every row, dropping (and logging) the ones that fail.
fn parse_batch<T>(
    collection: Collection,
    rows: &[Row],
    parse: impl Fn(&Row) -> Result<T, CoreError>,
) -> (Vec<T>, usize) {
    let mut dropped = 0;
    let parsed = rows
        .iter()
        .filter_map(|row| match parse(row) {
            Ok(record) => Some(record),
            Err(error) => {
                dropped += 1;
                warn!(%collection, id = ?row.get("id"), %error, "dropping malformed row");
                None
            }
        })
        .collect();
    (parsed, dropped)
}

/// Decide what the table keeps when a refetched task replaces a local one.
///
/// A locally terminal task stays terminal, and an in-progress task never
/// shows less progress than it already did.
fn reconcile_task(prev: Option<&Task>, incoming: Task, estimator: &ProgressEstimator) -> Task {
    let Some(prev) = prev else {
        return incoming;
    };
    if prev.status.is_terminal() && !incoming.status.is_terminal() {
        warn!(
            id = %prev.id,
            local = %prev.status,
            remote = %incoming.status,
            "ignoring refetched status that leaves a terminal state"
        );
        return Task {
            status: prev.status,
            progress: 100,
            estimated_remaining_minutes: None,
            ..incoming
        };
    }
    if prev.status == TaskStatus::InProgress
        && incoming.status == TaskStatus::InProgress
        && prev.progress > incoming.progress
    {
        return Task {
            progress: prev.progress,
            estimated_remaining_minutes: Some(estimator.remaining_minutes(prev.progress)),
            ..incoming
        };
    }
    incoming
}
