//! One collection's authoritative rows and its pending optimistic writes.
//!
//! Local writes land in the table immediately and are remembered as pending.
//! A refetch replaces the rows wholesale, then re-applies every pending write
//! the remote result does not yet show, so a refetch that raced a write cannot
//! silently discard it.
//!
//! A pending write leaves the set when:
//! - its remote call fails (rolled back),
//! - a refetch after acknowledgement observes it (confirmed),
//! - it has been re-asserted `max_reassertions` times after acknowledgement
//!   without being observed (expired, remote wins).

use std::collections::{HashMap, HashSet};

use tracing::warn;
use waypoint_core::entities::{BuildRequest, DebugLog, Task};

/// A row type the table can hold.
pub trait Record: Clone + Send + 'static {
    fn id(&self) -> &str;

    /// Whether `remote` shows that this local write has landed.
    fn confirmed_by(&self, remote: &Self) -> bool;
}

impl Record for Task {
    fn id(&self) -> &str {
        &self.id
    }

    fn confirmed_by(&self, remote: &Self) -> bool {
        // A strictly newer remote row means someone wrote after us.
        remote.updated_at > self.updated_at
            || (remote.status == self.status
                && remote.reported_progress == self.reported_progress
                && remote.title == self.title
                && remote.description == self.description)
    }
}

impl Record for BuildRequest {
    fn id(&self) -> &str {
        &self.id
    }

    fn confirmed_by(&self, remote: &Self) -> bool {
        remote.lane == self.lane && remote.name == self.name
    }
}

impl Record for DebugLog {
    fn id(&self) -> &str {
        &self.id
    }

    fn confirmed_by(&self, remote: &Self) -> bool {
        remote.status == self.status && remote.fix_reference == self.fix_reference
    }
}

#[derive(Debug, Clone)]
enum PendingOp<T> {
    Upsert(T),
    Delete,
}

#[derive(Debug, Clone)]
struct PendingWrite<T> {
    seq: u64,
    id: String,
    op: PendingOp<T>,
    /// Row as it was before this write, restored on rollback.
    before: Option<T>,
    acknowledged: bool,
    reassertions: u32,
}

/// Counts from applying one refetched batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceSummary {
    pub rows: usize,
    pub reasserted: usize,
    pub confirmed: usize,
    pub expired: usize,
}

#[derive(Debug)]
pub struct CollectionTable<T> {
    rows: Vec<T>,
    pending: Vec<PendingWrite<T>>,
    next_seq: u64,
}

impl<T: Record> Default for CollectionTable<T> {
    fn default() -> Self {
        Self::from_rows(Vec::new())
    }
}

impl<T: Record> CollectionTable<T> {
    #[must_use]
    pub const fn from_rows(rows: Vec<T>) -> Self {
        Self {
            rows,
            pending: Vec::new(),
            next_seq: 0,
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&T> {
        self.rows.iter().find(|r| r.id() == id)
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Apply an insert or replacement now. Returns the write's sequence number.
    pub fn upsert_local(&mut self, record: T) -> u64 {
        let id = record.id().to_string();
        let before = self.put(record.clone());
        self.push_pending(id, PendingOp::Upsert(record), before)
    }

    /// Remove a row now. Returns `None` if no such row exists.
    pub fn delete_local(&mut self, id: &str) -> Option<u64> {
        let before = self.remove(id)?;
        Some(self.push_pending(id.to_string(), PendingOp::Delete, Some(before)))
    }

    /// The remote accepted write `seq`; keep it until a refetch observes it.
    pub fn acknowledge(&mut self, seq: u64) {
        let Some(idx) = self.position(seq) else {
            return;
        };
        let superseded = self.pending[idx + 1..]
            .iter()
            .any(|newer| newer.id == self.pending[idx].id);
        if superseded {
            self.pending.remove(idx);
        } else {
            self.pending[idx].acknowledged = true;
        }
    }

    /// The remote refused write `seq`; undo it.
    ///
    /// If a newer write to the same row is still pending, the table keeps
    /// showing that one and inherits this write's `before` snapshot.
    pub fn rollback(&mut self, seq: u64) {
        let Some(idx) = self.position(seq) else {
            return;
        };
        let write = self.pending.remove(idx);
        if let Some(newer) = self.pending[idx..].iter_mut().find(|p| p.id == write.id) {
            newer.before = write.before;
            return;
        }
        match write.before {
            Some(previous) => {
                self.put(previous);
            }
            None => {
                self.remove(&write.id);
            }
        }
    }

    /// Replace every row with a refetched batch, then re-apply pending writes.
    ///
    /// `merge` sees the previous local row (if any) for each incoming row that
    /// has no pending write, and decides what the table keeps.
    pub fn replace(
        &mut self,
        incoming: Vec<T>,
        max_reassertions: u32,
        merge: impl Fn(Option<&T>, T) -> T,
    ) -> ReplaceSummary {
        let pending_ids: HashSet<&str> = self.pending.iter().map(|p| p.id.as_str()).collect();
        let mut previous: HashMap<String, T> = std::mem::take(&mut self.rows)
            .into_iter()
            .map(|row| (row.id().to_string(), row))
            .collect();

        let rows: Vec<T> = incoming
            .into_iter()
            .map(|row| {
                if pending_ids.contains(row.id()) {
                    row
                } else {
                    let prev = previous.remove(row.id());
                    merge(prev.as_ref(), row)
                }
            })
            .collect();
        drop(pending_ids);
        self.rows = rows;

        let mut summary = ReplaceSummary {
            rows: self.rows.len(),
            ..ReplaceSummary::default()
        };

        // Judge every write against the fresh remote rows before any is re-applied.
        let observed: Vec<bool> = self
            .pending
            .iter()
            .map(|w| w.acknowledged && self.observed(w))
            .collect();

        let pending = std::mem::take(&mut self.pending);
        for (mut write, seen) in pending.into_iter().zip(observed) {
            if seen {
                summary.confirmed += 1;
                continue;
            }
            if write.acknowledged {
                if write.reassertions >= max_reassertions {
                    warn!(
                        id = %write.id,
                        reassertions = write.reassertions,
                        "dropping optimistic write never observed remotely"
                    );
                    summary.expired += 1;
                    continue;
                }
                write.reassertions += 1;
            }
            match &write.op {
                PendingOp::Upsert(record) => {
                    self.put(record.clone());
                }
                PendingOp::Delete => {
                    self.remove(&write.id);
                }
            }
            summary.reasserted += 1;
            self.pending.push(write);
        }
        summary
    }

    fn observed(&self, write: &PendingWrite<T>) -> bool {
        match &write.op {
            PendingOp::Upsert(local) => self
                .get(&write.id)
                .is_some_and(|remote| local.confirmed_by(remote)),
            PendingOp::Delete => self.get(&write.id).is_none(),
        }
    }

    fn position(&self, seq: u64) -> Option<usize> {
        self.pending.iter().position(|p| p.seq == seq)
    }

    fn push_pending(&mut self, id: String, op: PendingOp<T>, before: Option<T>) -> u64 {
        // The new write carries the row's latest state; acknowledged ones
        // before it have nothing left to re-assert.
        self.pending.retain(|p| !(p.acknowledged && p.id == id));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(PendingWrite {
            seq,
            id,
            op,
            before,
            acknowledged: false,
            reassertions: 0,
        });
        seq
    }

    /// Insert or replace by id. New rows go first. Returns the replaced row.
    fn put(&mut self, record: T) -> Option<T> {
        match self.rows.iter_mut().find(|r| r.id() == record.id()) {
            Some(slot) => Some(std::mem::replace(slot, record)),
            None => {
                self.rows.insert(0, record);
                None
            }
        }
    }

    fn remove(&mut self, id: &str) -> Option<T> {
        let idx = self.rows.iter().position(|r| r.id() == id)?;
        Some(self.rows.remove(idx))
    }
}
