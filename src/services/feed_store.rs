use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::domain::errors::{FeedError, FeedResult};
use crate::models::{compare_timestamps, NotificationRecord};

/// Load state of the feed, used to pick the panel the widget shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum FeedStatus {
    Loading,
    Ready,
    Error(String),
}

/// Read-only copy of the feed at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    pub items: Vec<NotificationRecord>,
    pub unread_count: usize,
    pub status: FeedStatus,
}

/// Result of [`FeedStore::replace_one`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Replaced,
    /// The stored record carries a newer `updated_at`; nothing changed
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// A read flag set locally, tagged with the version of the record it was set on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFlip {
    pub id: String,
    pub updated_at: String,
}

type Observer = Arc<dyn Fn(&FeedSnapshot) + Send + Sync>;

struct FeedState {
    items: Vec<NotificationRecord>,
    status: FeedStatus,
    torn_down: bool,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
}

impl FeedState {
    fn unread_count(&self) -> usize {
        self.items.iter().filter(|r| !r.read).count()
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            items: self.items.clone(),
            unread_count: self.unread_count(),
            status: self.status.clone(),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|r| r.id == id)
    }

    fn ensure_live(&self) -> FeedResult<()> {
        if self.torn_down {
            Err(FeedError::InvalidState)
        } else {
            Ok(())
        }
    }
}

/// Ordered notification list owned by one widget instance.
///
/// Cloning the handle shares the same feed. Observers are called after every
/// mutation that changed state, outside the internal lock, so they may read
/// the store again.
#[derive(Clone)]
pub struct FeedStore {
    state: Arc<Mutex<FeedState>>,
}

impl FeedStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FeedState {
                items: Vec::new(),
                status: FeedStatus::Loading,
                torn_down: false,
                observers: Vec::new(),
                next_observer: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        // Observers run outside the lock, so a poisoned guard still holds consistent data
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a mutation and notify observers if it reported a change
    fn mutate<T>(&self, f: impl FnOnce(&mut FeedState) -> FeedResult<(T, bool)>) -> FeedResult<T> {
        let (result, notify) = {
            let mut state = self.lock();
            state.ensure_live()?;
            let (result, changed) = f(&mut state)?;
            let notify = if changed {
                let observers: Vec<Observer> =
                    state.observers.iter().map(|(_, o)| Arc::clone(o)).collect();
                Some((state.snapshot(), observers))
            } else {
                None
            };
            (result, notify)
        };

        if let Some((snapshot, observers)) = notify {
            metrics::gauge!("notibell_unread_count").set(snapshot.unread_count as f64);
            for observer in observers {
                observer(&snapshot);
            }
        }

        Ok(result)
    }

    /// Replace the whole feed with the initial fetch result.
    /// Later duplicates of an id are dropped.
    pub fn replace_all(&self, items: Vec<NotificationRecord>) -> FeedResult<()> {
        self.mutate(|state| {
            let mut seen = HashSet::new();
            let mut unique = Vec::with_capacity(items.len());
            for record in items {
                if seen.insert(record.id.clone()) {
                    unique.push(record);
                } else {
                    tracing::warn!("Dropping duplicate notification {} from fetch result", record.id);
                }
            }
            state.items = unique;
            Ok(((), true))
        })
    }

    /// Insert a record at the front of the feed
    pub fn prepend(&self, record: NotificationRecord) -> FeedResult<()> {
        self.mutate(|state| {
            if state.position(&record.id).is_some() {
                return Err(FeedError::DuplicateId(record.id));
            }
            state.items.insert(0, record);
            Ok(((), true))
        })
    }

    /// Replace the record with `id` in place.
    ///
    /// A replacement older than the stored record (by `updated_at`) is
    /// skipped. One that is not strictly newer never flips `read` back to
    /// false, so a local mark-as-read survives a concurrent push update.
    pub fn replace_one(&self, id: &str, mut record: NotificationRecord) -> FeedResult<ReplaceOutcome> {
        self.mutate(|state| {
            if record.id != id {
                return Err(FeedError::IdMismatch {
                    expected: id.to_string(),
                    found: record.id,
                });
            }

            let pos = state
                .position(id)
                .ok_or_else(|| FeedError::NotFound(id.to_string()))?;
            let current = &state.items[pos];

            match compare_timestamps(&record.updated_at, &current.updated_at) {
                Ordering::Less => {
                    tracing::debug!(
                        "Skipping stale update for {} ({} < {})",
                        id,
                        record.updated_at,
                        current.updated_at
                    );
                    return Ok((ReplaceOutcome::Stale, false));
                }
                Ordering::Equal if current.read && !record.read => {
                    record.read = true;
                }
                _ => {}
            }

            state.items[pos] = record;
            Ok((ReplaceOutcome::Replaced, true))
        })
    }

    /// Mark one record as read. Returns true if the flag flipped.
    pub fn mark_read(&self, id: &str) -> FeedResult<bool> {
        self.set_read(id, true)
    }

    /// Revert a read flag, used to roll back optimistic updates
    pub fn mark_unread(&self, id: &str) -> FeedResult<bool> {
        self.set_read(id, false)
    }

    fn set_read(&self, id: &str, read: bool) -> FeedResult<bool> {
        self.mutate(|state| {
            let changed = match state.items.iter_mut().find(|r| r.id == id) {
                Some(record) if record.read != read => {
                    record.read = read;
                    true
                }
                _ => false,
            };
            Ok((changed, changed))
        })
    }

    /// Mark every record as read. Returns how many flags flipped.
    pub fn mark_all_read(&self) -> FeedResult<usize> {
        self.mark_all_read_tracked().map(|flips| flips.len())
    }

    /// [`FeedStore::mark_read`], returning the flip so it can be reverted
    pub fn mark_read_tracked(&self, id: &str) -> FeedResult<Option<ReadFlip>> {
        self.mutate(|state| {
            let flip = match state.items.iter_mut().find(|r| r.id == id) {
                Some(record) if !record.read => {
                    record.read = true;
                    Some(ReadFlip {
                        id: record.id.clone(),
                        updated_at: record.updated_at.clone(),
                    })
                }
                _ => None,
            };
            let changed = flip.is_some();
            Ok((flip, changed))
        })
    }

    /// [`FeedStore::mark_all_read`], returning every flip made
    pub fn mark_all_read_tracked(&self) -> FeedResult<Vec<ReadFlip>> {
        self.mutate(|state| {
            let mut flips = Vec::new();
            for record in state.items.iter_mut().filter(|r| !r.read) {
                record.read = true;
                flips.push(ReadFlip {
                    id: record.id.clone(),
                    updated_at: record.updated_at.clone(),
                });
            }
            let changed = !flips.is_empty();
            Ok((flips, changed))
        })
    }

    /// Undo local flips. A record replaced since its flip keeps the
    /// replacement's read flag. Returns how many flags were reverted.
    pub fn revert_read(&self, flips: &[ReadFlip]) -> FeedResult<usize> {
        self.mutate(|state| {
            let mut reverted = 0;
            for flip in flips {
                match state.items.iter_mut().find(|r| r.id == flip.id) {
                    Some(record) if record.read && record.updated_at == flip.updated_at => {
                        record.read = false;
                        reverted += 1;
                    }
                    Some(record) => tracing::debug!(
                        "Keeping read state of {} (now at {}, flipped at {})",
                        flip.id,
                        record.updated_at,
                        flip.updated_at
                    ),
                    None => {}
                }
            }
            Ok((reverted, reverted > 0))
        })
    }

    pub fn set_status(&self, status: FeedStatus) -> FeedResult<()> {
        self.mutate(|state| {
            let changed = state.status != status;
            state.status = status;
            Ok(((), changed))
        })
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.lock().snapshot()
    }

    pub fn unread_count(&self) -> usize {
        self.lock().unread_count()
    }

    /// `Some(read)` for a record in the feed, `None` otherwise
    pub fn is_read(&self, id: &str) -> Option<bool> {
        let state = self.lock();
        state.items.iter().find(|r| r.id == id).map(|r| r.read)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().position(id).is_some()
    }

    pub fn status(&self) -> FeedStatus {
        self.lock().status.clone()
    }

    /// Register a callback run after every state change
    pub fn observe<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&FeedSnapshot) + Send + Sync + 'static,
    {
        let mut state = self.lock();
        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.push((id, Arc::new(observer)));
        id
    }

    pub fn unobserve(&self, id: ObserverId) -> bool {
        let mut state = self.lock();
        let before = state.observers.len();
        state.observers.retain(|(oid, _)| *oid != id);
        state.observers.len() != before
    }

    /// Detach the store from its widget. Later mutations fail with
    /// [`FeedError::InvalidState`]; snapshots keep returning the last state.
    pub fn teardown(&self) {
        let mut state = self.lock();
        state.torn_down = true;
        state.observers.clear();
    }

    pub fn is_torn_down(&self) -> bool {
        self.lock().torn_down
    }
}

impl Default for FeedStore {
    fn default() -> Self {
        Self::new()
    }
}
