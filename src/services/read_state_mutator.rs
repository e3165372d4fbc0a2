use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::errors::{FeedError, FeedResult, SyncError, SyncResult};
use crate::domain::ports::NotificationTransport;
use crate::services::feed_store::FeedStore;
use crate::services::feed_synchronizer::fetch_into;

/// When local read state changes relative to the server acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationMode {
    /// Apply after the server acknowledged the mutation
    #[default]
    Confirmed,
    /// Apply immediately and roll back if the request fails
    Optimistic,
}

impl FromStr for MutationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "confirmed" => Ok(MutationMode::Confirmed),
            "optimistic" => Ok(MutationMode::Optimistic),
            other => Err(format!("Unknown mutation mode: {}", other)),
        }
    }
}

/// What to do when mark-all-as-read reports a different count than the
/// number of records flipped locally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkAllReconcile {
    /// Keep the local result and log the mismatch
    #[default]
    TrustLocal,
    /// Re-fetch the feed and replace the store with the server's view
    Refetch,
}

impl FromStr for MarkAllReconcile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trust_local" | "local" => Ok(MarkAllReconcile::TrustLocal),
            "refetch" => Ok(MarkAllReconcile::Refetch),
            other => Err(format!("Unknown mark-all reconcile mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MutatorOptions {
    pub locale: String,
    pub mode: MutationMode,
    pub reconcile: MarkAllReconcile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Marked,
    /// Already read; no request was sent
    AlreadyRead,
    /// Not in the feed; no request was sent
    NotInFeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkAllOutcome {
    /// Nothing unread; no request was sent
    NothingUnread,
    Marked { local: usize, server: u64 },
}

/// Turns read intents into server mutations and reflects them in the store
#[derive(Clone)]
pub struct ReadStateMutator {
    store: FeedStore,
    transport: Arc<dyn NotificationTransport>,
    options: MutatorOptions,
}

impl ReadStateMutator {
    pub fn new(store: FeedStore, transport: Arc<dyn NotificationTransport>, options: MutatorOptions) -> Self {
        Self {
            store,
            transport,
            options,
        }
    }

    /// Mark one notification as read
    pub async fn mark_one_read(&self, id: &str) -> SyncResult<MarkOutcome> {
        match self.store.is_read(id) {
            None => return Ok(MarkOutcome::NotInFeed),
            Some(true) => return Ok(MarkOutcome::AlreadyRead),
            Some(false) => {}
        }

        let flip = match self.options.mode {
            MutationMode::Optimistic => settle(self.store.mark_read_tracked(id))?.flatten(),
            MutationMode::Confirmed => None,
        };

        match self.transport.mark_as_read(id).await {
            Ok(acked) => {
                if acked != id {
                    warn!("Mark-as-read for {} acknowledged as {}", id, acked);
                }
                if self.options.mode == MutationMode::Confirmed {
                    settle(self.store.mark_read(id))?;
                }
                record_mutation("mark_one", "ok");
                debug!("Marked notification {} as read", id);
                Ok(MarkOutcome::Marked)
            }
            Err(e) => {
                if let Some(flip) = flip {
                    settle(self.store.revert_read(&[flip]))?;
                }
                record_mutation("mark_one", "failed");
                warn!("Failed to mark notification {} as read: {}", id, e);
                Err(SyncError::MutationFailed(e.to_string()))
            }
        }
    }

    /// Mark every notification as read. `unread_count` is the count the
    /// caller is looking at; zero short-circuits without a request.
    pub async fn mark_all(&self, unread_count: usize) -> SyncResult<MarkAllOutcome> {
        if unread_count == 0 {
            return Ok(MarkAllOutcome::NothingUnread);
        }

        let (flips, optimistic_local) = match self.options.mode {
            MutationMode::Optimistic => {
                let flips = settle(self.store.mark_all_read_tracked())?.unwrap_or_default();
                let local = flips.len();
                (flips, Some(local))
            }
            MutationMode::Confirmed => (Vec::new(), None),
        };

        let server = match self.transport.mark_all_as_read().await {
            Ok(count) => count,
            Err(e) => {
                settle(self.store.revert_read(&flips))?;
                record_mutation("mark_all", "failed");
                warn!("Failed to mark all notifications as read: {}", e);
                return Err(SyncError::MutationFailed(e.to_string()));
            }
        };

        let local = match optimistic_local {
            Some(local) => local,
            None => settle(self.store.mark_all_read())?.unwrap_or(0),
        };
        record_mutation("mark_all", "ok");
        info!("Marked all notifications as read (local {}, server {})", local, server);

        if server != local as u64 {
            self.reconcile(local, server).await;
        }

        Ok(MarkAllOutcome::Marked { local, server })
    }

    async fn reconcile(&self, local: usize, server: u64) {
        warn!(
            "Mark-all count mismatch: {} flipped locally, server updated {}",
            local, server
        );
        if self.options.reconcile != MarkAllReconcile::Refetch || self.store.is_torn_down() {
            return;
        }

        match fetch_into(self.transport.as_ref(), &self.store, &self.options.locale).await {
            Ok(count) => debug!("Re-fetched {} notifications after mark-all", count),
            Err(e) => warn!("Re-fetch after mark-all failed: {}", e),
        }
    }
}

/// Completions against a torn-down store are dropped quietly
fn settle<T>(result: FeedResult<T>) -> SyncResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(FeedError::InvalidState) => {
            debug!("Feed store torn down, dropping read-state update");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn record_mutation(op: &'static str, outcome: &'static str) {
    metrics::counter!("notibell_mutations_total", "op" => op, "outcome" => outcome).increment(1);
}
