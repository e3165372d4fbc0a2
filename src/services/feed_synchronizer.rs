use futures::StreamExt;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{FeedError, FeedResult, SyncError, SyncResult};
use crate::domain::ports::NotificationTransport;
use crate::models::{sort_newest_first, EventKind, NotificationRecord, PushEvent};
use crate::services::feed_store::{FeedStatus, FeedStore, ReplaceOutcome};

/// What to do with push events whose kind is neither `created` nor `updated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownEventPolicy {
    /// Log and drop the event
    #[default]
    Ignore,
    /// Apply it as an update of the carried record
    TreatAsUpdate,
}

impl FromStr for UnknownEventPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ignore" => Ok(UnknownEventPolicy::Ignore),
            "treat_as_update" | "update" => Ok(UnknownEventPolicy::TreatAsUpdate),
            other => Err(format!("Unknown event policy: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub user_id: String,
    pub locale: String,
    pub unknown_events: UnknownEventPolicy,
}

/// How a push event changed the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Prepended,
    Replaced,
    Stale,
    Ignored,
}

/// Fetch the feed and store it newest first
pub(crate) async fn fetch_into(
    transport: &dyn NotificationTransport,
    store: &FeedStore,
    locale: &str,
) -> SyncResult<usize> {
    let mut records = transport
        .fetch_notifications(locale)
        .await
        .map_err(|e| SyncError::FetchFailed(e.to_string()))?;

    sort_newest_first(&mut records);
    let count = records.len();
    store.replace_all(records)?;
    Ok(count)
}

/// Keeps a [`FeedStore`] in step with the notification service: one initial
/// fetch, then push events applied one at a time in arrival order.
pub struct FeedSynchronizer {
    store: FeedStore,
    transport: Arc<dyn NotificationTransport>,
    options: SyncOptions,
}

impl FeedSynchronizer {
    pub fn new(store: FeedStore, transport: Arc<dyn NotificationTransport>, options: SyncOptions) -> Self {
        Self {
            store,
            transport,
            options,
        }
    }

    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    /// Initial fetch. On failure the store stays empty and its status
    /// becomes [`FeedStatus::Error`].
    pub async fn load(&self) -> SyncResult<usize> {
        match fetch_into(self.transport.as_ref(), &self.store, &self.options.locale).await {
            Ok(count) => {
                self.store.set_status(FeedStatus::Ready)?;
                info!("Loaded {} notifications for user {}", count, self.options.user_id);
                Ok(count)
            }
            Err(SyncError::FetchFailed(message)) => {
                error!("Failed to load notifications: {}", message);
                self.store.set_status(FeedStatus::Error(message.clone()))?;
                Err(SyncError::FetchFailed(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Apply one push event to the store
    pub fn apply(&self, event: PushEvent) -> FeedResult<Applied> {
        metrics::counter!("notibell_push_events_total", "kind" => kind_label(&event.event_kind))
            .increment(1);

        let PushEvent { event_kind, record } = event;
        match event_kind {
            EventKind::Created => {
                if self.store.contains(&record.id) {
                    // Re-delivered create: keep the single copy current
                    debug!("Create for existing notification {}, replacing", record.id);
                    self.replace(record)
                } else {
                    debug!("Prepending notification {}", record.id);
                    self.store.prepend(record)?;
                    Ok(Applied::Prepended)
                }
            }
            EventKind::Updated => self.replace(record),
            EventKind::Unknown(kind) => match self.options.unknown_events {
                UnknownEventPolicy::Ignore => {
                    warn!("Ignoring push event of unknown kind '{}' for {}", kind, record.id);
                    Ok(Applied::Ignored)
                }
                UnknownEventPolicy::TreatAsUpdate => {
                    debug!("Treating '{}' event for {} as an update", kind, record.id);
                    self.replace(record)
                }
            },
        }
    }

    fn replace(&self, record: NotificationRecord) -> FeedResult<Applied> {
        let id = record.id.clone();
        match self.store.replace_one(&id, record)? {
            ReplaceOutcome::Replaced => Ok(Applied::Replaced),
            ReplaceOutcome::Stale => Ok(Applied::Stale),
        }
    }

    /// Attach to the push channel and apply events until it closes or
    /// `cancel` fires. Returns `Ok` on cancellation or teardown and
    /// [`SyncError::ChannelClosed`] when the channel ends on its own.
    pub async fn run(&self, cancel: CancellationToken) -> SyncResult<()> {
        let subscribed = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            subscribed = self.transport.subscribe(&self.options.user_id, &self.options.locale) => subscribed,
        };
        let mut events = subscribed.map_err(|e| SyncError::ChannelClosed(e.to_string()))?;
        info!("Subscribed to push channel for user {}", self.options.user_id);

        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Push channel released for user {}", self.options.user_id);
                    return Ok(());
                }
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => match self.apply(event) {
                    Ok(_) => {}
                    Err(FeedError::InvalidState) => {
                        debug!("Feed store torn down, leaving push channel");
                        return Ok(());
                    }
                    Err(e) => warn!("Push event not applied: {}", e),
                },
                Some(Err(e)) => warn!("Push channel error: {}", e),
                None => {
                    warn!("Push channel closed for user {}", self.options.user_id);
                    return Err(SyncError::ChannelClosed("stream ended".to_string()));
                }
            }
        }
    }

    /// Load, then follow the push channel on a background task.
    /// The channel is not attached when the initial fetch fails.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; use
    /// [`FeedSynchronizer::spawn_on`] from other threads.
    pub fn spawn(self) -> SyncHandle {
        self.spawn_on(&Handle::current())
    }

    /// [`FeedSynchronizer::spawn`] onto the given runtime
    pub fn spawn_on(self, runtime: &Handle) -> SyncHandle {
        let cancel = CancellationToken::new();
        let store = self.store.clone();
        let token = cancel.clone();

        let task = runtime.spawn(async move {
            if self.load().await.is_err() {
                return;
            }
            if let Err(e) = self.run(token).await {
                debug!("Synchronizer stopped: {}", e);
            }
        });

        SyncHandle { cancel, task, store }
    }
}

fn kind_label(kind: &EventKind) -> &'static str {
    match kind {
        EventKind::Created => "created",
        EventKind::Updated => "updated",
        EventKind::Unknown(_) => "unknown",
    }
}

/// Running synchronizer. Shutting down releases the push channel and
/// tears the store down so late completions become no-ops.
pub struct SyncHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    store: FeedStore,
}

impl SyncHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.store.teardown();
        if let Err(e) = self.task.await {
            warn!("Synchronizer task failed: {}", e);
        }
    }
}
