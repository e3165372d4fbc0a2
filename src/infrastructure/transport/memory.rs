use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

use crate::domain::errors::TransportError;
use crate::domain::ports::{NotificationTransport, PushStream};
use crate::models::{NotificationRecord, PushEvent};

type PushSender = mpsc::Sender<Result<PushEvent, TransportError>>;

#[derive(Default)]
struct MemoryState {
    notifications: Vec<NotificationRecord>,
    fetch_error: Option<String>,
    mutation_error: Option<String>,
    mark_all_count: Option<u64>,
    subscribers: Vec<PushSender>,
    subscriptions: Vec<(String, String)>,
    fetches: Vec<String>,
    mark_read_calls: Vec<String>,
    mark_all_calls: usize,
}

/// In-process notification service.
///
/// Serves a scripted notification list, hands out push channels fed by
/// [`InMemoryTransport::push`], and records every mutation request.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryTransport {
    pub fn new(notifications: Vec<NotificationRecord>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                notifications,
                ..MemoryState::default()
            })),
        }
    }

    /// Make the next fetches fail (or succeed again with `None`)
    pub async fn set_fetch_error(&self, error: Option<&str>) {
        self.state.lock().await.fetch_error = error.map(str::to_string);
    }

    /// Make the next mutations fail (or succeed again with `None`)
    pub async fn set_mutation_error(&self, error: Option<&str>) {
        self.state.lock().await.mutation_error = error.map(str::to_string);
    }

    /// Override the count reported by mark-all-as-read
    pub async fn set_mark_all_count(&self, count: Option<u64>) {
        self.state.lock().await.mark_all_count = count;
    }

    pub async fn set_notifications(&self, notifications: Vec<NotificationRecord>) {
        self.state.lock().await.notifications = notifications;
    }

    /// Deliver an event to every open push channel. Returns how many received it.
    pub async fn push(&self, event: PushEvent) -> usize {
        let mut state = self.state.lock().await;
        state.subscribers.retain(|tx| !tx.is_closed());

        let mut delivered = 0;
        for tx in &state.subscribers {
            if tx.send(Ok(event.clone())).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Deliver a transport-level error to every open push channel
    pub async fn push_error(&self, error: TransportError) {
        let state = self.state.lock().await;
        for tx in &state.subscribers {
            let _ = tx.send(Err(error.clone())).await;
        }
    }

    /// End every open push channel
    pub async fn close_channels(&self) {
        self.state.lock().await.subscribers.clear();
    }

    pub async fn active_subscriptions(&self) -> usize {
        let mut state = self.state.lock().await;
        state.subscribers.retain(|tx| !tx.is_closed());
        state.subscribers.len()
    }

    /// (user id, locale) of every subscribe call
    pub async fn subscriptions(&self) -> Vec<(String, String)> {
        self.state.lock().await.subscriptions.clone()
    }

    /// Locales of every fetch call
    pub async fn fetches(&self) -> Vec<String> {
        self.state.lock().await.fetches.clone()
    }

    pub async fn mark_read_calls(&self) -> Vec<String> {
        self.state.lock().await.mark_read_calls.clone()
    }

    pub async fn mark_all_calls(&self) -> usize {
        self.state.lock().await.mark_all_calls
    }
}

#[async_trait]
impl NotificationTransport for InMemoryTransport {
    async fn fetch_notifications(&self, locale: &str) -> Result<Vec<NotificationRecord>, TransportError> {
        let mut state = self.state.lock().await;
        state.fetches.push(locale.to_string());
        if let Some(error) = &state.fetch_error {
            return Err(TransportError::Http(error.clone()));
        }
        Ok(state.notifications.clone())
    }

    async fn subscribe(&self, user_id: &str, locale: &str) -> Result<PushStream, TransportError> {
        let (tx, rx) = mpsc::channel(100);
        let mut state = self.state.lock().await;
        state
            .subscriptions
            .push((user_id.to_string(), locale.to_string()));
        state.subscribers.push(tx);
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn mark_as_read(&self, id: &str) -> Result<String, TransportError> {
        let mut state = self.state.lock().await;
        state.mark_read_calls.push(id.to_string());
        if let Some(error) = &state.mutation_error {
            return Err(TransportError::Http(error.clone()));
        }
        if let Some(record) = state.notifications.iter_mut().find(|r| r.id == id) {
            record.read = true;
        }
        Ok(id.to_string())
    }

    async fn mark_all_as_read(&self) -> Result<u64, TransportError> {
        let mut state = self.state.lock().await;
        state.mark_all_calls += 1;
        if let Some(error) = &state.mutation_error {
            return Err(TransportError::Http(error.clone()));
        }
        let mut updated = 0;
        for record in state.notifications.iter_mut().filter(|r| !r.read) {
            record.read = true;
            updated += 1;
        }
        Ok(state.mark_all_count.unwrap_or(updated))
    }
}
