use crate::domain::errors::TransportError;
use crate::models::{NotificationRecord, PushEvent};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// Stream of push events. Dropping it releases the subscription.
pub type PushStream = Pin<Box<dyn Stream<Item = Result<PushEvent, TransportError>> + Send>>;

/// Request/response and push access to the notification service.
/// Reconnection and retry policy, if any, live behind this trait.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Fetch the current user's notifications for a locale
    async fn fetch_notifications(&self, locale: &str) -> Result<Vec<NotificationRecord>, TransportError>;

    /// Open the push channel for a user and locale
    async fn subscribe(&self, user_id: &str, locale: &str) -> Result<PushStream, TransportError>;

    /// Mark one notification as read; returns the acknowledged id
    async fn mark_as_read(&self, id: &str) -> Result<String, TransportError>;

    /// Mark every notification as read; returns how many the server updated
    async fn mark_all_as_read(&self) -> Result<u64, TransportError>;
}
