#![allow(dead_code)]
pub mod http_server;

use notibell::config::Config;
use notibell::models::{NotificationRecord, Payload};
use notibell::services::FeedStore;
use std::collections::HashMap;
use std::time::Duration;

pub fn test_config(endpoint: &str) -> Config {
    Config {
        endpoint: endpoint.to_string(),
        access_key: "test-key".to_string(),
        locale: "en".to_string(),
        user_id: "user-1".to_string(),
        styles: Default::default(),
        messages: HashMap::new(),
        unknown_events: Default::default(),
        mutation_mode: Default::default(),
        mark_all_reconcile: Default::default(),
        request_timeout_secs: 5,
    }
}

/// A "comment" notification addressed to `actor`, stamped `updated_at`
pub fn comment(id: &str, actor: &str, updated_at: &str, read: bool) -> NotificationRecord {
    let mut record = NotificationRecord::new("comment", "{actor} commented on your post")
        .with_payload(&Payload::new().insert("actor", actor));
    record.id = id.to_string();
    record.created_at = updated_at.to_string();
    record.updated_at = updated_at.to_string();
    record.read = read;
    record
}

pub fn ids(store: &FeedStore) -> Vec<String> {
    store.snapshot().items.into_iter().map(|r| r.id).collect()
}

pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}

pub async fn wait_until_async<F, Fut>(condition: F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..400 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 2s");
}
