pub mod format;
pub mod messages;
pub mod render;
pub mod view;

pub use messages::Messages;
pub use view::{build_view, PanelView, RowView, WidgetView};

use tracing::warn;

use crate::config::StyleOverrides;
use crate::services::{
    FeedSnapshot, FeedStore, MarkAllOutcome, MarkOutcome, ObserverId, ReadStateMutator,
};

/// The notification bell: panel state plus the actions its controls trigger
pub struct BellWidget {
    store: FeedStore,
    mutator: ReadStateMutator,
    locale: String,
    messages: Messages,
    styles: StyleOverrides,
    panel_open: bool,
}

impl BellWidget {
    pub fn new(
        store: FeedStore,
        mutator: ReadStateMutator,
        locale: impl Into<String>,
        messages: Messages,
        styles: StyleOverrides,
    ) -> Self {
        Self {
            store,
            mutator,
            locale: locale.into(),
            messages,
            styles,
            panel_open: false,
        }
    }

    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    pub fn is_panel_open(&self) -> bool {
        self.panel_open
    }

    /// Bell activation. Returns the new panel state.
    pub fn toggle_panel(&mut self) -> bool {
        self.panel_open = !self.panel_open;
        self.panel_open
    }

    pub fn view(&self) -> WidgetView {
        build_view(&self.store.snapshot(), self.panel_open, &self.messages, &self.locale)
    }

    pub fn render_html(&self) -> Result<String, askama::Error> {
        render::render_html(&self.view(), &self.styles)
    }

    /// Re-render hook: called with the new snapshot after every feed change
    pub fn on_change<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&FeedSnapshot) + Send + Sync + 'static,
    {
        self.store.observe(callback)
    }

    /// Row click. Failures are logged and leave the row as it was.
    pub async fn on_row_click(&self, id: &str) -> Option<MarkOutcome> {
        match self.mutator.mark_one_read(id).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("Row {} not marked as read: {}", id, e);
                None
            }
        }
    }

    /// Header "mark all as read". Failures are logged and leave the feed as it was.
    pub async fn on_mark_all_click(&self) -> Option<MarkAllOutcome> {
        let unread = self.store.unread_count();
        match self.mutator.mark_all(unread).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("Mark all as read failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::transport::InMemoryTransport;
    use crate::models::NotificationRecord;
    use crate::services::{FeedStatus, MarkAllReconcile, MutationMode, MutatorOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn widget(transport: &InMemoryTransport, store: &FeedStore) -> BellWidget {
        let mutator = ReadStateMutator::new(
            store.clone(),
            Arc::new(transport.clone()),
            MutatorOptions {
                locale: "en".to_string(),
                mode: MutationMode::Confirmed,
                reconcile: MarkAllReconcile::TrustLocal,
            },
        );
        BellWidget::new(store.clone(), mutator, "en", Messages::default(), StyleOverrides::new())
    }

    fn unread(id: &str) -> NotificationRecord {
        let mut record = NotificationRecord::new("comment", "hello");
        record.id = id.to_string();
        record
    }

    #[tokio::test]
    async fn test_toggle_panel() {
        let transport = InMemoryTransport::new(vec![]);
        let store = FeedStore::new();
        let mut widget = widget(&transport, &store);

        assert!(!widget.is_panel_open());
        assert!(widget.toggle_panel());
        assert!(widget.view().panel_open);
        assert!(!widget.toggle_panel());
    }

    #[tokio::test]
    async fn test_row_click_marks_read_and_notifies() {
        let records = vec![unread("1"), unread("2")];
        let transport = InMemoryTransport::new(records.clone());
        let store = FeedStore::new();
        store.replace_all(records).unwrap();
        store.set_status(FeedStatus::Ready).unwrap();
        let widget = widget(&transport, &store);

        let renders = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&renders);
        widget.on_change(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(widget.on_row_click("1").await, Some(MarkOutcome::Marked));
        assert_eq!(widget.view().badge.as_deref(), Some("1"));
        assert_eq!(renders.load(Ordering::SeqCst), 1);

        assert_eq!(
            widget.on_mark_all_click().await,
            Some(MarkAllOutcome::Marked { local: 1, server: 1 })
        );
        assert_eq!(widget.view().badge, None);
        assert_eq!(widget.on_mark_all_click().await, Some(MarkAllOutcome::NothingUnread));
        assert_eq!(transport.mark_all_calls().await, 1);
    }

    #[tokio::test]
    async fn test_failed_click_is_absorbed() {
        let records = vec![unread("1")];
        let transport = InMemoryTransport::new(records.clone());
        transport.set_mutation_error(Some("offline")).await;
        let store = FeedStore::new();
        store.replace_all(records).unwrap();
        let widget = widget(&transport, &store);

        assert_eq!(widget.on_row_click("1").await, None);
        assert_eq!(widget.on_mark_all_click().await, None);
        assert_eq!(store.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_render_html_reflects_state() {
        let transport = InMemoryTransport::new(vec![]);
        let store = FeedStore::new();
        store.set_status(FeedStatus::Ready).unwrap();
        let mut widget = widget(&transport, &store);
        widget.toggle_panel();

        let html = widget.render_html().unwrap();
        assert!(html.contains("notibell-empty"));
        assert!(html.contains("You have no notifications"));
    }
}
