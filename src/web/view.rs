use serde::Serialize;

use super::format::{badge_label, format_timestamp};
use super::messages::Messages;
use crate::services::{render_record, FeedSnapshot, FeedStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowView {
    pub id: String,
    pub text: String,
    pub timestamp: String,
    pub unread: bool,
    pub action_url: Option<String>,
}

/// Content of the dropdown panel; exactly one state at a time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PanelView {
    Loading { message: String },
    Error { message: String },
    Empty { message: String },
    List { rows: Vec<RowView> },
}

impl PanelView {
    pub fn name(&self) -> &'static str {
        match self {
            PanelView::Loading { .. } => "loading",
            PanelView::Error { .. } => "error",
            PanelView::Empty { .. } => "empty",
            PanelView::List { .. } => "list",
        }
    }
}

/// Everything needed to draw the widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetView {
    pub panel_open: bool,
    pub unread_count: usize,
    pub badge: Option<String>,
    pub title: String,
    pub mark_all_label: String,
    pub show_mark_all: bool,
    pub panel: PanelView,
}

pub fn build_view(snapshot: &FeedSnapshot, panel_open: bool, messages: &Messages, locale: &str) -> WidgetView {
    let panel = match &snapshot.status {
        FeedStatus::Error(_) => PanelView::Error {
            message: messages.error.clone(),
        },
        FeedStatus::Loading if snapshot.items.is_empty() => PanelView::Loading {
            message: messages.loading.clone(),
        },
        _ if snapshot.items.is_empty() => PanelView::Empty {
            message: messages.empty.clone(),
        },
        _ => PanelView::List {
            rows: snapshot
                .items
                .iter()
                .map(|record| RowView {
                    id: record.id.clone(),
                    text: render_record(record),
                    timestamp: format_timestamp(&record.updated_at, locale),
                    unread: !record.read,
                    action_url: record.action_url.clone(),
                })
                .collect(),
        },
    };

    let errored = matches!(panel, PanelView::Error { .. });
    let badge = if !errored && snapshot.unread_count > 0 {
        Some(badge_label(snapshot.unread_count))
    } else {
        None
    };

    WidgetView {
        panel_open,
        unread_count: snapshot.unread_count,
        badge,
        title: messages.title.clone(),
        mark_all_label: messages.mark_all_read.clone(),
        show_mark_all: matches!(panel, PanelView::List { .. }) && snapshot.unread_count > 0,
        panel,
    }
}
