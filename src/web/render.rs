use askama::Template;

use super::view::{PanelView, WidgetView};
use crate::config::StyleOverrides;

struct RowMarkup {
    id: String,
    text: String,
    timestamp: String,
    unread: bool,
    link: String,
    style: String,
}

#[derive(Template)]
#[template(
    source = r#"<div class="notibell" data-open="{{ open }}">
<button type="button" class="notibell-bell" data-action="toggle" aria-expanded="{{ open }}" style="{{ bell_style }}">
<span class="notibell-icon" aria-hidden="true">&#128276;</span>
{% if show_badge %}<span class="notibell-badge" style="{{ badge_style }}">{{ badge }}</span>{% endif %}
</button>
{% if open %}
<div class="notibell-panel" role="dialog" aria-label="{{ title }}" style="{{ panel_style }}">
<div class="notibell-header" style="{{ header_style }}"><span class="notibell-title">{{ title }}</span>{% if show_mark_all %}<button type="button" class="notibell-mark-all" data-action="mark-all">{{ mark_all_label }}</button>{% endif %}</div>
{% if state == "list" %}
<ul class="notibell-list">
{% for row in rows %}
<li class="notibell-row{% if row.unread %} notibell-unread{% endif %}" data-id="{{ row.id }}" data-action="read" style="{{ row.style }}">{% if !row.link.is_empty() %}<a href="{{ row.link }}">{{ row.text }}</a>{% else %}<span>{{ row.text }}</span>{% endif %} <time>{{ row.timestamp }}</time></li>
{% endfor %}
</ul>
{% else %}
<p class="notibell-{{ state }}">{{ message }}</p>
{% endif %}
</div>
{% endif %}
</div>"#,
    ext = "html"
)]
struct WidgetMarkup {
    open: bool,
    show_badge: bool,
    badge: String,
    title: String,
    show_mark_all: bool,
    mark_all_label: String,
    state: &'static str,
    message: String,
    rows: Vec<RowMarkup>,
    bell_style: String,
    badge_style: String,
    panel_style: String,
    header_style: String,
}

/// `prop: value; ...` for one named region, empty if not overridden
pub fn inline_style(styles: &StyleOverrides, region: &str) -> String {
    styles
        .get(region)
        .map(|props| {
            props
                .iter()
                .map(|(prop, value)| format!("{}: {}", prop, value))
                .collect::<Vec<_>>()
                .join("; ")
        })
        .unwrap_or_default()
}

fn row_style(styles: &StyleOverrides, unread: bool) -> String {
    let base = inline_style(styles, "row");
    if !unread {
        return base;
    }
    let extra = inline_style(styles, "rowUnread");
    match (base.is_empty(), extra.is_empty()) {
        (_, true) => base,
        (true, false) => extra,
        (false, false) => format!("{}; {}", base, extra),
    }
}

/// Render the widget as an HTML fragment; all text is escaped
pub fn render_html(view: &WidgetView, styles: &StyleOverrides) -> Result<String, askama::Error> {
    let (message, rows) = match &view.panel {
        PanelView::Loading { message } | PanelView::Error { message } | PanelView::Empty { message } => {
            (message.clone(), Vec::new())
        }
        PanelView::List { rows } => (
            String::new(),
            rows.iter()
                .map(|row| RowMarkup {
                    id: row.id.clone(),
                    text: row.text.clone(),
                    timestamp: row.timestamp.clone(),
                    unread: row.unread,
                    link: row.action_url.clone().unwrap_or_default(),
                    style: row_style(styles, row.unread),
                })
                .collect(),
        ),
    };

    WidgetMarkup {
        open: view.panel_open,
        show_badge: view.badge.is_some(),
        badge: view.badge.clone().unwrap_or_default(),
        title: view.title.clone(),
        show_mark_all: view.show_mark_all,
        mark_all_label: view.mark_all_label.clone(),
        state: view.panel.name(),
        message,
        rows,
        bell_style: inline_style(styles, "bell"),
        badge_style: inline_style(styles, "badge"),
        panel_style: inline_style(styles, "panel"),
        header_style: inline_style(styles, "header"),
    }
    .render()
}
