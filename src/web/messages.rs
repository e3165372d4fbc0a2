use std::collections::HashMap;

/// User-visible strings of the widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Messages {
    pub title: String,
    pub mark_all_read: String,
    pub empty: String,
    pub error: String,
    pub loading: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            title: "Notifications".to_string(),
            mark_all_read: "Mark all as read".to_string(),
            empty: "You have no notifications".to_string(),
            error: "Notifications could not be loaded".to_string(),
            loading: "Loading notifications".to_string(),
        }
    }
}

impl Messages {
    /// Defaults with host overrides applied. Keys: `title`, `markAllRead`,
    /// `empty`, `error`, `loading`.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut messages = Self::default();
        for (key, value) in overrides {
            let slot = match key.as_str() {
                "title" => &mut messages.title,
                "markAllRead" => &mut messages.mark_all_read,
                "empty" => &mut messages.empty,
                "error" => &mut messages.error,
                "loading" => &mut messages.loading,
                _ => {
                    tracing::debug!("Ignoring unknown message override '{}'", key);
                    continue;
                }
            };
            *slot = value.clone();
        }
        messages
    }
}
