use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::models::{NotificationRecord, Payload};

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_REGEX
        .get_or_init(|| Regex::new(r"\{([A-Za-z0-9_.\-]+)\}").expect("Invalid placeholder regex"))
}

/// Substitute `{name}` tokens with payload values.
/// Placeholders missing from the payload are left as written.
pub fn render_template(content: &str, payload: &Payload) -> String {
    placeholder_regex()
        .replace_all(content, |caps: &Captures| {
            payload.text(&caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Render a record's message. A malformed payload renders the template
/// with no substitutions.
pub fn render_record(record: &NotificationRecord) -> String {
    let payload = match record.payload() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Notification {} has an unusable payload: {}", record.id, e);
            Payload::new()
        }
    };
    render_template(&record.template.content, &payload)
}
