use crate::models::parse_timestamp;

/// strftime pattern for a BCP 47 locale tag
fn pattern_for(locale: &str) -> &'static str {
    let tag = locale.replace('_', "-").to_lowercase();
    let language = tag.split('-').next().unwrap_or_default();

    match (language, tag.as_str()) {
        ("en", "en-us") | ("en", "en") => "%b %-d, %Y %H:%M",
        ("en", _) => "%d/%m/%Y %H:%M",
        ("de", _) => "%d.%m.%Y %H:%M",
        ("fr", _) | ("es", _) | ("it", _) | ("pt", _) => "%d/%m/%Y %H:%M",
        ("nl", _) => "%d-%m-%Y %H:%M",
        ("ja", _) | ("zh", _) | ("ko", _) => "%Y/%m/%d %H:%M",
        _ => "%Y-%m-%d %H:%M",
    }
}

/// Format an ISO 8601 timestamp (in UTC) for display.
/// Unparsable input is shown as received.
pub fn format_timestamp(raw: &str, locale: &str) -> String {
    match parse_timestamp(raw) {
        Some(ts) => ts.format(pattern_for(locale)).to_string(),
        None => raw.to_string(),
    }
}

/// Badge text for an unread count
pub fn badge_label(count: usize) -> String {
    if count > 99 {
        "99+".to_string()
    } else {
        count.to_string()
    }
}
