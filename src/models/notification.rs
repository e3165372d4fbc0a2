use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Kind of change carried by a push event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Created,
    Updated,
    /// Any kind this client does not know about, kept verbatim
    Unknown(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Unknown(kind) => kind,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<String> for EventKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "created" => EventKind::Created,
            "updated" => EventKind::Updated,
            _ => EventKind::Unknown(s),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Localized message template attached to a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub content: String,
}

/// A single notification as delivered by the notification service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: String,
    pub created_at: String, // ISO 8601 timestamp
    pub updated_at: String, // ISO 8601 timestamp
    /// JSON object serialized as a string; see [`Payload`]
    #[serde(default, deserialize_with = "payload_from_wire")]
    pub payload: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    #[serde(default)]
    pub read: bool,
    pub template: MessageTemplate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
}

impl NotificationRecord {
    /// Create a new unread notification stamped with the current time
    pub fn new(notification_type: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now().to_rfc3339();

        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now.clone(),
            updated_at: now,
            payload: "{}".to_string(),
            notification_type: notification_type.into(),
            read: false,
            template: MessageTemplate {
                content: content.into(),
            },
            action_url: None,
        }
    }

    pub fn with_payload(mut self, payload: &Payload) -> Self {
        self.payload = payload.to_wire();
        self
    }

    /// Parse the serialized payload into placeholder values
    pub fn payload(&self) -> Result<Payload, PayloadError> {
        Payload::parse(&self.payload)
    }
}

/// Servers differ on whether `payload` is a JSON string or an inline object;
/// both are normalized to the string form.
fn payload_from_wire<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Payload must be a JSON object")]
    NotAnObject,
}

/// Placeholder name to substitution value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    values: BTreeMap<String, serde_json::Value>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }

        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;

        match value {
            serde_json::Value::Object(map) => Ok(Self {
                values: map.into_iter().collect(),
            }),
            serde_json::Value::Null => Ok(Self::new()),
            _ => Err(PayloadError::NotAnObject),
        }
    }

    pub fn insert(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Text substituted for `{name}`. Strings are used as-is, null becomes
    /// empty and anything else is rendered as JSON text.
    pub fn text(&self, name: &str) -> Option<String> {
        self.values.get(name).map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_wire(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        serde_json::Value::Object(map).to_string()
    }
}

/// Event delivered over the push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    pub event_kind: EventKind,
    pub record: NotificationRecord,
}

impl PushEvent {
    pub fn created(record: NotificationRecord) -> Self {
        Self {
            event_kind: EventKind::Created,
            record,
        }
    }

    pub fn updated(record: NotificationRecord) -> Self {
        Self {
            event_kind: EventKind::Updated,
            record,
        }
    }
}

const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y%m%dT%H%M%S%z",
];

const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f UTC",
    "%Y-%m-%d %H:%M:%S%.f UTC",
    "%Y%m%dT%H%M%SZ",
];

/// Parse an ISO 8601 timestamp. Accepts RFC 3339, offsets without a colon,
/// the basic `20240101T070000Z` form, naive date-times (taken as UTC) and
/// bare dates (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Sort key for a raw timestamp. Parsable values order by instant and sit
/// above every unparsable one; unparsable values order by their text.
pub fn timestamp_key(raw: &str) -> (Option<DateTime<Utc>>, Option<String>) {
    match parse_timestamp(raw) {
        Some(instant) => (Some(instant), None),
        None => (None, Some(raw.to_string())),
    }
}

/// Order two timestamps by [`timestamp_key`]. Equal instants written
/// differently compare equal.
pub fn compare_timestamps(a: &str, b: &str) -> Ordering {
    timestamp_key(a).cmp(&timestamp_key(b))
}

/// Sort records by `created_at`, newest first. Stable for equal timestamps.
pub fn sort_newest_first(records: &mut [NotificationRecord]) {
    records.sort_by_cached_key(|record| Reverse(timestamp_key(&record.created_at)));
}
