//! Inbound message classification.
//!
//! Two shapes are understood:
//!
//! - Generic ingestion messages:
//!   `{"Library": "docs", "Path": "a.txt", "EventType": "CREATE", "Timestamp": "..."}`
//!   (`Action` is accepted in place of `EventType`; `UPDATE` means `CREATE`).
//! - Storage-provider notifications (MinIO/S3 bucket events):
//!   `{"EventName": "s3:ObjectCreated:Put", "Key": "bucket/a.txt", "Records": [...]}`.
//!
//! Everything else is [`Inbound::Unrecognized`].

use crate::event::{Action, IngestionEvent};
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Provider event families that mean the object is gone.
const REMOVED_MARKER: &str = "ObjectRemoved";
/// Content type S3-alikes give to folder placeholder objects.
const DIRECTORY_CONTENT_TYPE: &str = "application/x-directory";

/// How provider notifications are normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRules {
    /// Library every provider notification is attributed to.
    pub default_library: String,
    /// Event names starting with this are provider notifications.
    pub provider_prefix: String,
    /// Files whose name starts with one of these are skipped.
    pub ignored_prefixes: Vec<String>,
}
impl Default for MessageRules {
    fn default() -> Self {
        Self {
            default_library: "miniofiles".to_string(),
            provider_prefix: "s3:".to_string(),
            ignored_prefixes: vec!["~".to_string(), ".".to_string()],
        }
    }
}

/// Result of classifying one raw inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Generic(IngestionEvent),
    Provider {
        event: IngestionEvent,
        /// The object is a folder placeholder, not a file.
        directory: bool,
    },
    Unrecognized(String),
}

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(rename = "Library")]
    library: Option<String>,
    #[serde(rename = "Path")]
    path: Option<String>,
    #[serde(rename = "EventType")]
    event_type: Option<String>,
    #[serde(rename = "Action")]
    action: Option<String>,
    #[serde(rename = "Timestamp")]
    timestamp: Option<String>,
    #[serde(rename = "EventName")]
    event_name: Option<String>,
    #[serde(rename = "Key")]
    key: Option<String>,
    time: Option<String>,
    #[serde(rename = "Records", default)]
    records: Vec<Record>,
}

#[derive(Debug, Default, Deserialize)]
struct Record {
    #[serde(rename = "eventTime")]
    event_time: Option<String>,
    s3: Option<S3Entity>,
}

#[derive(Debug, Default, Deserialize)]
struct S3Entity {
    object: Option<S3Object>,
}

#[derive(Debug, Default, Deserialize)]
struct S3Object {
    #[serde(rename = "contentType")]
    content_type: Option<String>,
}

fn parse_time(field: &str, value: &str) -> Result<OffsetDateTime, String> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| format!("invalid {field} \"{value}\": {e}"))
}

fn generic_action(value: &str) -> Option<Action> {
    match value.to_ascii_uppercase().as_str() {
        "CREATE" | "UPDATE" => Some(Action::Create),
        "DELETE" => Some(Action::Delete),
        _ => None,
    }
}

impl Inbound {
    /// Classify a raw message. `received` stands in for event times the
    /// message doesn't carry.
    pub fn classify(raw: &[u8], rules: &MessageRules, received: OffsetDateTime) -> Self {
        let envelope: Envelope = match serde_json::from_slice(raw) {
            Ok(envelope) => envelope,
            Err(e) => return Self::Unrecognized(format!("not a JSON object: {e}")),
        };
        match Self::from_envelope(envelope, rules, received) {
            Ok(inbound) => inbound,
            Err(reason) => Self::Unrecognized(reason),
        }
    }

    fn from_envelope(envelope: Envelope, rules: &MessageRules, received: OffsetDateTime) -> Result<Self, String> {
        if let (Some(library), Some(path)) = (&envelope.library, &envelope.path) {
            let Some(value) = envelope.event_type.as_deref().or(envelope.action.as_deref()) else {
                return Err("generic message without EventType or Action".to_string());
            };
            let action = generic_action(value).ok_or_else(|| format!("unknown action \"{value}\""))?;
            let timestamp = match &envelope.timestamp {
                Some(ts) => parse_time("Timestamp", ts)?,
                None => received,
            };
            return Ok(Self::Generic(IngestionEvent {
                library: library.clone(),
                path: path.clone(),
                action,
                timestamp,
            }));
        }

        let name = envelope.event_name.as_deref().or(envelope.event_type.as_deref());
        let Some(name) = name.filter(|n| n.starts_with(&rules.provider_prefix)) else {
            return Err("no Library/Path and no storage provider event name".to_string());
        };
        let Some(key) = envelope.key else {
            return Err(format!("provider event {name} without Key"));
        };
        let action = if name.contains(REMOVED_MARKER) { Action::Delete } else { Action::Create };
        let first = envelope.records.first();
        let timestamp = match envelope.time.as_deref().or(first.and_then(|r| r.event_time.as_deref())) {
            Some(ts) => parse_time("event time", ts)?,
            None => received,
        };
        let content_type = first
            .and_then(|r| r.s3.as_ref())
            .and_then(|s3| s3.object.as_ref())
            .and_then(|o| o.content_type.as_deref());
        let directory = key.ends_with('/') || content_type == Some(DIRECTORY_CONTENT_TYPE);
        Ok(Self::Provider {
            event: IngestionEvent { library: rules.default_library.clone(), path: key, action, timestamp },
            directory,
        })
    }
}
