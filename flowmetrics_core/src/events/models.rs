use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance event type tag.
///
/// Only `Fetch` matters to the metrics pipeline; the rest of the vocabulary is
/// kept so records read from a shared log round-trip without loss.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Create,
    Receive,
    Fetch,
    Send,
    RemoteInvocation,
    Download,
    Drop,
    Expire,
    Fork,
    Join,
    Clone,
    ContentModified,
    AttributesModified,
    Route,
    #[serde(rename = "ADDINFO")]
    AddInfo,
    Replay,
    Unknown,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Create => "CREATE",
            EventType::Receive => "RECEIVE",
            EventType::Fetch => "FETCH",
            EventType::Send => "SEND",
            EventType::RemoteInvocation => "REMOTE_INVOCATION",
            EventType::Download => "DOWNLOAD",
            EventType::Drop => "DROP",
            EventType::Expire => "EXPIRE",
            EventType::Fork => "FORK",
            EventType::Join => "JOIN",
            EventType::Clone => "CLONE",
            EventType::ContentModified => "CONTENT_MODIFIED",
            EventType::AttributesModified => "ATTRIBUTES_MODIFIED",
            EventType::Route => "ROUTE",
            EventType::AddInfo => "ADDINFO",
            EventType::Replay => "REPLAY",
            EventType::Unknown => "UNKNOWN",
        }
    }

    /// Parse a stored tag. Unrecognized tags map to `Unknown` rather than failing,
    /// so a newer writer cannot stall the reader.
    pub fn parse_str(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => EventType::Create,
            "RECEIVE" => EventType::Receive,
            "FETCH" => EventType::Fetch,
            "SEND" => EventType::Send,
            "REMOTE_INVOCATION" => EventType::RemoteInvocation,
            "DOWNLOAD" => EventType::Download,
            "DROP" => EventType::Drop,
            "EXPIRE" => EventType::Expire,
            "FORK" => EventType::Fork,
            "JOIN" => EventType::Join,
            "CLONE" => EventType::Clone,
            "CONTENT_MODIFIED" => EventType::ContentModified,
            "ATTRIBUTES_MODIFIED" => EventType::AttributesModified,
            "ROUTE" => EventType::Route,
            "ADDINFO" => EventType::AddInfo,
            "REPLAY" => EventType::Replay,
            _ => EventType::Unknown,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable event read from the provenance log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Strictly increasing, unique across the log.
    pub id: i64,
    pub event_time: DateTime<Utc>,
    /// Upstream component that emitted the event, e.g. `FetchS3Object`.
    pub component_type: String,
    pub event_type: EventType,
    pub attributes: BTreeMap<String, String>,
}

impl EventRecord {
    pub fn new(
        id: i64,
        component_type: impl Into<String>,
        event_type: EventType,
        attributes: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id,
            event_time: Utc::now(),
            component_type: component_type.into(),
            event_type,
            attributes,
        }
    }

    pub fn with_event_time(mut self, event_time: DateTime<Utc>) -> Self {
        self.event_time = event_time;
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}
