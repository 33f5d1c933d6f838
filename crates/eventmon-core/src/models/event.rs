//! Event data model

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single discrete event delivered by the ingestion layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, e.g. `HttpRequest`
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event identifier
    #[serde(rename = "uuid", alias = "id")]
    pub id: String,

    /// Host that produced the event
    pub host: String,

    /// When the event happened
    pub timestamp: DateTime<Utc>,

    /// Arbitrary event attributes
    #[serde(rename = "data", alias = "attributes", default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Event {
    /// Create an event without attributes
    pub fn new(
        event_type: impl Into<String>,
        id: impl Into<String>,
        host: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            id: id.into(),
            host: host.into(),
            timestamp,
            attributes: BTreeMap::new(),
        }
    }

    /// Add an attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// String form of an attribute: strings as-is, other values as JSON text.
    /// Missing and `null` attributes have no string form.
    pub fn attribute_str(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.attributes.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(Cow::Borrowed(s)),
            other => Some(Cow::Owned(other.to_string())),
        }
    }
}
