//! CloudWatch Logs subscription payloads.
//!
//! A subscription filter delivers `{"awslogs": {"data": "<base64>"}}` where
//! `data` wraps a compressed JSON document describing one batch of events.

pub mod decoder;
pub mod filter;

use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvocationPayload {
    pub awslogs: LogBatch,
}

/// The still-encoded batch: base64 text over a gzip, zlib or deflate stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogBatch {
    pub data: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    DataMessage,
    /// Sent once when a subscription is created, to check the destination.
    ControlMessage,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogBundle {
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub log_group: String,
    #[serde(default)]
    pub log_stream: String,
    #[serde(default)]
    pub subscription_filters: Vec<String>,
    pub log_events: Vec<LogRecord>,
}

impl LogBundle {
    #[must_use]
    pub fn is_control_message(&self) -> bool {
        self.message_type == MessageType::ControlMessage
    }
}

/// One log event. Structured sources may attach arbitrary keys next to
/// `message`; those are kept in `fields` in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Epoch milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    pub message: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(skip)]
    key_order: Vec<String>,
}

impl LogRecord {
    #[must_use]
    pub fn new(id: impl Into<String>, timestamp: i64, message: impl Into<String>) -> Self {
        LogRecord {
            id: Some(id.into()),
            timestamp: Some(timestamp),
            message: message.into(),
            fields: Map::new(),
            key_order: vec!["id".to_string(), "timestamp".to_string(), "message".to_string()],
        }
    }

    /// Names of the keys present on the event, in the order they arrived.
    /// Fields inserted after decoding come last.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.key_order.iter().map(String::as_str).collect();
        keys.extend(
            self.fields
                .keys()
                .filter(|key| !self.key_order.contains(key))
                .map(String::as_str),
        );
        keys
    }
}

impl<'de> Deserialize<'de> for LogRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let object = Map::<String, Value>::deserialize(deserializer)?;
        let mut id = None;
        let mut timestamp = None;
        let mut message = None;
        let mut fields = Map::new();
        let mut key_order = Vec::with_capacity(object.len());

        for (key, value) in object {
            key_order.push(key.clone());
            match key.as_str() {
                "id" => id = serde_json::from_value(value).map_err(de::Error::custom)?,
                "timestamp" => timestamp = serde_json::from_value(value).map_err(de::Error::custom)?,
                "message" => {
                    message = Some(serde_json::from_value(value).map_err(de::Error::custom)?);
                }
                _ => {
                    fields.insert(key, value);
                }
            }
        }

        Ok(LogRecord {
            id,
            timestamp,
            message: message.ok_or_else(|| de::Error::missing_field("message"))?,
            fields,
            key_order,
        })
    }
}
