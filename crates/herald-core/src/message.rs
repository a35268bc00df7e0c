use crate::id::MessageId;
use serde::{Deserialize, Serialize};

/// Message body used when a publish carries no text
pub const DEFAULT_MESSAGE_BODY: &str = "triggered";

/// Kind of entry on a subscriber stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Synthetic first entry of every stream
    Open,
    Keepalive,
    Message,
}

/// File attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub size: u64,
    pub expires: i64,
}

/// Immutable record published to a topic.
///
/// Timestamps are unix seconds. Once appended to a topic's replay buffer a
/// message is shared behind an `Arc` and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
    pub event: EventKind,
    pub topic: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    /// Address a copy was sent to; never echoed to subscribers
    #[serde(skip)]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl Message {
    /// Create a new message event stamped with the current time
    pub fn new(topic: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            message: if message.is_empty() {
                DEFAULT_MESSAGE_BODY.to_string()
            } else {
                message
            },
            ..Self::event(EventKind::Message, topic)
        }
    }

    /// Create the synthetic open event that starts every stream
    pub fn open(topic: impl Into<String>) -> Self {
        Self::event(EventKind::Open, topic)
    }

    pub fn keepalive(topic: impl Into<String>) -> Self {
        Self::event(EventKind::Keepalive, topic)
    }

    fn event(event: EventKind, topic: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            time: chrono::Utc::now().timestamp(),
            expires: None,
            event,
            topic: topic.into(),
            message: String::new(),
            title: None,
            tags: Vec::new(),
            priority: None,
            email: None,
            attachment: None,
        }
    }

    /// Whether the message has expired at `now` (unix seconds)
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}
