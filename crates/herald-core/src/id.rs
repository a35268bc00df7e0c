use serde::{Deserialize, Serialize};
use std::fmt;

const MESSAGE_ID_LENGTH: usize = 12;
const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a new unique ID with a prefix, e.g. `ti_<uuid>` for tiers
pub fn generate_id_with_prefix(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Short random identifier carried by every message.
///
/// Twelve alphanumeric characters starting with a letter, so an id used as
/// a `since` cursor never reads as a timestamp or a duration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new random message ID
    pub fn new() -> Self {
        let mut bits = uuid::Uuid::new_v4().as_u128();
        let mut id = String::with_capacity(MESSAGE_ID_LENGTH);
        id.push(pick(LETTERS, &mut bits));
        while id.len() < MESSAGE_ID_LENGTH {
            id.push(pick(ALPHANUMERIC, &mut bits));
        }
        Self(id)
    }

    /// Wrap an existing message ID, e.g. one received as a `since` cursor
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn pick(alphabet: &[u8], bits: &mut u128) -> char {
    let len = alphabet.len() as u128;
    let index = (*bits % len) as usize;
    *bits /= len;
    char::from(alphabet[index])
}

/// Unique identifier for a subscriber session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriberId(uuid::Uuid);

impl SubscriberId {
    /// Create a new random subscriber ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_id_with_prefix() {
        let fixture = "ti";
        let actual = generate_id_with_prefix(fixture);
        assert!(actual.starts_with("ti_"));
        assert_eq!(actual.len(), 3 + 32);
    }

    #[test]
    fn test_message_id_length() {
        let actual = MessageId::new();
        assert_eq!(actual.as_str().len(), MESSAGE_ID_LENGTH);
        assert!(actual.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_message_id_starts_with_letter() {
        for _ in 0..10_000 {
            let fixture = MessageId::new();
            let actual = fixture.as_str().chars().next().unwrap();
            assert!(actual.is_ascii_alphabetic(), "id {fixture} starts with {actual}");
        }
    }

    #[test]
    fn test_message_ids_are_unique() {
        let first = MessageId::new();
        let second = MessageId::new();
        assert_ne!(first, second);
    }

    #[test]
    fn test_message_id_serializes_as_plain_string() {
        let fixture = MessageId::from_string("abcdef123456");
        let actual = serde_json::to_string(&fixture).unwrap();
        let expected = "\"abcdef123456\"";
        assert_eq!(actual, expected);
    }
}
