use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Named quota plan bounding a visitor's usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Setters)]
#[setters(into)]
pub struct Tier {
    pub id: String,
    pub code: String,
    pub name: String,
    pub messages_limit: u64,
    #[serde(with = "duration_secs")]
    pub messages_expiry_duration: Duration,
    pub emails_limit: u64,
    pub reservations_limit: u64,
    pub attachment_file_size_limit: u64,
    pub attachment_total_size_limit: u64,
    #[serde(with = "duration_secs")]
    pub attachment_expiry_duration: Duration,
    pub attachment_bandwidth_limit: u64,
}

impl Tier {
    /// Create a new tier with the given code and zeroed limits
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            id: String::new(),
            name: code.clone(),
            code,
            messages_limit: 0,
            messages_expiry_duration: Duration::ZERO,
            emails_limit: 0,
            reservations_limit: 0,
            attachment_file_size_limit: 0,
            attachment_total_size_limit: 0,
            attachment_expiry_duration: Duration::ZERO,
            attachment_bandwidth_limit: 0,
        }
    }
}

/// Durations travel as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tier_setters() {
        let actual = Tier::new("pro")
            .name("Pro")
            .messages_limit(5000u64)
            .reservations_limit(2u64)
            .messages_expiry_duration(Duration::from_secs(3600));

        assert_eq!(actual.code, "pro");
        assert_eq!(actual.name, "Pro");
        assert_eq!(actual.messages_limit, 5000);
        assert_eq!(actual.reservations_limit, 2);
        assert_eq!(actual.emails_limit, 0);
    }

    #[test]
    fn test_tier_durations_serialize_as_seconds() {
        let fixture = Tier::new("pro").messages_expiry_duration(Duration::from_secs(7200));
        let actual = serde_json::to_value(&fixture).unwrap();
        assert_eq!(actual["messages_expiry_duration"], 7200);
    }
}
