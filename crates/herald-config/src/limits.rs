use crate::duration::humantime_serde;
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MEGABYTE: u64 = 1024 * 1024;

/// Per-topic replay buffer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of buffered messages per topic
    pub max_messages: usize,
    /// Maximum age of a buffered message
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Capacity of each subscriber's delivery channel
    pub subscriber_buffer: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_messages: 1000,
            duration: Duration::from_secs(12 * 3600),
            subscriber_buffer: 256,
        }
    }
}

/// Quota settings for visitors without a tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Setters)]
#[setters(strip_option, into)]
#[serde(default)]
pub struct VisitorConfig {
    /// Time to earn back one message for anonymous visitors
    #[serde(with = "humantime_serde")]
    pub request_limit_replenish: Duration,
    /// Time to earn back one email for anonymous visitors
    #[serde(with = "humantime_serde")]
    pub email_limit_replenish: Duration,
    /// Window over which every bucket refills completely
    #[serde(with = "humantime_serde")]
    pub quota_window: Duration,
    /// Concurrent subscriptions per visitor
    pub subscription_limit: usize,
    /// Maximum message body size in bytes
    pub message_size_limit: usize,
    pub attachment_file_size_limit: u64,
    pub attachment_total_size_limit: u64,
    /// Attachment bytes per quota window
    pub attachment_bandwidth_limit: u64,
    /// Idle time before a visitor record is evicted
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for VisitorConfig {
    fn default() -> Self {
        Self {
            request_limit_replenish: Duration::from_secs(5),
            email_limit_replenish: Duration::from_secs(3600),
            quota_window: Duration::from_secs(24 * 3600),
            subscription_limit: 30,
            message_size_limit: 4096,
            attachment_file_size_limit: 15 * MEGABYTE,
            attachment_total_size_limit: 100 * MEGABYTE,
            attachment_bandwidth_limit: 500 * MEGABYTE,
            ttl: Duration::from_secs(24 * 3600),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.subscriber_buffer == 0 {
            return Err(crate::ConfigError::validation(
                "Subscriber buffer must be > 0",
            ));
        }
        Ok(())
    }
}

impl VisitorConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.request_limit_replenish.is_zero() || self.email_limit_replenish.is_zero() {
            return Err(crate::ConfigError::validation(
                "Visitor replenish durations must be > 0",
            ));
        }
        if self.quota_window.is_zero() {
            return Err(crate::ConfigError::validation("Quota window must be > 0"));
        }
        if self.message_size_limit == 0 {
            return Err(crate::ConfigError::validation(
                "Message size limit must be > 0",
            ));
        }
        Ok(())
    }
}
