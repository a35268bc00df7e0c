use herald_config::{CacheConfig, VisitorConfig};
use herald_core::Tier;
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

const ONE_DAY: Duration = Duration::from_secs(24 * 3600);
const DEFAULT_ATTACHMENT_EXPIRY: Duration = Duration::from_secs(3 * 3600);

/// Where a visitor's limits come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitBasis {
    /// Anonymous defaults, keyed by IP
    Ip,
    /// The account's tier
    Tier,
}

/// A rate-limited resource with its own bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Messages,
    Emails,
    /// Attachment bytes
    AttachmentBandwidth,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Messages => "messages",
            Self::Emails => "emails",
            Self::AttachmentBandwidth => "attachment bandwidth",
        };
        f.write_str(s)
    }
}

/// Effective quota limits of one visitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Limits {
    pub basis: LimitBasis,
    pub messages: u64,
    #[serde(serialize_with = "as_secs")]
    pub messages_expiry_duration: Duration,
    pub emails: u64,
    pub reservations: u64,
    pub attachment_file_size: u64,
    pub attachment_total_size: u64,
    #[serde(serialize_with = "as_secs")]
    pub attachment_expiry_duration: Duration,
    pub attachment_bandwidth: u64,
    pub subscriptions: usize,
}

impl Limits {
    /// Limits for visitors without a tier.
    ///
    /// Daily message and email allowances are one day divided by the
    /// configured replenish intervals.
    pub fn anonymous(visitor: &VisitorConfig, cache: &CacheConfig) -> Self {
        Self {
            basis: LimitBasis::Ip,
            messages: per_day(visitor.request_limit_replenish),
            messages_expiry_duration: cache.duration,
            emails: per_day(visitor.email_limit_replenish),
            reservations: 0,
            attachment_file_size: visitor.attachment_file_size_limit,
            attachment_total_size: visitor.attachment_total_size_limit,
            attachment_expiry_duration: DEFAULT_ATTACHMENT_EXPIRY,
            attachment_bandwidth: visitor.attachment_bandwidth_limit,
            subscriptions: visitor.subscription_limit,
        }
    }

    pub fn from_tier(tier: &Tier, visitor: &VisitorConfig) -> Self {
        Self {
            basis: LimitBasis::Tier,
            messages: tier.messages_limit,
            messages_expiry_duration: tier.messages_expiry_duration,
            emails: tier.emails_limit,
            reservations: tier.reservations_limit,
            attachment_file_size: tier.attachment_file_size_limit,
            attachment_total_size: tier.attachment_total_size_limit,
            attachment_expiry_duration: tier.attachment_expiry_duration,
            attachment_bandwidth: tier.attachment_bandwidth_limit,
            subscriptions: visitor.subscription_limit,
        }
    }

    /// Bucket capacity for a resource
    pub fn capacity(&self, resource: Resource) -> u64 {
        match resource {
            Resource::Messages => self.messages,
            Resource::Emails => self.emails,
            Resource::AttachmentBandwidth => self.attachment_bandwidth,
        }
    }
}

fn per_day(replenish: Duration) -> u64 {
    if replenish.is_zero() {
        return 0;
    }
    (ONE_DAY.as_secs_f64() / replenish.as_secs_f64()) as u64
}

fn as_secs<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(duration.as_secs())
}
