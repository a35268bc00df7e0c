//! # Herald Visitor
//!
//! Per-visitor quota enforcement. A visitor is the identity charged for a
//! request: an authenticated account, or an anonymous IP address.
//!
//! - [`TokenBucket`]: lazily refilled bucket, no timers
//! - [`Visitor`]: message, email and attachment-bandwidth buckets plus a
//!   concurrent subscription count, guarded by one lock
//! - [`VisitorTracker`]: shared identity → visitor map with idle eviction

pub mod limits;
pub mod rate_limit;
pub mod tracker;
pub mod visitor;

pub use limits::{LimitBasis, Limits, Resource};
pub use rate_limit::TokenBucket;
pub use tracker::VisitorTracker;
pub use visitor::{SubscriptionPermit, Visitor, VisitorInfo, VisitorStats};
