use crate::limits::{Limits, Resource};
use crate::rate_limit::TokenBucket;
use herald_core::{Error, Result, VisitorKey};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

/// Rate-limited identity behind a request.
///
/// All buckets and counters sit behind a single lock, so a check-and-deduct
/// over several resources is atomic.
#[derive(Debug)]
pub struct Visitor {
    key: VisitorKey,
    quota_window: Duration,
    state: Mutex<VisitorState>,
}

#[derive(Debug)]
struct VisitorState {
    limits: Limits,
    messages: TokenBucket,
    emails: TokenBucket,
    bandwidth: TokenBucket,
    subscriptions: usize,
    messages_charged: u64,
    emails_charged: u64,
    last_seen: Instant,
}

impl VisitorState {
    fn bucket(&self, resource: Resource) -> &TokenBucket {
        match resource {
            Resource::Messages => &self.messages,
            Resource::Emails => &self.emails,
            Resource::AttachmentBandwidth => &self.bandwidth,
        }
    }

    fn bucket_mut(&mut self, resource: Resource) -> &mut TokenBucket {
        match resource {
            Resource::Messages => &mut self.messages,
            Resource::Emails => &mut self.emails,
            Resource::AttachmentBandwidth => &mut self.bandwidth,
        }
    }

    fn record(&mut self, resource: Resource, amount: u64) {
        match resource {
            Resource::Messages => self.messages_charged += amount,
            Resource::Emails => self.emails_charged += amount,
            Resource::AttachmentBandwidth => {}
        }
    }
}

/// Sum repeated resources so each bucket is checked against its full charge
fn combine(charges: &[(Resource, u64)]) -> Vec<(Resource, u64)> {
    let mut totals: Vec<(Resource, u64)> = Vec::with_capacity(charges.len());
    for &(resource, amount) in charges {
        match totals.iter_mut().find(|(seen, _)| *seen == resource) {
            Some((_, total)) => *total = total.saturating_add(amount),
            None => totals.push((resource, amount)),
        }
    }
    totals
}

/// Usage counters reported on the account endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitorStats {
    pub messages: u64,
    pub messages_remaining: u64,
    pub emails: u64,
    pub emails_remaining: u64,
    pub attachment_bandwidth_remaining: u64,
    pub subscriptions: usize,
}

/// Snapshot of a visitor's limits and usage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitorInfo {
    pub limits: Limits,
    pub stats: VisitorStats,
}

impl Visitor {
    /// Create a new visitor with full buckets
    pub fn new(key: VisitorKey, limits: Limits, quota_window: Duration) -> Self {
        Self::new_at(key, limits, quota_window, Instant::now())
    }

    pub(crate) fn new_at(
        key: VisitorKey,
        limits: Limits,
        quota_window: Duration,
        now: Instant,
    ) -> Self {
        let state = VisitorState {
            messages: TokenBucket::new(limits.messages, quota_window, now),
            emails: TokenBucket::new(limits.emails, quota_window, now),
            bandwidth: TokenBucket::new(limits.attachment_bandwidth, quota_window, now),
            limits,
            subscriptions: 0,
            messages_charged: 0,
            emails_charged: 0,
            last_seen: now,
        };
        Self {
            key,
            quota_window,
            state: Mutex::new(state),
        }
    }

    pub fn key(&self) -> &VisitorKey {
        &self.key
    }

    pub fn limits(&self) -> Limits {
        self.state.lock().limits.clone()
    }

    /// Charge `amount` of a single resource
    pub fn allow(&self, resource: Resource, amount: u64) -> Result<()> {
        self.allow_all(&[(resource, amount)])
    }

    /// Charge several resources at once. Either every bucket is charged or,
    /// on `QuotaExceeded`, none is.
    pub fn allow_all(&self, charges: &[(Resource, u64)]) -> Result<()> {
        self.allow_all_at(charges, Instant::now())
    }

    pub(crate) fn allow_all_at(&self, charges: &[(Resource, u64)], now: Instant) -> Result<()> {
        let mut state = self.state.lock();
        state.last_seen = now;

        let totals = combine(charges);
        for &(resource, amount) in &totals {
            if !state.bucket(resource).can_allow_at(amount, now) {
                warn!(visitor = %self.key, resource = %resource, amount, "Quota exceeded");
                return Err(Error::quota_exceeded(resource.to_string()));
            }
        }
        for &(resource, amount) in &totals {
            let charged = state.bucket_mut(resource).allow_at(amount, now);
            debug_assert!(charged, "{resource} bucket was checked under the same lock");
            state.record(resource, amount);
        }
        Ok(())
    }

    /// Apply limits resolved for the current request. Tokens already
    /// issued are kept, capped at the new capacities.
    pub fn update_limits(&self, limits: Limits) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.last_seen = now;
        if state.limits == limits {
            return;
        }
        let window = self.quota_window;
        state.messages.reconfigure(limits.messages, window, now);
        state.emails.reconfigure(limits.emails, window, now);
        state
            .bandwidth
            .reconfigure(limits.attachment_bandwidth, window, now);
        state.limits = limits;
    }

    /// Reserve one concurrent subscription slot
    pub fn acquire_subscription(self: &Arc<Self>) -> Result<SubscriptionPermit> {
        let mut state = self.state.lock();
        state.last_seen = Instant::now();
        if state.subscriptions >= state.limits.subscriptions {
            warn!(visitor = %self.key, limit = state.limits.subscriptions, "Subscription limit reached");
            return Err(Error::quota_exceeded("subscriptions"));
        }
        state.subscriptions += 1;
        Ok(SubscriptionPermit {
            visitor: Arc::clone(self),
        })
    }

    pub fn subscriptions(&self) -> usize {
        self.state.lock().subscriptions
    }

    pub fn info(&self) -> VisitorInfo {
        self.info_at(Instant::now())
    }

    pub(crate) fn info_at(&self, now: Instant) -> VisitorInfo {
        let state = self.state.lock();
        VisitorInfo {
            limits: state.limits.clone(),
            stats: VisitorStats {
                messages: state.messages_charged,
                messages_remaining: state.messages.available_at(now).floor() as u64,
                emails: state.emails_charged,
                emails_remaining: state.emails.available_at(now).floor() as u64,
                attachment_bandwidth_remaining: state.bandwidth.available_at(now).floor() as u64,
                subscriptions: state.subscriptions,
            },
        }
    }

    /// Idle visitors hold no subscriptions and have not been seen for `ttl`.
    /// Returns `false` when the visitor is locked by an in-flight check.
    pub fn is_idle(&self, ttl: Duration, now: Instant) -> bool {
        match self.state.try_lock() {
            Some(state) => {
                state.subscriptions == 0 && now.saturating_duration_since(state.last_seen) >= ttl
            }
            None => false,
        }
    }

    fn release_subscription(&self) {
        let mut state = self.state.lock();
        state.subscriptions = state.subscriptions.saturating_sub(1);
        state.last_seen = Instant::now();
    }
}

/// Open subscription slot, released on drop
#[derive(Debug)]
pub struct SubscriptionPermit {
    visitor: Arc<Visitor>,
}

impl SubscriptionPermit {
    pub fn visitor(&self) -> &Arc<Visitor> {
        &self.visitor
    }
}

impl Drop for SubscriptionPermit {
    fn drop(&mut self) {
        self.visitor.release_subscription();
    }
}
