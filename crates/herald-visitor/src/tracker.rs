use crate::limits::Limits;
use crate::visitor::Visitor;
use herald_config::{CacheConfig, VisitorConfig};
use herald_core::{Identity, VisitorKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Process-wide directory of visitors, one per identity
pub struct VisitorTracker {
    visitors: RwLock<HashMap<VisitorKey, Arc<Visitor>>>,
    visitor_config: VisitorConfig,
    cache_config: CacheConfig,
}

impl VisitorTracker {
    /// Create a new visitor tracker
    pub fn new(visitor_config: VisitorConfig, cache_config: CacheConfig) -> Self {
        Self {
            visitors: RwLock::new(HashMap::new()),
            visitor_config,
            cache_config,
        }
    }

    /// Limits for an identity: its tier's, or the anonymous defaults
    pub fn limits_for(&self, identity: &Identity) -> Limits {
        match identity.tier() {
            Some(tier) => Limits::from_tier(tier, &self.visitor_config),
            None => Limits::anonymous(&self.visitor_config, &self.cache_config),
        }
    }

    /// Return the shared visitor for an identity, creating it on first use.
    /// Limits are refreshed from the identity's current tier on every call.
    pub async fn resolve(&self, identity: &Identity) -> Arc<Visitor> {
        let key = identity.visitor_key();
        let limits = self.limits_for(identity);

        let existing = self.visitors.read().await.get(&key).cloned();
        let visitor = match existing {
            Some(visitor) => visitor,
            None => {
                let mut visitors = self.visitors.write().await;
                Arc::clone(visitors.entry(key.clone()).or_insert_with(|| {
                    debug!(visitor = %key, "Created visitor");
                    Arc::new(Visitor::new(
                        key,
                        limits.clone(),
                        self.visitor_config.quota_window,
                    ))
                }))
            }
        };

        visitor.update_limits(limits);
        visitor
    }

    /// Look up a visitor without creating it
    pub async fn get(&self, key: &VisitorKey) -> Option<Arc<Visitor>> {
        self.visitors.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.visitors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.visitors.read().await.is_empty()
    }

    /// Drop visitors idle for longer than the configured TTL
    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now()).await
    }

    /// Eviction skips visitors referenced by an in-flight request or an
    /// open subscription, and visitors whose lock is currently held.
    pub async fn evict_idle_at(&self, now: Instant) -> usize {
        let ttl = self.visitor_config.ttl;
        let mut visitors = self.visitors.write().await;
        let before = visitors.len();
        visitors.retain(|_, visitor| Arc::strong_count(visitor) > 1 || !visitor.is_idle(ttl, now));
        let evicted = before - visitors.len();
        if evicted > 0 {
            info!(evicted, remaining = visitors.len(), "Evicted idle visitors");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{LimitBasis, Resource};
    use herald_core::{Role, Tier, User};
    use pretty_assertions::assert_eq;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn tracker() -> VisitorTracker {
        VisitorTracker::new(
            VisitorConfig::default().ttl(Duration::from_secs(60)),
            CacheConfig::default(),
        )
    }

    fn anonymous() -> Identity {
        Identity::anonymous(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
    }

    #[tokio::test]
    async fn test_resolve_returns_same_instance() {
        let fixture = tracker();
        let first = fixture.resolve(&anonymous()).await;
        let second = fixture.resolve(&anonymous()).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fixture.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_resolve_creates_one_visitor() {
        let fixture = Arc::new(tracker());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let tracker = Arc::clone(&fixture);
            handles.push(tokio::spawn(async move { tracker.resolve(&anonymous()).await }));
        }

        let mut visitors = Vec::new();
        for handle in handles {
            visitors.push(handle.await.unwrap());
        }

        assert_eq!(fixture.len().await, 1);
        assert!(visitors.iter().all(|v| Arc::ptr_eq(v, &visitors[0])));
    }

    #[tokio::test]
    async fn test_tier_change_picked_up_on_next_resolve() {
        let fixture = tracker();
        let free = Identity::user(User::new("phil", Role::User));
        let visitor = fixture.resolve(&free).await;
        assert_eq!(visitor.limits().basis, LimitBasis::Ip);

        let pro = Identity::user(
            User::new("phil", Role::User).with_tier(Tier::new("pro").messages_limit(5u64)),
        );
        let visitor = fixture.resolve(&pro).await;
        let actual = visitor.limits();
        assert_eq!(actual.basis, LimitBasis::Tier);
        assert_eq!(actual.messages, 5);
    }

    #[tokio::test]
    async fn test_evict_idle_visitors() {
        let fixture = tracker();
        drop(fixture.resolve(&anonymous()).await);

        let actual = fixture.evict_idle_at(Instant::now()).await;
        assert_eq!(actual, 0);

        let actual = fixture
            .evict_idle_at(Instant::now() + Duration::from_secs(120))
            .await;
        assert_eq!(actual, 1);
        assert!(fixture.is_empty().await);
    }

    #[tokio::test]
    async fn test_evict_skips_visitors_in_use() {
        let fixture = tracker();
        let held = fixture.resolve(&anonymous()).await;
        held.allow(Resource::Messages, 1).unwrap();

        let actual = fixture
            .evict_idle_at(Instant::now() + Duration::from_secs(120))
            .await;
        assert_eq!(actual, 0);

        drop(held);
        let actual = fixture
            .evict_idle_at(Instant::now() + Duration::from_secs(120))
            .await;
        assert_eq!(actual, 1);
    }

    #[tokio::test]
    async fn test_evict_skips_visitors_with_subscriptions() {
        let fixture = tracker();
        let visitor = fixture.resolve(&anonymous()).await;
        let permit = visitor.acquire_subscription().unwrap();
        drop(visitor);

        let actual = fixture
            .evict_idle_at(Instant::now() + Duration::from_secs(120))
            .await;
        assert_eq!(actual, 0);
        drop(permit);
    }
}
