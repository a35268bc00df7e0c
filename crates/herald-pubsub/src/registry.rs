use crate::topic::{Topic, TopicSettings};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Outcome of a registry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub messages: usize,
    pub topics: usize,
}

/// Process-wide name → topic directory
#[derive(Debug)]
pub struct TopicRegistry {
    topics: RwLock<HashMap<String, Arc<Topic>>>,
    settings: Arc<TopicSettings>,
    closed: CancellationToken,
}

impl TopicRegistry {
    /// Create a new topic registry
    pub fn new(settings: TopicSettings) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            settings: Arc::new(settings),
            closed: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &TopicSettings {
        &self.settings
    }

    /// Get a topic, creating it on first access. Concurrent first accesses
    /// observe the same instance.
    pub async fn get_or_create(&self, name: &str) -> Arc<Topic> {
        if let Some(topic) = self.topics.read().await.get(name) {
            return Arc::clone(topic);
        }

        let mut topics = self.topics.write().await;
        let topic = topics.entry(name.to_string()).or_insert_with(|| {
            info!(topic = %name, "Created topic");
            Arc::new(Topic::with_closed(
                name,
                Arc::clone(&self.settings),
                self.closed.clone(),
            ))
        });
        Arc::clone(topic)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Topic>> {
        self.topics.read().await.get(name).cloned()
    }

    pub async fn len(&self) -> usize {
        self.topics.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.topics.read().await.is_empty()
    }

    /// Prune expired messages everywhere and drop topics nobody holds that
    /// have neither subscribers nor buffered messages
    pub async fn prune(&self, now: i64) -> PruneStats {
        let mut topics = self.topics.write().await;
        let mut stats = PruneStats::default();
        for topic in topics.values() {
            stats.messages += topic.prune(now);
        }

        let before = topics.len();
        topics.retain(|_, topic| Arc::strong_count(topic) > 1 || !topic.is_empty());
        stats.topics = before - topics.len();

        if stats.messages > 0 || stats.topics > 0 {
            info!(
                pruned_messages = stats.messages,
                pruned_topics = stats.topics,
                remaining_topics = topics.len(),
                "Pruned topics"
            );
        }
        stats
    }

    /// Close every subscriber of every topic and refuse new ones, including
    /// on topics created later. Returns the number closed.
    pub async fn shutdown(&self) -> usize {
        self.closed.cancel();
        let topics = self.topics.read().await;
        let closed = topics.values().map(|topic| topic.close_all()).sum();
        info!(topics = topics.len(), closed, "Closed all subscribers");
        closed
    }
}

impl Default for TopicRegistry {
    fn default() -> Self {
        Self::new(TopicSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::Since;
    use crate::subscriber::SubscriberState;
    use herald_core::{Identity, Message};
    use pretty_assertions::assert_eq;
    use std::net::{IpAddr, Ipv4Addr};

    fn anonymous() -> Identity {
        Identity::anonymous(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let fixture = TopicRegistry::default();
        let first = fixture.get_or_create("mytopic").await;
        let second = fixture.get_or_create("mytopic").await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fixture.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_access_creates_one_topic() {
        let fixture = Arc::new(TopicRegistry::default());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&fixture);
            handles.push(tokio::spawn(async move {
                registry.get_or_create("contended").await
            }));
        }

        let mut topics = Vec::new();
        for handle in handles {
            topics.push(handle.await.unwrap());
        }

        assert_eq!(fixture.len().await, 1);
        assert!(topics.iter().all(|t| Arc::ptr_eq(t, &topics[0])));
    }

    #[tokio::test]
    async fn test_get_missing_topic() {
        let fixture = TopicRegistry::default();
        assert!(fixture.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_prune_drops_only_unused_empty_topics() {
        let fixture = TopicRegistry::default();
        drop(fixture.get_or_create("empty").await);

        let busy = fixture.get_or_create("busy").await;
        busy.publish(&anonymous(), Message::new("busy", "hi"), || Ok(()))
            .unwrap();
        drop(busy);

        let held = fixture.get_or_create("held").await;

        let actual = fixture.prune(chrono::Utc::now().timestamp()).await;
        assert_eq!(actual.topics, 1);
        assert!(fixture.get("empty").await.is_none());
        assert!(fixture.get("busy").await.is_some());
        assert!(fixture.get("held").await.is_some());
        drop(held);
    }

    #[tokio::test]
    async fn test_shutdown_closes_subscribers() {
        let fixture = TopicRegistry::default();
        let topic = fixture.get_or_create("mytopic").await;
        let mut subscription = topic.subscribe(anonymous(), &Since::None).unwrap();

        let actual = fixture.shutdown().await;
        assert_eq!(actual, 1);
        assert_eq!(subscription.state(), SubscriberState::Disconnected);

        // open event is still delivered, then the stream ends
        assert!(subscription.next().await.is_some());
        assert!(subscription.next().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdown_refuses_late_subscribers() {
        let fixture = TopicRegistry::default();
        let existing = fixture.get_or_create("existing").await;
        fixture.shutdown().await;

        let actual = existing.subscribe(anonymous(), &Since::None).unwrap_err();
        assert_eq!(actual.category(), "unavailable");

        let created_later = fixture.get_or_create("later").await;
        let actual = created_later.subscribe(anonymous(), &Since::None).unwrap_err();
        assert_eq!(actual.category(), "unavailable");

        // Polling buffered history still works while draining
        assert!(existing.poll(&anonymous(), &Since::All).is_ok());
    }
}
