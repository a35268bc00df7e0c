//! Request-level facade over topics, visitors and the account store.

use derive_setters::Setters;
use herald_config::Config;
use herald_core::{
    AccountStore, Attachment, Error, Identity, Message, Reservation, Result, SubscriberId,
};
use herald_pubsub::{
    Since, SubscriberState, Subscription, Topic, TopicRegistry, TopicSettings,
    validate_topic_name,
};
use herald_visitor::{Resource, SubscriptionPermit, VisitorTracker};
use std::sync::Arc;
use tracing::debug;

/// Attachment metadata supplied with a publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub name: String,
    pub size: u64,
}

/// Everything a publisher sends besides the topic name
#[derive(Debug, Clone, Default, PartialEq, Setters)]
#[setters(strip_option, into)]
pub struct PublishRequest {
    pub message: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
    pub priority: Option<u8>,
    pub email: Option<String>,
    pub attachment: Option<AttachmentUpload>,
}

impl PublishRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// A live subscription together with the visitor's subscription slot.
/// The slot is released when this value is dropped.
#[derive(Debug)]
pub struct ActiveSubscription {
    subscription: Subscription,
    _permit: SubscriptionPermit,
}

impl ActiveSubscription {
    pub fn id(&self) -> SubscriberId {
        self.subscription.id()
    }

    pub fn topic(&self) -> &Arc<Topic> {
        self.subscription.topic()
    }

    pub fn state(&self) -> SubscriberState {
        self.subscription.state()
    }

    pub async fn next(&mut self) -> Option<Arc<Message>> {
        self.subscription.next().await
    }

    /// Report a failed write to the client
    pub fn fail(&self) {
        self.subscription.fail();
    }
}

/// Process-wide notification service.
///
/// Owns the topic registry and visitor tracker for the lifetime of the
/// process and is handed to request handlers by reference.
pub struct NotificationService {
    registry: Arc<TopicRegistry>,
    tracker: Arc<VisitorTracker>,
    store: Arc<dyn AccountStore>,
    config: Arc<Config>,
}

impl NotificationService {
    pub fn new(config: Config, store: Arc<dyn AccountStore>) -> Self {
        let settings = TopicSettings::new(&config.cache, config.auth.default_access);
        Self {
            registry: Arc::new(TopicRegistry::new(settings)),
            tracker: Arc::new(VisitorTracker::new(
                config.visitor.clone(),
                config.cache.clone(),
            )),
            store,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &Arc<VisitorTracker> {
        &self.tracker
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    /// Resolve a bearer token to an authenticated identity
    pub async fn authenticate(&self, token: &str) -> Result<Identity> {
        let user = self.store.authenticate_token(token).await?;
        Ok(Identity::user(user))
    }

    /// Publish a message to a topic.
    ///
    /// Checks run in order: validation, write permission, quota (all
    /// buckets at once), then append and fan-out.
    pub async fn publish(
        &self,
        topic: &str,
        identity: &Identity,
        request: PublishRequest,
    ) -> Result<Arc<Message>> {
        validate_topic_name(topic)?;
        self.validate_publish(&request)?;

        let topic = self.topic(topic).await?;
        let visitor = self.tracker.resolve(identity).await;
        let limits = visitor.limits();

        let mut charges = vec![(Resource::Messages, 1)];
        if request.email.is_some() {
            charges.push((Resource::Emails, 1));
        }
        if let Some(upload) = &request.attachment {
            if upload.size > limits.attachment_file_size {
                return Err(Error::validation(format!(
                    "attachment of {} bytes exceeds the limit of {} bytes",
                    upload.size, limits.attachment_file_size
                )));
            }
            charges.push((Resource::AttachmentBandwidth, upload.size));
        }

        let mut message = Message::new(topic.name(), request.message);
        let time = message.time;
        message.expires = Some(time + limits.messages_expiry_duration.as_secs() as i64);
        message.title = request.title;
        message.tags = request.tags;
        message.priority = request.priority;
        message.email = request.email;
        message.attachment = request.attachment.map(|upload| Attachment {
            name: upload.name,
            size: upload.size,
            expires: time + limits.attachment_expiry_duration.as_secs() as i64,
        });

        topic.publish(identity, message, || visitor.allow_all(&charges))
    }

    fn validate_publish(&self, request: &PublishRequest) -> Result<()> {
        let limit = self.config.visitor.message_size_limit;
        if request.message.len() > limit {
            return Err(Error::validation(format!(
                "message of {} bytes exceeds the limit of {limit} bytes",
                request.message.len()
            )));
        }
        match request.priority {
            Some(priority) if !(1..=5).contains(&priority) => Err(Error::validation(format!(
                "priority must be between 1 and 5, got {priority}"
            ))),
            _ => Ok(()),
        }
    }

    /// Open a live subscription. The stream starts with an open event,
    /// then the history selected by `since`, then live messages.
    pub async fn subscribe(
        &self,
        topic: &str,
        identity: &Identity,
        since: &Since,
    ) -> Result<ActiveSubscription> {
        validate_topic_name(topic)?;
        let topic = self.topic(topic).await?;
        let visitor = self.tracker.resolve(identity).await;

        let permit = visitor.acquire_subscription()?;
        let subscription = topic.subscribe(identity.clone(), since)?;
        Ok(ActiveSubscription {
            subscription,
            _permit: permit,
        })
    }

    /// Buffered history without registering a subscriber
    pub async fn poll(
        &self,
        topic: &str,
        identity: &Identity,
        since: &Since,
    ) -> Result<Vec<Arc<Message>>> {
        validate_topic_name(topic)?;
        let topic = self.topic(topic).await?;
        self.tracker.resolve(identity).await;
        topic.poll(identity, since)
    }

    /// Apply a reservation change that has already been persisted and evict
    /// subscribers that lost read access. Returns the number evicted.
    ///
    /// The topic is created if needed so a concurrent first access can never
    /// install a stale reservation read. Waits for any reservation change
    /// in progress on the topic.
    pub async fn notify_reservation_changed(
        &self,
        topic: &str,
        reservation: Option<Reservation>,
    ) -> usize {
        let topic = self.registry.get_or_create(topic).await;
        let _update = topic.lock_updates().await;
        topic.apply_reservation(reservation)
    }

    /// Force-evict every subscriber of `topic` not authenticated as
    /// `except`. Returns the number evicted.
    pub async fn cancel_subscribers(&self, topic: &str, except: &str) -> usize {
        match self.registry.get(topic).await {
            Some(topic) => topic.cancel_subscribers_except(except),
            None => 0,
        }
    }

    /// Close every subscriber so streaming responses end
    pub async fn shutdown(&self) -> usize {
        self.registry.shutdown().await
    }

    async fn topic(&self, name: &str) -> Result<Arc<Topic>> {
        let topic = self.registry.get_or_create(name).await;
        if !topic.reservation_loaded() {
            let reservation = self.store.reservation_for(name).await?;
            debug!(topic = %name, reserved = reservation.is_some(), "Loaded reservation");
            topic.load_reservation(reservation);
        }
        Ok(topic)
    }
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
