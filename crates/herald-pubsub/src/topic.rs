use crate::enforcer;
use crate::replay::{ReplayBuffer, Since};
use crate::subscriber::{SubscriberHandle, SubscriberShared, SubscriberState, Subscription};
use derive_setters::Setters;
use herald_config::CacheConfig;
use herald_core::{
    Error, Identity, Message, Permission, Reservation, Result, SubscriberId, resolve_permission,
};
use parking_lot::Mutex;
use regex::Regex;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::{MutexGuard, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

static TOPIC_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-_A-Za-z0-9]{1,64}$").expect("topic regex is valid"));

/// Path segments that can never be topic names
const DISALLOWED_TOPICS: &[&str] = &[
    "docs", "static", "file", "app", "account", "settings", "signup", "login", "v1", "health",
];

/// Reject names that are malformed or collide with reserved paths
pub fn validate_topic_name(name: &str) -> Result<()> {
    if !TOPIC_NAME_REGEX.is_match(name) {
        return Err(Error::validation(format!("invalid topic name: {name}")));
    }
    if DISALLOWED_TOPICS.contains(&name) {
        return Err(Error::validation(format!("topic name not allowed: {name}")));
    }
    Ok(())
}

/// Settings shared by every topic of a registry
#[derive(Debug, Clone, PartialEq, Setters)]
#[setters(into)]
pub struct TopicSettings {
    /// Permission on unreserved topics
    pub default_access: Permission,
    pub max_messages: usize,
    pub max_age: Duration,
    /// Capacity of each subscriber's delivery channel
    pub subscriber_buffer: usize,
}

impl TopicSettings {
    pub fn new(cache: &CacheConfig, default_access: Permission) -> Self {
        Self {
            default_access,
            max_messages: cache.max_messages,
            max_age: cache.duration,
            subscriber_buffer: cache.subscriber_buffer.max(1),
        }
    }
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self::new(&CacheConfig::default(), Permission::ReadWrite)
    }
}

/// In-memory view of a topic's reservation
#[derive(Debug, Clone, PartialEq)]
enum ReservationState {
    /// Not yet read from the account store
    Unknown,
    Loaded(Option<Reservation>),
}

impl ReservationState {
    fn current(&self) -> Option<&Reservation> {
        match self {
            Self::Unknown => None,
            Self::Loaded(reservation) => reservation.as_ref(),
        }
    }
}

#[derive(Debug)]
struct TopicState {
    reservation: ReservationState,
    buffer: ReplayBuffer,
    subscribers: HashMap<SubscriberId, SubscriberHandle>,
}

/// A named channel: replay buffer, live subscribers and reservation, all
/// guarded by one lock so publish, subscribe and reservation changes on the
/// same topic are totally ordered.
#[derive(Debug)]
pub struct Topic {
    name: String,
    settings: Arc<TopicSettings>,
    state: Mutex<TopicState>,
    /// Held from persisting a reservation change until it is applied
    updates: tokio::sync::Mutex<()>,
    /// Cancelled when the owning registry shuts down
    closed: CancellationToken,
}

impl Topic {
    /// Create a new topic
    pub fn new(name: impl Into<String>, settings: Arc<TopicSettings>) -> Self {
        Self::with_closed(name, settings, CancellationToken::new())
    }

    pub(crate) fn with_closed(
        name: impl Into<String>,
        settings: Arc<TopicSettings>,
        closed: CancellationToken,
    ) -> Self {
        let buffer = ReplayBuffer::new(settings.max_messages, settings.max_age);
        Self {
            name: name.into(),
            settings,
            state: Mutex::new(TopicState {
                reservation: ReservationState::Unknown,
                buffer,
                subscribers: HashMap::new(),
            }),
            updates: tokio::sync::Mutex::new(()),
            closed,
        }
    }

    /// Get the topic name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Serialize reservation changes on this topic. Hold the guard from
    /// persisting a change until `apply_reservation` returns, so applied
    /// changes follow the order they were stored in.
    pub async fn lock_updates(&self) -> MutexGuard<'_, ()> {
        self.updates.lock().await
    }

    /// Whether the reservation has been read from the store or applied
    pub fn reservation_loaded(&self) -> bool {
        self.state.lock().reservation != ReservationState::Unknown
    }

    /// Record the reservation read from the store. Ignored when a newer
    /// value was already applied.
    pub fn load_reservation(&self, reservation: Option<Reservation>) {
        let mut state = self.state.lock();
        if state.reservation == ReservationState::Unknown {
            state.reservation = ReservationState::Loaded(reservation);
        }
    }

    pub fn reservation(&self) -> Option<Reservation> {
        self.state.lock().reservation.current().cloned()
    }

    /// Permission `identity` currently holds on this topic
    pub fn permission_for(&self, identity: &Identity) -> Permission {
        let state = self.state.lock();
        resolve_permission(
            identity,
            state.reservation.current(),
            self.settings.default_access,
        )
    }

    /// Publish a message.
    ///
    /// Under the topic lock: check write permission, run `charge` (the
    /// publisher's quota deduction), append to the replay buffer and enqueue
    /// to every subscriber. Subscribers whose channel is full are dropped and
    /// closed as errored after the lock is released.
    pub fn publish<F>(&self, identity: &Identity, message: Message, charge: F) -> Result<Arc<Message>>
    where
        F: FnOnce() -> Result<()>,
    {
        let message = Arc::new(message);
        let dropped = {
            let mut state = self.state.lock();
            let permission = resolve_permission(
                identity,
                state.reservation.current(),
                self.settings.default_access,
            );
            if !permission.can_write() {
                debug!(topic = %self.name, identity = %identity, "Publish denied");
                return Err(Error::forbidden(format!(
                    "not allowed to publish to topic {}",
                    self.name
                )));
            }

            charge()?;

            state.buffer.push(Arc::clone(&message), now());

            let failed: Vec<SubscriberId> = state
                .subscribers
                .iter()
                .filter(|(_, handle)| !handle.try_deliver(&message))
                .map(|(id, _)| *id)
                .collect();
            failed
                .into_iter()
                .filter_map(|id| state.subscribers.remove(&id))
                .collect::<Vec<_>>()
        };

        for handle in dropped {
            if handle.close(SubscriberState::Errored) {
                warn!(topic = %self.name, subscriber_id = %handle.id(), "Dropped slow subscriber");
            }
        }

        debug!(topic = %self.name, message_id = %message.id, "Published message");
        Ok(message)
    }

    /// Register a subscriber if `identity` may read.
    ///
    /// The returned subscription yields an open event, the history selected
    /// by `since`, then live messages.
    pub fn subscribe(self: &Arc<Self>, identity: Identity, since: &Since) -> Result<Subscription> {
        let id = SubscriberId::new();
        let shared = Arc::new(SubscriberShared::new());
        let (sender, receiver) = mpsc::channel(self.settings.subscriber_buffer);

        let history = {
            let mut state = self.state.lock();
            if self.closed.is_cancelled() {
                return Err(Error::unavailable("server is shutting down"));
            }
            let permission = resolve_permission(
                &identity,
                state.reservation.current(),
                self.settings.default_access,
            );
            if !permission.can_read() {
                debug!(topic = %self.name, identity = %identity, "Subscribe denied");
                return Err(Error::forbidden(format!(
                    "not allowed to subscribe to topic {}",
                    self.name
                )));
            }

            let history = state.buffer.since(since, now());
            let handle =
                SubscriberHandle::new(id, identity, permission, sender, Arc::clone(&shared));
            state.subscribers.insert(id, handle);
            history
        };

        let mut pending = VecDeque::with_capacity(history.len() + 1);
        pending.push_back(Arc::new(Message::open(&self.name)));
        pending.extend(history);

        debug!(topic = %self.name, subscriber_id = %id, replay = pending.len() - 1, "Subscriber registered");
        Ok(Subscription::new(
            id,
            Arc::clone(self),
            pending,
            receiver,
            shared,
        ))
    }

    /// Buffered history for a one-shot poll; no subscriber is registered
    pub fn poll(&self, identity: &Identity, since: &Since) -> Result<Vec<Arc<Message>>> {
        let state = self.state.lock();
        let permission = resolve_permission(
            identity,
            state.reservation.current(),
            self.settings.default_access,
        );
        if !permission.can_read() {
            return Err(Error::forbidden(format!(
                "not allowed to read topic {}",
                self.name
            )));
        }
        Ok(state.buffer.since(since, now()))
    }

    /// Apply a persisted reservation change and evict subscribers that
    /// lost read access. Returns the number evicted.
    pub fn apply_reservation(&self, reservation: Option<Reservation>) -> usize {
        let revoked = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.reservation = ReservationState::Loaded(reservation);
            enforcer::sweep(
                &mut state.subscribers,
                state.reservation.current(),
                self.settings.default_access,
            )
        };

        let evicted = close_all(revoked, SubscriberState::Evicted);
        info!(topic = %self.name, evicted, "Applied reservation change");
        evicted
    }

    /// Evict every subscriber not authenticated as `except`. Anonymous
    /// subscribers are always evicted.
    pub fn cancel_subscribers_except(&self, except: &str) -> usize {
        let cancelled = {
            let mut state = self.state.lock();
            let ids: Vec<SubscriberId> = state
                .subscribers
                .iter()
                .filter(|(_, handle)| handle.identity().username() != Some(except))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| state.subscribers.remove(&id))
                .collect::<Vec<_>>()
        };

        let evicted = close_all(cancelled, SubscriberState::Evicted);
        info!(topic = %self.name, evicted, except, "Cancelled subscribers");
        evicted
    }

    /// Close every subscriber, e.g. on shutdown
    pub fn close_all(&self) -> usize {
        let handles: Vec<SubscriberHandle> = {
            let mut state = self.state.lock();
            state.subscribers.drain().map(|(_, handle)| handle).collect()
        };
        close_all(handles, SubscriberState::Disconnected)
    }

    pub(crate) fn remove_subscriber(&self, id: SubscriberId) {
        let removed = self.state.lock().subscribers.remove(&id);
        if removed.is_some() {
            debug!(topic = %self.name, subscriber_id = %id, "Subscriber removed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub fn buffered_count(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Drop expired messages. Returns the number removed.
    pub fn prune(&self, now: i64) -> usize {
        self.state.lock().buffer.prune(now)
    }

    /// No subscribers and nothing buffered
    pub fn is_empty(&self) -> bool {
        let state = self.state.lock();
        state.subscribers.is_empty() && state.buffer.is_empty()
    }
}

fn close_all(handles: Vec<SubscriberHandle>, state: SubscriberState) -> usize {
    handles
        .into_iter()
        .filter(|handle| handle.close(state))
        .count()
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
