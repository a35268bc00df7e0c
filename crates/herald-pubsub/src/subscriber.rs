use crate::topic::Topic;
use herald_core::{Identity, Message, Permission, SubscriberId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one streaming session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Registered, open event and history not yet consumed
    Connecting,
    Streaming,
    /// Removed by a reservation change or an explicit cancel
    Evicted,
    /// The client went away
    Disconnected,
    /// The delivery sink failed or fell behind
    Errored,
}

impl SubscriberState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Evicted | Self::Disconnected | Self::Errored)
    }
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Evicted => "evicted",
            Self::Disconnected => "disconnected",
            Self::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// State shared between a topic's handle and the connection's subscription
#[derive(Debug)]
pub(crate) struct SubscriberShared {
    cancel: CancellationToken,
    state: Mutex<SubscriberState>,
}

impl SubscriberShared {
    pub(crate) fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            state: Mutex::new(SubscriberState::Connecting),
        }
    }

    /// Move to a terminal state and signal cancellation. The first terminal
    /// state wins; later calls return `false`.
    pub(crate) fn close(&self, terminal: SubscriberState) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        *state = terminal;
        self.cancel.cancel();
        true
    }

    fn mark_streaming(&self) {
        let mut state = self.state.lock();
        if *state == SubscriberState::Connecting {
            *state = SubscriberState::Streaming;
        }
    }

    fn state(&self) -> SubscriberState {
        *self.state.lock()
    }
}

/// Topic-side end of a subscriber: the identity and permission it was
/// admitted with, plus the sender half of its delivery channel
#[derive(Debug)]
pub struct SubscriberHandle {
    id: SubscriberId,
    identity: Identity,
    permission: Permission,
    sender: mpsc::Sender<Arc<Message>>,
    shared: Arc<SubscriberShared>,
}

impl SubscriberHandle {
    pub(crate) fn new(
        id: SubscriberId,
        identity: Identity,
        permission: Permission,
        sender: mpsc::Sender<Arc<Message>>,
        shared: Arc<SubscriberShared>,
    ) -> Self {
        Self {
            id,
            identity,
            permission,
            sender,
            shared,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Permission granted at admission or at the last reservation change
    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub(crate) fn set_permission(&mut self, permission: Permission) {
        self.permission = permission;
    }

    /// Enqueue a message without waiting. Returns `false` when the channel
    /// is full or the receiving side is gone.
    pub(crate) fn try_deliver(&self, message: &Arc<Message>) -> bool {
        match self.sender.try_send(Arc::clone(message)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Terminate the subscriber. Closing an already-closed subscriber is a
    /// no-op.
    pub(crate) fn close(&self, state: SubscriberState) -> bool {
        self.shared.close(state)
    }

    pub fn state(&self) -> SubscriberState {
        self.shared.state()
    }
}

/// Connection-side end of a subscriber.
///
/// Yields the open event, then the replayed history, then live messages
/// until the subscriber is cancelled. Dropping it unregisters the
/// subscriber from its topic.
pub struct Subscription {
    id: SubscriberId,
    topic: Arc<Topic>,
    pending: VecDeque<Arc<Message>>,
    receiver: mpsc::Receiver<Arc<Message>>,
    shared: Arc<SubscriberShared>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        topic: Arc<Topic>,
        pending: VecDeque<Arc<Message>>,
        receiver: mpsc::Receiver<Arc<Message>>,
        shared: Arc<SubscriberShared>,
    ) -> Self {
        Self {
            id,
            topic,
            pending,
            receiver,
            shared,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn topic(&self) -> &Arc<Topic> {
        &self.topic
    }

    pub fn state(&self) -> SubscriberState {
        self.shared.state()
    }

    /// Token cancelled when the subscriber is evicted, errored or closed
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shared.cancel.clone()
    }

    /// Next entry of the stream, `None` once the subscriber has ended.
    ///
    /// Messages already handed to this subscriber are yielded before a
    /// cancellation is observed.
    pub async fn next(&mut self) -> Option<Arc<Message>> {
        if let Some(message) = self.pending.pop_front() {
            return Some(message);
        }
        self.shared.mark_streaming();

        tokio::select! {
            biased;
            message = self.receiver.recv() => {
                if message.is_none() {
                    self.shared.close(SubscriberState::Disconnected);
                }
                message
            }
            _ = self.shared.cancel.cancelled() => None,
        }
    }

    /// Report a failed write to the client sink
    pub fn fail(&self) {
        if self.shared.close(SubscriberState::Errored) {
            self.topic.remove_subscriber(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic.name())
            .field("pending", &self.pending.len())
            .field("state", &self.shared.state())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shared.close(SubscriberState::Disconnected);
        self.topic.remove_subscriber(self.id);
    }
}
