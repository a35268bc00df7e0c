//! # herald-pubsub
//!
//! Topic fan-out engine of the herald notification service.
//!
//! Each [`Topic`] owns a bounded replay buffer, its live subscribers and its
//! current reservation behind a single lock. Publishing, subscribing and
//! applying a reservation change on one topic are therefore totally ordered,
//! while independent topics never contend.
//!
//! ## Key Components
//!
//! - **TopicRegistry**: lazily populated name → topic directory
//! - **Topic**: publish, subscribe, poll and reservation application
//! - **Subscription**: the connection side of a subscriber, a cancellable
//!   stream of open event, history and live messages
//! - **ReplayBuffer** / **Since**: bounded history and replay cursors

mod enforcer;
pub mod registry;
pub mod replay;
pub mod subscriber;
pub mod topic;

pub use registry::{PruneStats, TopicRegistry};
pub use replay::{ReplayBuffer, Since};
pub use subscriber::{SubscriberHandle, SubscriberState, Subscription};
pub use topic::{Topic, TopicSettings, validate_topic_name};
