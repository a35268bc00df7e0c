//! Newline-delimited JSON encoding of subscription streams.

use crate::service::ActiveSubscription;
use axum::body::{Body, Bytes};
use herald_core::Message;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson; charset=utf-8";

struct StreamState {
    subscription: ActiveSubscription,
    topic: String,
    keepalive: Interval,
}

/// Body streaming one JSON object per line: the open event, replayed
/// history, live messages, and a keepalive event whenever the stream has
/// been quiet for `keepalive`. Ends when the subscriber is closed.
pub fn ndjson_stream(subscription: ActiveSubscription, keepalive: Duration) -> Body {
    let mut ticker = tokio::time::interval_at(Instant::now() + keepalive, keepalive);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let state = StreamState {
        topic: subscription.topic().name().to_string(),
        subscription,
        keepalive: ticker,
    };

    let stream = futures::stream::unfold(state, |mut state| async move {
        let message = tokio::select! {
            biased;
            message = state.subscription.next() => match message {
                Some(message) => message,
                None => {
                    debug!(
                        topic = %state.topic,
                        subscriber_id = %state.subscription.id(),
                        state = %state.subscription.state(),
                        "Stream ended"
                    );
                    return None;
                }
            },
            _ = state.keepalive.tick() => Arc::new(Message::keepalive(state.topic.as_str())),
        };
        state.keepalive.reset();

        match encode_line(&message) {
            Ok(line) => Some((Ok::<_, Infallible>(line), state)),
            Err(error) => {
                warn!(topic = %state.topic, error = %error, "Failed to encode message");
                state.subscription.fail();
                None
            }
        }
    });

    Body::from_stream(stream)
}

/// Encode a batch of messages, e.g. a poll response
pub fn ndjson_lines(messages: &[Arc<Message>]) -> serde_json::Result<Vec<u8>> {
    let mut body = Vec::new();
    for message in messages {
        serde_json::to_writer(&mut body, message.as_ref())?;
        body.push(b'\n');
    }
    Ok(body)
}

fn encode_line(message: &Message) -> serde_json::Result<Bytes> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}
