use herald_core::{Error, Message, MessageId, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Replay cursor sent by a connecting subscriber
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Since {
    /// Everything still buffered
    All,
    /// Nothing, live messages only
    #[default]
    None,
    /// Only the most recent message
    Latest,
    /// Messages published after the one with this id
    Id(MessageId),
    /// Messages published at or after this unix timestamp
    Time(i64),
}

impl Since {
    /// Parse `all`, `none`, `latest`, a unix timestamp, a duration such as
    /// `10m` (relative to `now`) or a message id.
    pub fn parse(value: &str, now: i64) -> Result<Self> {
        let value = value.trim();
        match value {
            "" | "none" => return Ok(Self::None),
            "all" => return Ok(Self::All),
            "latest" => return Ok(Self::Latest),
            _ => {}
        }

        if value.chars().all(|c| c.is_ascii_digit()) {
            let timestamp = value
                .parse::<i64>()
                .map_err(|e| Error::validation(format!("invalid since timestamp: {e}")))?;
            return Ok(Self::Time(timestamp));
        }
        if let Ok(duration) = humantime::parse_duration(value) {
            let secs = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
            return Ok(Self::Time(now.saturating_sub(secs)));
        }
        if value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Ok(Self::Id(MessageId::from_string(value)));
        }
        Err(Error::validation(format!("invalid since value: {value}")))
    }
}

/// Bounded, arrival-ordered history of a topic
#[derive(Debug)]
pub struct ReplayBuffer {
    messages: VecDeque<Arc<Message>>,
    max_messages: usize,
    max_age: Duration,
}

impl ReplayBuffer {
    pub fn new(max_messages: usize, max_age: Duration) -> Self {
        Self {
            messages: VecDeque::new(),
            max_messages,
            max_age,
        }
    }

    /// Append a message, dropping the oldest entries beyond the count cap
    /// and anything expired at `now`
    pub fn push(&mut self, message: Arc<Message>, now: i64) {
        self.messages.push_back(message);
        while self.messages.len() > self.max_messages {
            self.messages.pop_front();
        }
        self.prune(now);
    }

    /// Remove expired messages and messages older than the age cap
    pub fn prune(&mut self, now: i64) -> usize {
        let before = self.messages.len();
        let cutoff = self.cutoff(now);
        self.messages
            .retain(|message| message.time >= cutoff && !message.is_expired(now));
        before - self.messages.len()
    }

    /// Buffered messages selected by a cursor, oldest first
    pub fn since(&self, since: &Since, now: i64) -> Vec<Arc<Message>> {
        let cutoff = self.cutoff(now);
        let live: Vec<&Arc<Message>> = self
            .messages
            .iter()
            .filter(|message| message.time >= cutoff && !message.is_expired(now))
            .collect();

        let selected: Vec<&Arc<Message>> = match since {
            Since::None => Vec::new(),
            Since::All => live,
            Since::Latest => live.last().copied().into_iter().collect(),
            Since::Time(time) => live
                .into_iter()
                .filter(|message| message.time >= *time)
                .collect(),
            Since::Id(id) => match live.iter().position(|message| &message.id == id) {
                Some(index) => live[index + 1..].to_vec(),
                None => live,
            },
        };
        selected.into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn cutoff(&self, now: i64) -> i64 {
        let max_age = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        now.saturating_sub(max_age)
    }
}
