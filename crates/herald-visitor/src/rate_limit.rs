//! Lazily refilled token bucket.
//!
//! Tokens are never added by a timer. Every check computes the refill for
//! the time elapsed since the last successful check, so an idle bucket costs
//! nothing. Time is always passed in explicitly.

use std::time::{Duration, Instant};

/// Absorbs float rounding when a refill lands exactly on a whole token
const EPSILON: f64 = 1e-9;

/// Token bucket with a continuous linear refill rate
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    rate_per_sec: f64,
    last_check: Instant,
}

impl TokenBucket {
    /// Create a full bucket that refills `capacity` tokens over `replenish`
    pub fn new(capacity: u64, replenish: Duration, now: Instant) -> Self {
        let capacity = capacity as f64;
        Self {
            capacity,
            tokens: capacity,
            rate_per_sec: refill_rate(capacity, replenish),
            last_check: now,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }

    /// Tokens available at `now`: min(capacity, tokens + rate * elapsed)
    pub fn available_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_check).as_secs_f64();
        (self.tokens + self.rate_per_sec * elapsed).min(self.capacity)
    }

    /// Check whether `amount` tokens are available without taking them
    pub fn can_allow_at(&self, amount: u64, now: Instant) -> bool {
        self.available_at(now) + EPSILON >= amount as f64
    }

    /// Take `amount` tokens if available. A failed check leaves the bucket
    /// untouched.
    pub fn allow_at(&mut self, amount: u64, now: Instant) -> bool {
        let available = self.available_at(now);
        if available + EPSILON < amount as f64 {
            return false;
        }
        self.tokens = (available - amount as f64).max(0.0);
        self.last_check = now.max(self.last_check);
        true
    }

    /// Apply a new capacity and refill window. Tokens already earned carry
    /// over, capped at the new capacity.
    pub fn reconfigure(&mut self, capacity: u64, replenish: Duration, now: Instant) {
        self.tokens = self.available_at(now);
        self.last_check = now.max(self.last_check);
        self.capacity = capacity as f64;
        self.rate_per_sec = refill_rate(self.capacity, replenish);
        self.tokens = self.tokens.min(self.capacity);
    }
}

fn refill_rate(capacity: f64, replenish: Duration) -> f64 {
    if replenish.is_zero() {
        0.0
    } else {
        capacity / replenish.as_secs_f64()
    }
}
