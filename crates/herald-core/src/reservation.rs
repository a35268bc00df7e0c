use crate::permission::Permission;
use serde::{Deserialize, Serialize};

/// Exclusive binding of a topic to an owner account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub topic: String,
    pub owner: String,
    /// Access granted to everyone except the owner
    pub everyone: Permission,
}

impl Reservation {
    pub fn new(topic: impl Into<String>, owner: impl Into<String>, everyone: Permission) -> Self {
        Self {
            topic: topic.into(),
            owner: owner.into(),
            everyone,
        }
    }
}
