use crate::{Permission, Reservation, Result, User};
use async_trait::async_trait;

/// Persistence-backed source of accounts, tiers and topic reservations
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Resolve a bearer token to its user, `Unauthorized` if unknown
    async fn authenticate_token(&self, token: &str) -> Result<User>;

    /// Look up a user by name
    async fn user(&self, username: &str) -> Result<Option<User>>;

    /// Current reservation of a topic, if any
    async fn reservation_for(&self, topic: &str) -> Result<Option<Reservation>>;

    /// All reservations owned by an account, ordered by topic
    async fn reservations_for(&self, owner: &str) -> Result<Vec<Reservation>>;

    /// Persist a new reservation or change the everyone-permission of an
    /// existing one
    async fn create_or_update_reservation(
        &self,
        owner: &str,
        topic: &str,
        everyone: Permission,
    ) -> Result<Reservation>;

    /// Remove a reservation owned by `owner`
    async fn delete_reservation(&self, owner: &str, topic: &str) -> Result<()>;
}
