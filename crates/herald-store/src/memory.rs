use async_trait::async_trait;
use herald_config::AuthConfig;
use herald_core::{
    AccountStore, Error, Permission, Reservation, Result, Role, Tier, User,
    generate_id_with_prefix,
};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct UserRecord {
    role: Role,
    tier_code: Option<String>,
}

#[derive(Debug, Default)]
struct StoreState {
    users: HashMap<String, UserRecord>,
    /// Keyed by tier code
    tiers: HashMap<String, Tier>,
    /// Token → username
    tokens: HashMap<String, String>,
    /// Keyed by topic, so listings come out in topic order
    reservations: BTreeMap<String, Reservation>,
}

impl StoreState {
    fn user(&self, username: &str) -> Option<User> {
        let record = self.users.get(username)?;
        let tier = record
            .tier_code
            .as_ref()
            .and_then(|code| self.tiers.get(code))
            .cloned();
        Some(User {
            username: username.to_string(),
            role: record.role,
            tier,
        })
    }
}

/// Account store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the tiers and accounts listed in the auth configuration
    pub async fn seed(&self, auth: &AuthConfig) -> Result<()> {
        for seed in &auth.tiers {
            self.create_tier(Tier::from(seed)).await?;
        }
        for seed in &auth.users {
            self.add_user(&seed.username, seed.role).await?;
            if let Some(code) = &seed.tier {
                self.change_tier(&seed.username, Some(code.as_str())).await?;
            }
            for token in &seed.tokens {
                self.add_token(&seed.username, token).await?;
            }
        }
        info!(
            tiers = auth.tiers.len(),
            users = auth.users.len(),
            "Seeded account store"
        );
        Ok(())
    }

    /// Add an account without a tier
    pub async fn add_user(&self, username: &str, role: Role) -> Result<()> {
        if username.is_empty() {
            return Err(Error::validation("username cannot be empty"));
        }
        if role == Role::Anonymous {
            return Err(Error::validation("accounts cannot have the anonymous role"));
        }

        let mut state = self.state.write().await;
        if state.users.contains_key(username) {
            return Err(Error::conflict(format!("user {username} already exists")));
        }
        state.users.insert(
            username.to_string(),
            UserRecord {
                role,
                tier_code: None,
            },
        );
        info!(username, role = %role, "Added user");
        Ok(())
    }

    /// Create a tier. A tier without an id gets a generated `ti_` id.
    pub async fn create_tier(&self, mut tier: Tier) -> Result<Tier> {
        if tier.code.is_empty() {
            return Err(Error::validation("tier code cannot be empty"));
        }
        if tier.id.is_empty() {
            tier.id = generate_id_with_prefix("ti");
        }

        let mut state = self.state.write().await;
        if state.tiers.contains_key(&tier.code) {
            return Err(Error::conflict(format!("tier {} already exists", tier.code)));
        }
        state.tiers.insert(tier.code.clone(), tier.clone());
        info!(tier = %tier.code, id = %tier.id, "Created tier");
        Ok(tier)
    }

    /// Attach a tier to an account, or remove it with `None`
    pub async fn change_tier(&self, username: &str, code: Option<&str>) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(code) = code {
            if !state.tiers.contains_key(code) {
                return Err(Error::not_found(format!("tier {code}")));
            }
        }
        let record = state
            .users
            .get_mut(username)
            .ok_or_else(|| Error::not_found(format!("user {username}")))?;
        record.tier_code = code.map(str::to_string);
        info!(username, tier = ?code, "Changed tier");
        Ok(())
    }

    /// Issue a new bearer token for an account
    pub async fn create_token(&self, username: &str) -> Result<String> {
        let token = generate_id_with_prefix("tk");
        self.add_token(username, &token).await?;
        Ok(token)
    }

    async fn add_token(&self, username: &str, token: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(username) {
            return Err(Error::not_found(format!("user {username}")));
        }
        if state.tokens.contains_key(token) {
            return Err(Error::conflict("token already in use"));
        }
        state.tokens.insert(token.to_string(), username.to_string());
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn authenticate_token(&self, token: &str) -> Result<User> {
        let state = self.state.read().await;
        state
            .tokens
            .get(token)
            .and_then(|username| state.user(username))
            .ok_or_else(|| Error::unauthorized("invalid token"))
    }

    async fn user(&self, username: &str) -> Result<Option<User>> {
        Ok(self.state.read().await.user(username))
    }

    async fn reservation_for(&self, topic: &str) -> Result<Option<Reservation>> {
        Ok(self.state.read().await.reservations.get(topic).cloned())
    }

    async fn reservations_for(&self, owner: &str) -> Result<Vec<Reservation>> {
        let state = self.state.read().await;
        Ok(state
            .reservations
            .values()
            .filter(|reservation| reservation.owner == owner)
            .cloned()
            .collect())
    }

    async fn create_or_update_reservation(
        &self,
        owner: &str,
        topic: &str,
        everyone: Permission,
    ) -> Result<Reservation> {
        let mut state = self.state.write().await;
        let user = state
            .user(owner)
            .ok_or_else(|| Error::not_found(format!("user {owner}")))?;
        if user.role == Role::Admin {
            return Err(Error::AdminCannotReserve);
        }
        let tier = user
            .tier
            .ok_or_else(|| Error::unauthorized("reservations require a tier"))?;

        match state.reservations.get_mut(topic) {
            Some(existing) if existing.owner != owner => {
                return Err(Error::conflict(format!("topic {topic} is already reserved")));
            }
            Some(existing) => {
                existing.everyone = everyone;
                debug!(owner, topic, everyone = %everyone, "Updated reservation");
                return Ok(existing.clone());
            }
            None => {}
        }

        let owned = state
            .reservations
            .values()
            .filter(|reservation| reservation.owner == owner)
            .count() as u64;
        if owned >= tier.reservations_limit {
            return Err(Error::reservation_limit_exceeded(tier.reservations_limit));
        }

        let reservation = Reservation::new(topic, owner, everyone);
        state
            .reservations
            .insert(topic.to_string(), reservation.clone());
        debug!(owner, topic, everyone = %everyone, "Created reservation");
        Ok(reservation)
    }

    async fn delete_reservation(&self, owner: &str, topic: &str) -> Result<()> {
        let mut state = self.state.write().await;
        match state.reservations.get(topic) {
            Some(reservation) if reservation.owner == owner => {
                state.reservations.remove(topic);
                debug!(owner, topic, "Deleted reservation");
                Ok(())
            }
            _ => Err(Error::not_found(format!("reservation for topic {topic}"))),
        }
    }
}
