//! Account operations: reservations and the account overview.

use crate::service::NotificationService;
use herald_core::{
    ANONYMOUS_USERNAME, Error, Identity, Permission, Reservation, Result, Role, Tier,
};
use herald_pubsub::validate_topic_name;
use herald_visitor::{Limits, VisitorStats};
use serde::Serialize;
use tracing::info;

/// Tier summary shown on the account endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierInfo {
    pub code: String,
    pub name: String,
}

impl From<&Tier> for TierInfo {
    fn from(tier: &Tier) -> Self {
        Self {
            code: tier.code.clone(),
            name: tier.name.clone(),
        }
    }
}

/// Reservation as listed on the account endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationInfo {
    pub topic: String,
    pub everyone: Permission,
}

impl From<Reservation> for ReservationInfo {
    fn from(reservation: Reservation) -> Self {
        Self {
            topic: reservation.topic,
            everyone: reservation.everyone,
        }
    }
}

/// Limits, usage and reservations of the calling identity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountInfo {
    pub username: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<TierInfo>,
    pub limits: Limits,
    pub stats: VisitorStats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reservations: Vec<ReservationInfo>,
}

impl NotificationService {
    /// Reserve `topic` for the calling account, or change the everyone
    /// permission of a reservation it already holds.
    ///
    /// The change is persisted first and then applied to the live topic
    /// before returning, so subscribers that lost read access are already
    /// being evicted when the caller sees success. Changes to the same topic
    /// hold its update lock across both steps and apply in stored order.
    pub async fn reserve_topic(
        &self,
        identity: &Identity,
        topic: &str,
        everyone: Permission,
    ) -> Result<Reservation> {
        let owner = require_user(identity)?;
        validate_topic_name(topic)?;

        let live = self.registry().get_or_create(topic).await;
        let _update = live.lock_updates().await;
        let reservation = self
            .store()
            .create_or_update_reservation(owner, topic, everyone)
            .await?;
        let evicted = live.apply_reservation(Some(reservation.clone()));

        info!(topic = %topic, owner = %owner, everyone = %everyone, evicted, "Reserved topic");
        Ok(reservation)
    }

    /// Delete the caller's reservation of `topic`; the topic falls back to
    /// the default access policy.
    pub async fn unreserve_topic(&self, identity: &Identity, topic: &str) -> Result<()> {
        let owner = require_user(identity)?;
        validate_topic_name(topic)?;

        let live = self.registry().get_or_create(topic).await;
        let _update = live.lock_updates().await;
        self.store().delete_reservation(owner, topic).await?;
        live.apply_reservation(None);

        info!(topic = %topic, owner = %owner, "Released topic reservation");
        Ok(())
    }

    pub async fn account(&self, identity: &Identity) -> Result<AccountInfo> {
        let visitor = self.tracker().resolve(identity).await;
        let info = visitor.info();

        let reservations = match identity.username() {
            Some(username) => self
                .store()
                .reservations_for(username)
                .await?
                .into_iter()
                .map(ReservationInfo::from)
                .collect(),
            None => Vec::new(),
        };

        Ok(AccountInfo {
            username: identity
                .username()
                .unwrap_or(ANONYMOUS_USERNAME)
                .to_string(),
            role: identity.role(),
            tier: identity.tier().map(TierInfo::from),
            limits: info.limits,
            stats: info.stats,
            reservations,
        })
    }
}

fn require_user(identity: &Identity) -> Result<&str> {
    identity
        .username()
        .ok_or_else(|| Error::unauthorized("an account is required to reserve topics"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_config::Config;
    use herald_core::AccountStore;
    use herald_pubsub::{Since, SubscriberState};
    use herald_store::MemoryStore;
    use herald_visitor::LimitBasis;
    use pretty_assertions::assert_eq;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Arc;

    async fn fixture() -> (NotificationService, Identity) {
        let store = Arc::new(MemoryStore::new());
        store
            .create_tier(Tier::new("pro").reservations_limit(1u64).messages_limit(100u64))
            .await
            .unwrap();
        store.add_user("phil", Role::User).await.unwrap();
        store.change_tier("phil", Some("pro")).await.unwrap();
        let user = store.user("phil").await.unwrap().unwrap();

        let service = NotificationService::new(Config::default(), store);
        (service, Identity::user(user))
    }

    fn anonymous() -> Identity {
        Identity::anonymous(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)))
    }

    #[tokio::test]
    async fn test_anonymous_cannot_reserve() {
        let (service, _) = fixture().await;
        let actual = service
            .reserve_topic(&anonymous(), "mytopic", Permission::DenyAll)
            .await
            .unwrap_err();
        assert_eq!(actual.category(), "unauthorized");
    }

    #[tokio::test]
    async fn test_reserve_evicts_before_returning() {
        let (service, phil) = fixture().await;
        let subscription = service
            .subscribe("mytopic", &anonymous(), &Since::None)
            .await
            .unwrap();

        service
            .reserve_topic(&phil, "mytopic", Permission::DenyAll)
            .await
            .unwrap();

        let actual = subscription.state();
        let expected = SubscriberState::Evicted;
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn test_unreserve_restores_default_access() {
        let (service, phil) = fixture().await;
        service
            .reserve_topic(&phil, "mytopic", Permission::DenyAll)
            .await
            .unwrap();
        assert!(
            service
                .subscribe("mytopic", &anonymous(), &Since::None)
                .await
                .is_err()
        );

        service.unreserve_topic(&phil, "mytopic").await.unwrap();

        assert!(
            service
                .subscribe("mytopic", &anonymous(), &Since::None)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_account_lists_reservations() {
        let (service, phil) = fixture().await;
        service
            .reserve_topic(&phil, "mytopic", Permission::ReadOnly)
            .await
            .unwrap();

        let actual = service.account(&phil).await.unwrap();

        assert_eq!(actual.username, "phil");
        assert_eq!(actual.limits.basis, LimitBasis::Tier);
        assert_eq!(
            actual.tier,
            Some(TierInfo {
                code: "pro".to_string(),
                name: "pro".to_string()
            })
        );
        assert_eq!(
            actual.reservations,
            vec![ReservationInfo {
                topic: "mytopic".to_string(),
                everyone: Permission::ReadOnly
            }]
        );
    }

    #[tokio::test]
    async fn test_anonymous_account() {
        let (service, _) = fixture().await;
        let actual = service.account(&anonymous()).await.unwrap();

        assert_eq!(actual.username, "*");
        assert_eq!(actual.role, Role::Anonymous);
        assert_eq!(actual.limits.basis, LimitBasis::Ip);
        assert!(actual.reservations.is_empty());
    }
}
