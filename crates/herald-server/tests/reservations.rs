//! Live re-authorization of subscribers when reservations change

use async_trait::async_trait;
use herald_config::Config;
use herald_core::{
    AccountStore, EventKind, Identity, Message, Permission, Reservation, Role, Tier, User,
};
use herald_pubsub::{Since, SubscriberState};
use herald_server::{ActiveSubscription, NotificationService, PublishRequest};
use herald_store::MemoryStore;
use pretty_assertions::assert_eq;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Barrier;

async fn fixture(reservations_limit: u64) -> (NotificationService, Identity) {
    let store = Arc::new(MemoryStore::new());
    store
        .create_tier(
            Tier::new("pro")
                .messages_limit(1000u64)
                .reservations_limit(reservations_limit),
        )
        .await
        .unwrap();
    store.add_user("phil", Role::User).await.unwrap();
    store.change_tier("phil", Some("pro")).await.unwrap();
    let phil = Identity::user(store.user("phil").await.unwrap().unwrap());

    (NotificationService::new(Config::default(), store), phil)
}

fn anonymous() -> Identity {
    Identity::anonymous(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)))
}

/// Drain a stream until it ends, failing if it stays open
async fn drain(subscription: &mut ActiveSubscription) -> Vec<Arc<Message>> {
    let mut entries = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(2), subscription.next()).await {
            Ok(Some(message)) => entries.push(message),
            Ok(None) => return entries,
            Err(_) => panic!("stream did not end, got {} entries", entries.len()),
        }
    }
}

async fn take(subscription: &mut ActiveSubscription, count: usize) -> Vec<Arc<Message>> {
    let mut entries = Vec::new();
    for _ in 0..count {
        let message = tokio::time::timeout(Duration::from_secs(2), subscription.next())
            .await
            .expect("stream stalled")
            .expect("stream ended early");
        entries.push(message);
    }
    entries
}

fn bodies(entries: &[Arc<Message>]) -> Vec<(EventKind, String)> {
    entries
        .iter()
        .map(|message| (message.event, message.message.clone()))
        .collect()
}

#[tokio::test]
async fn test_reservation_evicts_anonymous_subscriber_live() {
    let (service, phil) = fixture(1).await;
    let mut anonymous_stream = service
        .subscribe("mytopic", &anonymous(), &Since::None)
        .await
        .unwrap();
    let mut owner_stream = service
        .subscribe("mytopic", &phil, &Since::None)
        .await
        .unwrap();

    service
        .publish("mytopic", &anonymous(), PublishRequest::new("before"))
        .await
        .unwrap();
    service
        .reserve_topic(&phil, "mytopic", Permission::DenyAll)
        .await
        .unwrap();
    service
        .publish("mytopic", &phil, PublishRequest::new("after"))
        .await
        .unwrap();

    let actual = bodies(&drain(&mut anonymous_stream).await);
    let expected = vec![
        (EventKind::Open, String::new()),
        (EventKind::Message, "before".to_string()),
    ];
    assert_eq!(actual, expected);
    assert_eq!(anonymous_stream.state(), SubscriberState::Evicted);

    let actual = bodies(&take(&mut owner_stream, 3).await);
    let expected = vec![
        (EventKind::Open, String::new()),
        (EventKind::Message, "before".to_string()),
        (EventKind::Message, "after".to_string()),
    ];
    assert_eq!(actual, expected);
    assert_eq!(owner_stream.state(), SubscriberState::Streaming);
}

#[tokio::test]
async fn test_read_only_reservation_keeps_readers() {
    let (service, phil) = fixture(1).await;
    let mut reader = service
        .subscribe("mytopic", &anonymous(), &Since::None)
        .await
        .unwrap();

    service
        .reserve_topic(&phil, "mytopic", Permission::ReadOnly)
        .await
        .unwrap();
    assert_eq!(reader.state(), SubscriberState::Connecting);

    service
        .publish("mytopic", &phil, PublishRequest::new("still here"))
        .await
        .unwrap();

    let actual = bodies(&take(&mut reader, 2).await);
    let expected = vec![
        (EventKind::Open, String::new()),
        (EventKind::Message, "still here".to_string()),
    ];
    assert_eq!(actual, expected);

    let actual = service
        .publish("mytopic", &anonymous(), PublishRequest::new("nope"))
        .await
        .unwrap_err();
    assert_eq!(actual.category(), "forbidden");
}

#[tokio::test]
async fn test_reservation_limit_is_a_quota_boundary() {
    let (service, phil) = fixture(2).await;
    service
        .reserve_topic(&phil, "first", Permission::ReadOnly)
        .await
        .unwrap();
    service
        .reserve_topic(&phil, "second", Permission::ReadOnly)
        .await
        .unwrap();

    let actual = service
        .reserve_topic(&phil, "third", Permission::ReadOnly)
        .await
        .unwrap_err();
    assert_eq!(actual.category(), "reservation_limit_exceeded");

    let actual: Vec<String> = service
        .store()
        .reservations_for("phil")
        .await
        .unwrap()
        .into_iter()
        .map(|reservation| reservation.topic)
        .collect();
    let expected = vec!["first".to_string(), "second".to_string()];
    assert_eq!(actual, expected);

    // Changing an existing reservation is not a new one
    let actual = service
        .reserve_topic(&phil, "first", Permission::DenyAll)
        .await
        .unwrap();
    assert_eq!(actual.everyone, Permission::DenyAll);
}

#[tokio::test]
async fn test_deleting_reservation_reverts_to_default_access() {
    let (service, phil) = fixture(1).await;
    service
        .reserve_topic(&phil, "mytopic", Permission::DenyAll)
        .await
        .unwrap();

    let actual = service
        .subscribe("mytopic", &anonymous(), &Since::None)
        .await
        .unwrap_err();
    assert_eq!(actual.category(), "forbidden");

    service.unreserve_topic(&phil, "mytopic").await.unwrap();

    let mut subscription = service
        .subscribe("mytopic", &anonymous(), &Since::None)
        .await
        .unwrap();
    let actual = take(&mut subscription, 1).await[0].event;
    assert_eq!(actual, EventKind::Open);
}

#[tokio::test]
async fn test_admin_cannot_reserve() {
    let store = Arc::new(MemoryStore::new());
    store.add_user("root", Role::Admin).await.unwrap();
    let admin = Identity::user(store.user("root").await.unwrap().unwrap());
    let service = NotificationService::new(Config::default(), store);

    let actual = service
        .reserve_topic(&admin, "mytopic", Permission::DenyAll)
        .await
        .unwrap_err();
    assert_eq!(actual.category(), "admin_cannot_reserve");
}

#[tokio::test]
async fn test_cancel_subscribers_spares_named_account() {
    let (service, phil) = fixture(1).await;
    let mut anonymous_stream = service
        .subscribe("mytopic", &anonymous(), &Since::None)
        .await
        .unwrap();
    let owner_stream = service
        .subscribe("mytopic", &phil, &Since::None)
        .await
        .unwrap();

    let actual = service.cancel_subscribers("mytopic", "phil").await;
    assert_eq!(actual, 1);

    assert_eq!(drain(&mut anonymous_stream).await.len(), 1);
    assert_eq!(anonymous_stream.state(), SubscriberState::Evicted);
    assert_eq!(owner_stream.state(), SubscriberState::Connecting);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_subscribes_never_bypass_reservation() {
    let (service, phil) = fixture(1).await;
    let service = Arc::new(service);
    let visitor = |i: u8| Identity::anonymous(IpAddr::V4(Ipv4Addr::new(198, 51, 100, i)));

    // Admitted before the change
    let mut outcomes = Vec::new();
    for i in 0..4u8 {
        outcomes.push(
            service
                .subscribe("contended", &visitor(i), &Since::None)
                .await
                .ok(),
        );
    }

    let racers = 16u8;
    let start = Arc::new(Barrier::new(usize::from(racers) + 1));
    let mut handles = Vec::new();
    for i in 4..4 + racers {
        let service = Arc::clone(&service);
        let start = Arc::clone(&start);
        handles.push(tokio::spawn(async move {
            start.wait().await;
            service
                .subscribe("contended", &visitor(i), &Since::None)
                .await
                .ok()
        }));
    }
    start.wait().await;
    service
        .reserve_topic(&phil, "contended", Permission::DenyAll)
        .await
        .unwrap();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    // Arriving after the change
    for i in 200..204u8 {
        outcomes.push(
            service
                .subscribe("contended", &visitor(i), &Since::None)
                .await
                .ok(),
        );
    }

    let mut evicted = 0;
    let mut denied = 0;
    for outcome in outcomes {
        match outcome {
            Some(mut subscription) => {
                let entries = drain(&mut subscription).await;
                assert_eq!(entries.len(), 1);
                assert_eq!(subscription.state(), SubscriberState::Evicted);
                evicted += 1;
            }
            None => denied += 1,
        }
    }
    assert!(evicted >= 4, "only {evicted} subscribers were evicted");
    assert!(denied >= 4, "only {denied} subscribers were denied");
    assert_eq!(evicted + denied, 24);
}

/// Store that stalls after persisting a read-only reservation, so a later
/// change can overtake it between persisting and applying
struct StallingStore {
    inner: MemoryStore,
}

#[async_trait]
impl AccountStore for StallingStore {
    async fn authenticate_token(&self, token: &str) -> herald_core::Result<User> {
        self.inner.authenticate_token(token).await
    }

    async fn user(&self, username: &str) -> herald_core::Result<Option<User>> {
        self.inner.user(username).await
    }

    async fn reservation_for(&self, topic: &str) -> herald_core::Result<Option<Reservation>> {
        self.inner.reservation_for(topic).await
    }

    async fn reservations_for(&self, owner: &str) -> herald_core::Result<Vec<Reservation>> {
        self.inner.reservations_for(owner).await
    }

    async fn create_or_update_reservation(
        &self,
        owner: &str,
        topic: &str,
        everyone: Permission,
    ) -> herald_core::Result<Reservation> {
        let reservation = self
            .inner
            .create_or_update_reservation(owner, topic, everyone)
            .await?;
        if everyone == Permission::ReadOnly {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(reservation)
    }

    async fn delete_reservation(&self, owner: &str, topic: &str) -> herald_core::Result<()> {
        self.inner.delete_reservation(owner, topic).await
    }
}

#[tokio::test]
async fn test_concurrent_changes_apply_in_stored_order() {
    let inner = MemoryStore::new();
    inner
        .create_tier(Tier::new("pro").reservations_limit(1u64))
        .await
        .unwrap();
    inner.add_user("phil", Role::User).await.unwrap();
    inner.change_tier("phil", Some("pro")).await.unwrap();
    let phil = Identity::user(inner.user("phil").await.unwrap().unwrap());
    let service = Arc::new(NotificationService::new(
        Config::default(),
        Arc::new(StallingStore { inner }),
    ));

    let first = {
        let service = Arc::clone(&service);
        let phil = phil.clone();
        tokio::spawn(async move {
            service
                .reserve_topic(&phil, "contested", Permission::ReadOnly)
                .await
        })
    };
    // Let the first change persist and stall before the second starts
    tokio::time::sleep(Duration::from_millis(10)).await;
    service
        .reserve_topic(&phil, "contested", Permission::DenyAll)
        .await
        .unwrap();
    first.await.unwrap().unwrap();

    let stored = service
        .store()
        .reservation_for("contested")
        .await
        .unwrap()
        .map(|reservation| reservation.everyone);
    assert_eq!(stored, Some(Permission::DenyAll));

    let actual = service
        .subscribe("contested", &anonymous(), &Since::None)
        .await
        .unwrap_err();
    assert_eq!(actual.category(), "forbidden");
}
