//! End-to-end session lifecycle tests over fake component seams: startup
//! order, event pumping into the reconciler, teardown, and isolation
//! between consecutive sessions.

mod common;

use common::{
    offline_client, settle, CountingCredentialSource, FakeTransport, GrantedPushPlatform,
};
use hearth_link::{
    ConnectionState, FeedId, FeedItem, LiveEvent, LiveEventKind, SyncSession,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn notification(user: &str, seq: u64, id: &str) -> LiveEvent {
    LiveEvent::new(
        format!("notifications:{}", user),
        seq,
        LiveEventKind::NewNotification {
            item: FeedItem::new(id, json!({"title": id})).with_author("teacher-1"),
        },
    )
}

#[tokio::test(start_paused = true)]
async fn test_start_pumps_live_events_into_the_reconciler() {
    let transport = FakeTransport::new();
    let tx = transport.push_stream();
    let source = CountingCredentialSource::new(Duration::from_secs(300));

    let session = SyncSession::builder()
        .user_id("user-1")
        .client(offline_client())
        .transport(Some(transport.clone()))
        .credential_source(source.clone())
        .build()
        .unwrap();

    // REST seeding fails against the offline client; startup tolerates it.
    session.start().await.unwrap();
    settle().await;
    assert_eq!(session.connection_state(), ConnectionState::Connected);
    assert_eq!(source.fetch_count(), 1);

    tx.send(Ok(notification("user-1", 1, "n-1"))).unwrap();
    tx.send(Ok(notification("user-1", 2, "n-2"))).unwrap();
    // Duplicate of seq 2 must be dropped by the reconciler.
    tx.send(Ok(notification("user-1", 2, "n-2-dup"))).unwrap();
    settle().await;

    let feed = FeedId::from("notifications:user-1");
    let mut changes = session.reconciler().watch_changes();
    tokio::time::timeout(Duration::from_secs(5), changes.wait_for(|_| {
        session.reconciler().unread_count(&feed) == 2
    }))
    .await
    .expect("events never reached the reconciler")
    .unwrap();

    let snapshot = session.snapshot(&feed).unwrap();
    assert_eq!(snapshot.last_seen_seq, 2);
    assert_eq!(snapshot.items.len(), 2);
    assert_eq!(snapshot.items[0].id, "n-2");
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_tears_everything_down() {
    let transport = FakeTransport::new();
    let _tx = transport.push_stream();
    let source = CountingCredentialSource::new(Duration::from_secs(300));

    let session = SyncSession::builder()
        .user_id("user-1")
        .client(offline_client())
        .transport(Some(transport.clone()))
        .credential_source(source.clone())
        .push_platform(Arc::new(GrantedPushPlatform::default()))
        .build()
        .unwrap();

    session.start().await.unwrap();
    settle().await;
    assert!(session.credentials().get().is_some());

    session.shutdown().await;
    assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    assert!(session.credentials().get().is_none());
    assert!(!session.push().is_subscribed());

    // The cancelled renewal timer must not fire for the dead session.
    tokio::time::advance(Duration::from_secs(600)).await;
    settle().await;
    assert_eq!(source.fetch_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_sessions_are_isolated() {
    let source = CountingCredentialSource::new(Duration::from_secs(300));

    let first_transport = FakeTransport::new();
    let tx = first_transport.push_stream();
    let first = SyncSession::builder()
        .user_id("user-1")
        .client(offline_client())
        .transport(Some(first_transport.clone()))
        .credential_source(source.clone())
        .build()
        .unwrap();
    first.start().await.unwrap();
    settle().await;

    tx.send(Ok(notification("user-1", 1, "n-1"))).unwrap();
    settle().await;
    first.shutdown().await;

    // A new session starts from a clean slate: no feed state, no
    // credential, and its own connection.
    let second_transport = FakeTransport::new();
    let _tx2 = second_transport.push_stream();
    let second = SyncSession::builder()
        .user_id("user-2")
        .client(offline_client())
        .transport(Some(second_transport.clone()))
        .credential_source(source.clone())
        .build()
        .unwrap();

    assert!(second
        .snapshot(&FeedId::from("notifications:user-1"))
        .is_none());
    assert!(second.credentials().get().is_none());

    second.start().await.unwrap();
    settle().await;
    assert_eq!(second.connection_state(), ConnectionState::Connected);
    assert_eq!(second_transport.open_attempts(), 1);

    // Late events on the first session's stream cannot leak anywhere.
    let _ = tx.send(Ok(notification("user-1", 2, "n-late")));
    settle().await;
    assert!(second
        .snapshot(&FeedId::from("notifications:user-1"))
        .is_none());
    second.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_push_subscription_through_session() {
    let transport = FakeTransport::new();
    let _tx = transport.push_stream();
    let platform = Arc::new(GrantedPushPlatform::default());

    let session = SyncSession::builder()
        .user_id("user-1")
        .client(offline_client())
        .transport(Some(transport))
        .credential_source(CountingCredentialSource::new(Duration::from_secs(300)))
        .push_platform(platform)
        .build()
        .unwrap();

    assert!(session.push().is_supported());
    // The registry is the offline REST client, so server-side registration
    // fails and subscribe must report failure and roll back.
    assert!(!session.enable_push().await);
    assert!(!session.push().is_subscribed());
}
