//! Notification feed behavior against scripted platform doubles.

mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::timeout;

use meridian_core::{NotificationType, UserId};
use meridian_portal::models::{NotificationOptions, Profile};
use meridian_portal::notify::NoopNotifier;
use meridian_portal::platform::{ChangeTopic, NotificationStore, RealtimeApi};
use meridian_portal::services::{NotificationFeed, NotificationState, SessionState};

use support::{MemoryStore, StubRealtime, insert_event, notification_for, profile_for};

const PAGE_SIZE: u32 = 50;

struct Harness {
    feed: NotificationFeed,
    store: Arc<MemoryStore>,
    realtime: Arc<StubRealtime>,
    sessions: watch::Sender<SessionState>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let realtime = Arc::new(StubRealtime::new());
    let (sessions, sessions_rx) = watch::channel(SessionState::default());
    let feed = NotificationFeed::start(
        Arc::clone(&store) as Arc<dyn NotificationStore>,
        Arc::clone(&realtime) as Arc<dyn RealtimeApi>,
        Arc::new(NoopNotifier),
        sessions_rx,
        PAGE_SIZE,
    );
    Harness {
        feed,
        store,
        realtime,
        sessions,
    }
}

fn signed_in(sessions: &watch::Sender<SessionState>, profile: Profile) {
    sessions.send_modify(|state| {
        state.user = Some(profile);
        state.is_loading = false;
        state.is_initialized = true;
    });
}

fn signed_out(sessions: &watch::Sender<SessionState>) {
    sessions.send_modify(|state| {
        state.user = None;
        state.is_loading = false;
        state.is_initialized = true;
    });
}

/// Wait until the realtime double has this many (live or stale) subscribers.
async fn wait_for_subscribers(realtime: &StubRealtime, count: usize) {
    timeout(Duration::from_secs(1), async {
        while realtime.subscriber_count() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription never activated");
}

/// Wait until the observed state satisfies the predicate.
async fn wait_for(
    rx: &mut watch::Receiver<NotificationState>,
    predicate: impl Fn(&NotificationState) -> bool,
) -> NotificationState {
    timeout(Duration::from_secs(1), async {
        loop {
            if predicate(&rx.borrow()) {
                return rx.borrow().clone();
            }
            rx.changed().await.expect("state sender alive");
        }
    })
    .await
    .expect("state never satisfied predicate")
}

#[tokio::test]
async fn load_follows_the_signed_in_identity() {
    let h = harness();
    let user = UserId::generate();
    h.store.add_notification(notification_for(user, "unread", false));
    h.store.add_notification(notification_for(user, "read", true));

    signed_in(&h.sessions, profile_for(user, "pat@example.com", "Pat", "Lee"));

    let mut rx = h.feed.subscribe();
    let state = wait_for(&mut rx, |state| state.items.len() == 2).await;
    assert_eq!(state.unread, 1);

    h.feed.shutdown().await;
}

#[tokio::test]
async fn create_without_a_user_returns_none_and_mutates_nothing() {
    let h = harness();

    let created = h
        .feed
        .create(
            NotificationType::System,
            "T",
            "M",
            NotificationOptions::default(),
        )
        .await;

    assert!(created.is_none());
    let state = h.feed.snapshot();
    assert!(state.items.is_empty());
    assert_eq!(state.unread, 0);
    assert!(h.store.notifications.lock().expect("lock").is_empty());

    h.feed.shutdown().await;
}

#[tokio::test]
async fn create_mark_read_delete_keep_the_counter_consistent() {
    let h = harness();
    let user = UserId::generate();
    // One already-read row makes the initial load observable, so the create
    // below cannot race with it.
    h.store.add_notification(notification_for(user, "seed", true));
    signed_in(&h.sessions, profile_for(user, "pat@example.com", "Pat", "Lee"));

    let mut rx = h.feed.subscribe();
    wait_for(&mut rx, |state| state.items.len() == 1 && state.unread == 0).await;

    let created = h
        .feed
        .create(
            NotificationType::System,
            "T",
            "M",
            NotificationOptions::default(),
        )
        .await
        .expect("created");
    let state = wait_for(&mut rx, |state| state.items.len() == 2).await;
    assert_eq!(state.items[0].id, created.id, "most-recent-first");
    assert!(!state.items[0].is_read);
    assert_eq!(state.unread, 1);

    h.feed.mark_as_read(created.id).await.expect("marked");
    let state = wait_for(&mut rx, |state| state.unread == 0).await;
    assert!(state.items[0].is_read);

    h.feed.delete(created.id).await.expect("deleted");
    let state = wait_for(&mut rx, |state| state.items.len() == 1).await;
    assert_eq!(state.unread, 0);

    h.feed.shutdown().await;
}

#[tokio::test]
async fn failed_remote_mark_leaves_local_state_unchanged() {
    let h = harness();
    let user = UserId::generate();
    h.store.add_notification(notification_for(user, "unread", false));
    signed_in(&h.sessions, profile_for(user, "pat@example.com", "Pat", "Lee"));

    let mut rx = h.feed.subscribe();
    let state = wait_for(&mut rx, |state| state.items.len() == 1).await;
    let id = state.items[0].id;

    h.store.fail_writes.store(true, Ordering::SeqCst);
    assert!(h.feed.mark_as_read(id).await.is_err());

    let state = h.feed.snapshot();
    assert!(!state.items[0].is_read);
    assert_eq!(state.unread, 1);

    h.feed.shutdown().await;
}

#[tokio::test]
async fn mark_all_as_read_zeroes_everything_and_survives_reload() {
    let h = harness();
    let user = UserId::generate();
    h.store.add_notification(notification_for(user, "a", false));
    h.store.add_notification(notification_for(user, "b", false));
    signed_in(&h.sessions, profile_for(user, "pat@example.com", "Pat", "Lee"));

    let mut rx = h.feed.subscribe();
    wait_for(&mut rx, |state| state.items.len() == 2).await;

    h.feed.mark_all_as_read().await.expect("marked all");
    let state = wait_for(&mut rx, |state| state.unread == 0).await;
    assert!(state.items.iter().all(|item| item.is_read));

    // A later load sees the same zero-unread snapshot from the store.
    h.feed.refresh().await;
    let state = h.feed.snapshot();
    assert_eq!(state.unread, 0);
    assert!(state.items.iter().all(|item| item.is_read));

    h.feed.shutdown().await;
}

#[tokio::test]
async fn pushed_unread_inserts_prepend_and_count() {
    let h = harness();
    let user = UserId::generate();
    signed_in(&h.sessions, profile_for(user, "pat@example.com", "Pat", "Lee"));

    let mut rx = h.feed.subscribe();
    wait_for_subscribers(&h.realtime, 1).await;

    let pushed = notification_for(user, "pushed", false);
    h.realtime
        .push(&ChangeTopic::notifications(user), insert_event(&pushed))
        .await;

    let state = wait_for(&mut rx, |state| state.items.len() == 1).await;
    assert_eq!(state.items[0].id, pushed.id);
    assert_eq!(state.unread, 1);

    h.feed.shutdown().await;
}

#[tokio::test]
async fn pushed_already_read_inserts_grow_the_list_only() {
    let h = harness();
    let user = UserId::generate();
    signed_in(&h.sessions, profile_for(user, "pat@example.com", "Pat", "Lee"));

    let mut rx = h.feed.subscribe();
    wait_for_subscribers(&h.realtime, 1).await;

    let pushed = notification_for(user, "pushed", true);
    h.realtime
        .push(&ChangeTopic::notifications(user), insert_event(&pushed))
        .await;

    let state = wait_for(&mut rx, |state| state.items.len() == 1).await;
    assert_eq!(state.unread, 0);

    h.feed.shutdown().await;
}

#[tokio::test]
async fn identity_change_invalidates_and_reloads() {
    let h = harness();
    let alice = UserId::generate();
    let bob = UserId::generate();
    h.store.add_notification(notification_for(alice, "alice's", false));
    h.store.add_notification(notification_for(bob, "bob's", false));
    h.store.add_notification(notification_for(bob, "bob's too", false));

    signed_in(&h.sessions, profile_for(alice, "alice@example.com", "Alice", "A"));
    let mut rx = h.feed.subscribe();
    let state = wait_for(&mut rx, |state| state.items.len() == 1).await;
    assert_eq!(state.unread, 1);

    signed_in(&h.sessions, profile_for(bob, "bob@example.com", "Bob", "B"));
    let state = wait_for(&mut rx, |state| state.items.len() == 2).await;
    assert_eq!(state.unread, 2);
    assert!(state.items.iter().all(|item| item.user_id == bob));

    signed_out(&h.sessions);
    let state = wait_for(&mut rx, |state| state.items.is_empty()).await;
    assert_eq!(state.unread, 0);

    h.feed.shutdown().await;
}

#[tokio::test]
async fn each_identity_gets_its_own_subscription() {
    let h = harness();
    let user = UserId::generate();

    signed_in(&h.sessions, profile_for(user, "pat@example.com", "Pat", "Lee"));
    wait_for_subscribers(&h.realtime, 1).await;

    signed_out(&h.sessions);
    let mut rx = h.feed.subscribe();
    wait_for(&mut rx, |state| state.items.is_empty()).await;

    signed_in(&h.sessions, profile_for(user, "pat@example.com", "Pat", "Lee"));
    wait_for_subscribers(&h.realtime, 2).await;

    h.feed.shutdown().await;
}
