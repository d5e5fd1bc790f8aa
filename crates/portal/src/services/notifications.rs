//! Notification synchronization.
//!
//! [`NotificationState`] is the pure half: a list of rows plus an unread
//! counter, mutated only through transition methods that keep the two
//! consistent. [`NotificationFeed`] is the plumbing half: it follows the
//! session state, loads the owner's rows, applies user mutations after the
//! platform confirms them, and folds pushed inserts in as they arrive.
//!
//! The counter is maintained incrementally - never recomputed from the list
//! length - and can never go negative.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use meridian_core::{NotificationId, NotificationType, UserId};

use crate::error::Result;
use crate::models::{Notification, NotificationDraft, NotificationOptions};
use crate::notify::SystemNotifier;
use crate::platform::{
    ChangeAction, ChangeEvent, ChangeTopic, NotificationStore, RealtimeApi, RealtimeSubscription,
};
use crate::services::session::SessionState;

// =============================================================================
// Pure state
// =============================================================================

/// The cached notification list and its unread counter.
///
/// Most-recent-first ordering. Every transition keeps the counter equal to
/// the number of cached unread items.
#[derive(Debug, Clone, Default)]
pub struct NotificationState {
    pub items: Vec<Notification>,
    pub unread: u32,
}

impl NotificationState {
    /// Replace the state with a loaded snapshot.
    ///
    /// The unread count is computed server-side, independently of the bounded
    /// list; minor skew between the two is tolerated.
    #[must_use]
    pub const fn loaded(items: Vec<Notification>, unread: u32) -> Self {
        Self { items, unread }
    }

    /// Flip one item to read, decrementing the counter by at most one.
    pub fn mark_read(&mut self, id: NotificationId) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id)
            && !item.is_read
        {
            item.is_read = true;
            self.unread = self.unread.saturating_sub(1);
        }
    }

    /// Flip every item to read and zero the counter.
    pub fn mark_all_read(&mut self) {
        for item in &mut self.items {
            item.is_read = true;
        }
        self.unread = 0;
    }

    /// Remove one item, decrementing the counter only if it was unread.
    pub fn remove(&mut self, id: NotificationId) {
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return;
        };
        let removed = self.items.remove(index);
        if !removed.is_read {
            self.unread = self.unread.saturating_sub(1);
        }
    }

    /// Prepend a new item, incrementing the counter if it is unread.
    ///
    /// A row already present by ID is dropped; the local create path and the
    /// realtime feed can both deliver the same insert.
    pub fn prepend(&mut self, item: Notification) {
        if self.items.iter().any(|existing| existing.id == item.id) {
            return;
        }
        if !item.is_read {
            self.unread += 1;
        }
        self.items.insert(0, item);
    }

    /// Drop everything; the owning identity changed.
    pub fn clear(&mut self) {
        self.items.clear();
        self.unread = 0;
    }
}

// =============================================================================
// Feed
// =============================================================================

/// Keeps one user's notification state synchronized across loads, user
/// mutations, and the realtime change feed.
///
/// The feed follows the session: when the signed-in identity changes, the
/// cached state is invalidated, the realtime topic is resubscribed, and the
/// new owner's rows are loaded. Construct with [`start`](Self::start), tear
/// down with [`shutdown`](Self::shutdown).
pub struct NotificationFeed {
    inner: Arc<FeedInner>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

struct FeedInner {
    store: Arc<dyn NotificationStore>,
    realtime: Arc<dyn RealtimeApi>,
    notifier: Arc<dyn SystemNotifier>,
    state: watch::Sender<NotificationState>,
    owner: Mutex<Option<UserId>>,
    page_size: u32,
    cancel: CancellationToken,
}

impl NotificationFeed {
    /// Create the feed and start its pump against the given session stream.
    #[must_use]
    pub fn start(
        store: Arc<dyn NotificationStore>,
        realtime: Arc<dyn RealtimeApi>,
        notifier: Arc<dyn SystemNotifier>,
        sessions: watch::Receiver<SessionState>,
        page_size: u32,
    ) -> Self {
        let (state, _) = watch::channel(NotificationState::default());
        let inner = Arc::new(FeedInner {
            store,
            realtime,
            notifier,
            state,
            owner: Mutex::new(None),
            page_size,
            cancel: CancellationToken::new(),
        });

        let pump = tokio::spawn(run_pump(sessions, Arc::clone(&inner)));

        Self {
            inner,
            pump: Mutex::new(Some(pump)),
        }
    }

    /// Observe notification state. The receiver always holds the latest
    /// value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NotificationState> {
        self.inner.state.subscribe()
    }

    /// Current snapshot of the state.
    #[must_use]
    pub fn snapshot(&self) -> NotificationState {
        self.inner.state.borrow().clone()
    }

    /// Reload the current owner's rows from the platform.
    pub async fn refresh(&self) {
        if let Some(user) = self.inner.owner() {
            self.inner.load(user).await;
        }
    }

    /// Mark one notification read: confirm remotely, then apply locally.
    ///
    /// On remote failure local state is left unchanged; the local mutation
    /// only happens after confirmation.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn mark_as_read(&self, id: NotificationId) -> Result<()> {
        self.inner.store.mark_read(id).await?;
        self.inner.apply(|state| state.mark_read(id));
        Ok(())
    }

    /// Mark everything read: confirm remotely, then zero the counter and
    /// flip every cached item.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error. Calling without a signed-in
    /// owner is a no-op.
    pub async fn mark_all_as_read(&self) -> Result<()> {
        let Some(user) = self.inner.owner() else {
            return Ok(());
        };
        self.inner.store.mark_all_read(user).await?;
        self.inner.apply(NotificationState::mark_all_read);
        Ok(())
    }

    /// Delete one notification: confirm remotely, then drop it from the
    /// cache, decrementing the counter only if it was unread.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn delete(&self, id: NotificationId) -> Result<()> {
        self.inner.store.delete(id).await?;
        self.inner.apply(|state| state.remove(id));
        Ok(())
    }

    /// Create a notification for the signed-in owner.
    ///
    /// Returns the created row, or `None` when no one is signed in or the
    /// insert failed - in both cases the cached state is untouched.
    pub async fn create(
        &self,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        options: NotificationOptions,
    ) -> Option<Notification> {
        let Some(user) = self.inner.owner() else {
            tracing::warn!("notification create without a signed-in user");
            return None;
        };

        let draft = NotificationDraft::new(user, notification_type, title, message, options);
        match self.inner.store.insert(&draft).await {
            Ok(created) => {
                self.inner.apply(|state| state.prepend(created.clone()));
                Some(created)
            }
            Err(err) => {
                tracing::error!(error = %err, "notification insert failed");
                None
            }
        }
    }

    /// Stop the pump, release the realtime subscription, and freeze state.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump
            && let Err(err) = pump.await
        {
            tracing::debug!(error = %err, "notification pump did not stop cleanly");
        }
    }
}

impl FeedInner {
    fn owner(&self) -> Option<UserId> {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_owner(&self, user: Option<UserId>) {
        *self.owner.lock().unwrap_or_else(PoisonError::into_inner) = user;
    }

    /// Mutate state unless the feed has shut down.
    fn apply(&self, mutate: impl FnOnce(&mut NotificationState)) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.state.send_modify(mutate);
    }

    /// Load the owner's snapshot: bounded most-recent list and the
    /// independently computed unread count, fetched in parallel.
    async fn load(&self, user: UserId) {
        let (items, unread) = tokio::join!(
            self.store.list_recent(user, self.page_size),
            self.store.count_unread(user),
        );

        let items = items.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "notification list load failed, degrading to empty");
            Vec::new()
        });
        let unread = unread.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "unread count load failed, degrading to zero");
            0
        });

        // The owner may have changed while the fetches were in flight.
        if self.owner() == Some(user) {
            self.apply(|state| *state = NotificationState::loaded(items, unread));
        }
    }

    /// React to a session identity change: invalidate, resubscribe, reload.
    ///
    /// Subscribing before loading shrinks the window in which a pushed insert
    /// can be lost; an insert delivered during the load is deduplicated by ID
    /// on prepend.
    async fn switch_owner(&self, user: Option<UserId>) -> Option<RealtimeSubscription> {
        self.set_owner(user);
        self.apply(NotificationState::clear);

        let user = user?;

        let permission = self.notifier.request_permission().await;
        tracing::debug!(?permission, "system notification permission");

        let subscription = match self
            .realtime
            .subscribe(ChangeTopic::notifications(user))
            .await
        {
            Ok(subscription) => Some(subscription),
            Err(err) => {
                tracing::warn!(error = %err, "realtime subscribe failed; feed will not receive pushes");
                None
            }
        };

        self.load(user).await;
        subscription
    }

    /// Fold one pushed change into the state.
    fn apply_change(&self, event: ChangeEvent) {
        match event.action {
            ChangeAction::Insert => match serde_json::from_value::<Notification>(event.row) {
                Ok(row) => {
                    if self.owner() != Some(row.user_id) {
                        return;
                    }
                    let announce = !row.is_read;
                    let title = row.title.clone();
                    let message = row.message.clone();
                    self.apply(|state| state.prepend(row));
                    if announce {
                        self.notifier.show(&title, &message);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "dropping unparseable pushed notification");
                }
            },
            // The portal's own mutations are applied locally after remote
            // confirmation; cross-device updates and deletes surface on the
            // next load.
            ChangeAction::Update | ChangeAction::Delete => {}
        }
    }
}

/// Follow the session stream and the realtime feed until shutdown.
async fn run_pump(mut sessions: watch::Receiver<SessionState>, inner: Arc<FeedInner>) {
    let mut subscription = {
        let user = sessions.borrow_and_update().user.as_ref().map(|p| p.id);
        if user.is_some() {
            inner.switch_owner(user).await
        } else {
            None
        }
    };

    loop {
        tokio::select! {
            () = inner.cancel.cancelled() => break,

            changed = sessions.changed() => {
                if changed.is_err() {
                    tracing::debug!("session stream closed, stopping notification pump");
                    break;
                }
                let user = sessions.borrow_and_update().user.as_ref().map(|p| p.id);
                if user != inner.owner() {
                    subscription = inner.switch_owner(user).await;
                }
            }

            event = next_change(subscription.as_mut()) => {
                match event {
                    Some(event) => inner.apply_change(event),
                    None => {
                        tracing::debug!("realtime feed closed");
                        subscription = None;
                    }
                }
            }
        }
    }

    if let Some(subscription) = subscription {
        subscription.unsubscribe();
    }
}

/// Next pushed event, or pend forever while unsubscribed.
async fn next_change(subscription: Option<&mut RealtimeSubscription>) -> Option<ChangeEvent> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use meridian_core::NotificationPriority;

    use super::*;

    fn item(is_read: bool) -> Notification {
        Notification {
            id: NotificationId::generate(),
            user_id: UserId::generate(),
            title: "T".to_owned(),
            message: "M".to_owned(),
            notification_type: NotificationType::System,
            priority: NotificationPriority::Normal,
            is_read,
            action_url: None,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    fn true_unread(state: &NotificationState) -> u32 {
        u32::try_from(state.items.iter().filter(|item| !item.is_read).count())
            .expect("list fits in u32")
    }

    #[test]
    fn create_then_read_then_delete_scenario() {
        let mut state = NotificationState::default();
        assert_eq!(state.unread, 0);

        let created = item(false);
        let id = created.id;
        state.prepend(created);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.unread, 1);

        state.mark_read(id);
        assert!(state.items[0].is_read);
        assert_eq!(state.unread, 0);

        state.remove(id);
        assert!(state.items.is_empty());
        assert_eq!(state.unread, 0);
    }

    #[test]
    fn pushed_already_read_rows_grow_the_list_only() {
        let mut state = NotificationState::default();
        state.prepend(item(true));
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.unread, 0);
    }

    #[test]
    fn prepend_is_most_recent_first() {
        let mut state = NotificationState::default();
        let first = item(false);
        let second = item(false);
        let second_id = second.id;
        state.prepend(first);
        state.prepend(second);
        assert_eq!(state.items[0].id, second_id);
    }

    #[test]
    fn duplicate_pushes_are_dropped() {
        let mut state = NotificationState::default();
        let row = item(false);
        state.prepend(row.clone());
        state.prepend(row);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.unread, 1);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let mut state = NotificationState::default();
        let row = item(false);
        let id = row.id;
        state.prepend(row);
        state.mark_read(id);
        state.mark_read(id);
        assert_eq!(state.unread, 0);
    }

    #[test]
    fn mark_read_on_unknown_id_changes_nothing() {
        let mut state = NotificationState::default();
        state.prepend(item(false));
        state.mark_read(NotificationId::generate());
        assert_eq!(state.unread, 1);
    }

    #[test]
    fn mark_all_read_zeroes_the_counter() {
        let mut state = NotificationState::default();
        state.prepend(item(false));
        state.prepend(item(false));
        state.prepend(item(true));
        state.mark_all_read();
        assert_eq!(state.unread, 0);
        assert!(state.items.iter().all(|item| item.is_read));
    }

    #[test]
    fn remove_of_read_item_keeps_the_counter() {
        let mut state = NotificationState::default();
        let read = item(true);
        let read_id = read.id;
        state.prepend(item(false));
        state.prepend(read);
        state.remove(read_id);
        assert_eq!(state.unread, 1);
        assert_eq!(state.items.len(), 1);
    }

    #[test]
    fn counter_matches_true_unread_over_mixed_sequences() {
        let mut state = NotificationState::loaded(Vec::new(), 0);
        let mut ids = Vec::new();

        for round in 0_u32..20 {
            let row = item(round % 3 == 0);
            ids.push(row.id);
            state.prepend(row);
            assert_eq!(state.unread, true_unread(&state));

            match round % 4 {
                0 => {
                    if let Some(id) = ids.get(usize::try_from(round / 2).expect("small")) {
                        state.mark_read(*id);
                    }
                }
                1 => {
                    if let Some(id) = ids.first().copied() {
                        state.remove(id);
                        ids.retain(|existing| *existing != id);
                    }
                }
                2 => state.mark_all_read(),
                _ => {}
            }
            assert_eq!(state.unread, true_unread(&state));
        }
    }

    #[test]
    fn clear_resets_everything() {
        let mut state = NotificationState::default();
        state.prepend(item(false));
        state.clear();
        assert!(state.items.is_empty());
        assert_eq!(state.unread, 0);
    }
}
