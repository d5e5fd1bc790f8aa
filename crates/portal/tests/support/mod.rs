//! In-memory platform doubles for portal tests.

// Each test binary uses its own subset of these helpers.
#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use meridian_core::{Email, NotificationId, Preferences, Role, UserId};
use meridian_portal::models::{Notification, NotificationDraft, Profile, ProfileDraft, ProfileUpdate};
use meridian_portal::platform::{
    AuthApi, AuthCredential, AuthEvent, AuthEvents, AuthSession, ChangeEvent, ChangeTopic,
    NotificationStore, PlatformError, ProfileStore, RealtimeApi, RealtimeSubscription,
};

// =============================================================================
// Auth double
// =============================================================================

#[derive(Default)]
pub struct StubAuth {
    state: Mutex<StubAuthState>,
    pub sign_out_calls: AtomicU32,
    pub fail_sign_out: AtomicBool,
}

#[derive(Default)]
struct StubAuthState {
    session: Option<AuthSession>,
    accounts: HashMap<String, (String, UserId)>,
    listeners: Vec<mpsc::UnboundedSender<AuthEvent>>,
    lookup_delay: Option<Duration>,
}

impl StubAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, email: &str, password: &str, user_id: UserId) -> Self {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(email.to_owned(), (password.to_owned(), user_id));
        self
    }

    pub fn with_session(self, session: AuthSession) -> Self {
        self.state.lock().unwrap().session = Some(session);
        self
    }

    /// Make `current_session` hang this long (for deadline tests).
    pub fn with_lookup_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().lookup_delay = Some(delay);
        self
    }

    /// Deliver an event as if the platform pushed it.
    pub fn push_event(&self, event: &AuthEvent) {
        self.state
            .lock()
            .unwrap()
            .listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    fn emit(&self, event: &AuthEvent) {
        self.push_event(event);
    }
}

pub fn session_for(user_id: UserId, email: &str) -> AuthSession {
    AuthSession {
        user_id,
        email: Email::parse(email).expect("valid email"),
        access_token: "token".to_owned(),
        refresh_token: None,
        expires_at: Utc::now() + ChronoDuration::hours(1),
    }
}

#[async_trait]
impl AuthApi for StubAuth {
    async fn current_session(&self) -> Result<Option<AuthSession>, PlatformError> {
        let (delay, session) = {
            let state = self.state.lock().unwrap();
            (state.lookup_delay, state.session.clone())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(session)
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, PlatformError> {
        let user_id = {
            let state = self.state.lock().unwrap();
            match state.accounts.get(email.as_str()) {
                Some((stored, user_id)) if stored == password => *user_id,
                _ => {
                    return Err(PlatformError::Unauthorized(
                        "invalid credentials".to_owned(),
                    ));
                }
            }
        };

        let session = session_for(user_id, email.as_str());
        self.state.lock().unwrap().session = Some(session.clone());
        self.emit(&AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthCredential, PlatformError> {
        let user_id = UserId::generate();
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(email.as_str().to_owned(), (password.to_owned(), user_id));
        Ok(AuthCredential {
            user_id,
            email: email.clone(),
        })
    }

    async fn sign_out(&self) -> Result<(), PlatformError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().session = None;
        self.emit(&AuthEvent::SignedOut);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(PlatformError::Service {
                status: 500,
                message: "sign-out exploded".to_owned(),
            });
        }
        Ok(())
    }

    async fn send_password_reset(&self, _email: &Email) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn verify_code(&self, _email: &Email, code: &str) -> Result<bool, PlatformError> {
        Ok(code == "123456")
    }

    fn subscribe(&self) -> AuthEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().unwrap().listeners.push(tx);
        rx
    }
}

// =============================================================================
// Row-store double
// =============================================================================

#[derive(Default)]
pub struct MemoryStore {
    pub profiles: Mutex<HashMap<UserId, Profile>>,
    pub notifications: Mutex<Vec<Notification>>,
    pub fail_writes: AtomicBool,
    pub fail_profile_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profile(&self, profile: Profile) {
        self.profiles.lock().unwrap().insert(profile.id, profile);
    }

    pub fn add_notification(&self, notification: Notification) {
        self.notifications.lock().unwrap().push(notification);
    }

    fn write_gate(&self) -> Result<(), PlatformError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PlatformError::Service {
                status: 500,
                message: "write rejected".to_owned(),
            });
        }
        Ok(())
    }
}

pub fn profile_for(user_id: UserId, email: &str, first: &str, last: &str) -> Profile {
    Profile {
        id: user_id,
        email: Email::parse(email).expect("valid email"),
        first_name: first.to_owned(),
        last_name: last.to_owned(),
        role: Role::Patient,
        phone: None,
        date_of_birth: None,
        two_factor_enabled: false,
        biometric_enabled: false,
        preferences: Preferences::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn notification_for(user_id: UserId, title: &str, is_read: bool) -> Notification {
    Notification {
        id: NotificationId::generate(),
        user_id,
        title: title.to_owned(),
        message: "body".to_owned(),
        notification_type: meridian_core::NotificationType::System,
        priority: meridian_core::NotificationPriority::Normal,
        is_read,
        action_url: None,
        metadata: serde_json::Value::Null,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, id: UserId) -> Result<Profile, PlatformError> {
        if self.fail_profile_reads.load(Ordering::SeqCst) {
            return Err(PlatformError::Service {
                status: 500,
                message: "read rejected".to_owned(),
            });
        }
        self.profiles
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(PlatformError::RowNotFound)
    }

    async fn get_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>, PlatformError> {
        let profiles = self.profiles.lock().unwrap();
        Ok(ids.iter().filter_map(|id| profiles.get(id).cloned()).collect())
    }

    async fn insert_profile(&self, draft: &ProfileDraft) -> Result<Profile, PlatformError> {
        self.write_gate()?;
        let profile = Profile {
            id: draft.id,
            email: draft.email.clone(),
            first_name: draft.first_name.clone(),
            last_name: draft.last_name.clone(),
            role: draft.role,
            phone: draft.phone.clone(),
            date_of_birth: draft.date_of_birth,
            two_factor_enabled: draft.two_factor_enabled,
            biometric_enabled: draft.biometric_enabled,
            preferences: draft.preferences.clone(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.add_profile(profile.clone());
        Ok(profile)
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Profile, PlatformError> {
        self.write_gate()?;
        let mut profiles = self.profiles.lock().unwrap();
        let profile = profiles.get_mut(&id).ok_or(PlatformError::RowNotFound)?;
        if let Some(first_name) = &update.first_name {
            profile.first_name = first_name.clone();
        }
        if let Some(last_name) = &update.last_name {
            profile.last_name = last_name.clone();
        }
        if let Some(phone) = &update.phone {
            profile.phone = Some(phone.clone());
        }
        if let Some(enabled) = update.two_factor_enabled {
            profile.two_factor_enabled = enabled;
        }
        if let Some(enabled) = update.biometric_enabled {
            profile.biometric_enabled = enabled;
        }
        if let Some(preferences) = &update.preferences {
            profile.preferences = preferences.clone();
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn list_recent(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<Notification>, PlatformError> {
        let mut rows: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn count_unread(&self, user: UserId) -> Result<u32, PlatformError> {
        let count = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == user && !n.is_read)
            .count();
        Ok(u32::try_from(count).expect("count fits"))
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), PlatformError> {
        self.write_gate()?;
        let mut rows = self.notifications.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(PlatformError::RowNotFound)?;
        row.is_read = true;
        Ok(())
    }

    async fn mark_all_read(&self, user: UserId) -> Result<(), PlatformError> {
        self.write_gate()?;
        for row in self.notifications.lock().unwrap().iter_mut() {
            if row.user_id == user {
                row.is_read = true;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: NotificationId) -> Result<(), PlatformError> {
        self.write_gate()?;
        self.notifications.lock().unwrap().retain(|n| n.id != id);
        Ok(())
    }

    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification, PlatformError> {
        self.write_gate()?;
        let row = Notification {
            id: NotificationId::generate(),
            user_id: draft.user_id,
            title: draft.title.clone(),
            message: draft.message.clone(),
            notification_type: draft.notification_type,
            priority: draft.priority,
            is_read: draft.is_read,
            action_url: draft.action_url.clone(),
            metadata: draft.metadata.clone(),
            created_at: Utc::now(),
        };
        self.add_notification(row.clone());
        Ok(row)
    }
}

// =============================================================================
// Realtime double
// =============================================================================

#[derive(Default)]
pub struct StubRealtime {
    subscribers: Mutex<Vec<(ChangeTopic, mpsc::Sender<ChangeEvent>)>>,
}

impl StubRealtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a change to every subscriber of the topic.
    pub async fn push(&self, topic: &ChangeTopic, event: ChangeEvent) {
        let senders: Vec<mpsc::Sender<ChangeEvent>> = self
            .subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(subscribed, _)| subscribed == topic)
            .map(|(_, tx)| tx.clone())
            .collect();
        for tx in senders {
            // Stale subscribers from a previous identity are fine to miss.
            let _ = tx.send(event.clone()).await;
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

#[async_trait]
impl RealtimeApi for StubRealtime {
    async fn subscribe(&self, topic: ChangeTopic) -> Result<RealtimeSubscription, PlatformError> {
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().unwrap().push((topic, tx));
        Ok(RealtimeSubscription::new(rx, CancellationToken::new()))
    }
}

/// Wrap a notification row as a pushed insert event.
pub fn insert_event(row: &Notification) -> ChangeEvent {
    ChangeEvent {
        action: meridian_portal::platform::ChangeAction::Insert,
        row: serde_json::to_value(row).expect("serializable row"),
    }
}
