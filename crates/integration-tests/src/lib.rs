//! Integration tests for Meridian.
//!
//! The scenarios in `tests/` wire the real services - session manager,
//! notification feed, messaging, appointments, health records - against
//! [`InMemoryPlatform`], a single in-process double that plays the backend
//! platform: credentials, row collections, and a change feed that echoes
//! notification inserts back to subscribers the way the real platform does.
//!
//! Run with: `cargo test -p meridian-integration-tests`

#![cfg_attr(not(test), forbid(unsafe_code))]
#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use meridian_core::{
    AppointmentId, AppointmentStatus, ConversationId, Email, MessageId, NotificationId,
    Preferences, RecordId, Role, UserId,
};
use meridian_portal::models::{
    Appointment, AppointmentDraft, Conversation, ConversationParticipant, HealthMetric,
    HealthMetricDraft, Medication, Message, MessageDraft, Notification, NotificationDraft,
    Profile, ProfileDraft, ProfileUpdate, Symptom, SymptomDraft, TestResult, VitalSign,
};
use meridian_portal::notify::NoopNotifier;
use meridian_portal::platform::{
    AppointmentStore, AuthApi, AuthCredential, AuthEvent, AuthEvents, AuthSession, ChangeAction,
    ChangeEvent, ChangeTopic, HealthRecordStore, MessageStore, NotificationStore, PlatformError,
    ProfileStore, RealtimeApi, RealtimeSubscription,
};
use meridian_portal::services::{
    AppointmentService, HealthRecordService, MessagingService, NotificationFeed, SessionManager,
};

const INIT_TIMEOUT: Duration = Duration::from_secs(10);
const PAGE_SIZE: u32 = 50;

/// Install a test-friendly tracing subscriber; safe to call repeatedly.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

// =============================================================================
// In-memory platform
// =============================================================================

/// The whole backend platform in one struct.
#[derive(Default)]
pub struct InMemoryPlatform {
    auth: Mutex<AuthState>,
    profiles: Mutex<HashMap<UserId, Profile>>,
    notifications: Mutex<Vec<Notification>>,
    conversations: Mutex<Vec<Conversation>>,
    participants: Mutex<Vec<ConversationParticipant>>,
    messages: Mutex<Vec<Message>>,
    appointments: Mutex<Vec<Appointment>>,
    test_results: Mutex<Vec<TestResult>>,
    vital_signs: Mutex<Vec<VitalSign>>,
    medications: Mutex<Vec<Medication>>,
    symptoms: Mutex<Vec<Symptom>>,
    health_metrics: Mutex<Vec<HealthMetric>>,
    realtime: Mutex<Vec<(ChangeTopic, mpsc::Sender<ChangeEvent>)>>,
}

#[derive(Default)]
struct AuthState {
    session: Option<AuthSession>,
    accounts: HashMap<String, (String, UserId)>,
    listeners: Vec<mpsc::UnboundedSender<AuthEvent>>,
}

impl InMemoryPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and its profile row, as if it signed up earlier.
    pub fn seed_user(&self, email: &str, password: &str, first: &str, last: &str) -> UserId {
        let user_id = UserId::generate();
        self.auth
            .lock()
            .unwrap()
            .accounts
            .insert(email.to_owned(), (password.to_owned(), user_id));
        self.profiles.lock().unwrap().insert(
            user_id,
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
            },
        );
        user_id
    }

    /// Seed a conversation between users, returning its ID.
    pub fn seed_conversation(&self, subject: &str, members: &[UserId]) -> ConversationId {
        let conversation_id = ConversationId::generate();
        self.conversations.lock().unwrap().push(Conversation {
            id: conversation_id,
            subject: Some(subject.to_owned()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        for member in members {
            self.participants.lock().unwrap().push(ConversationParticipant {
                conversation_id,
                user_id: *member,
                joined_at: Utc::now(),
            });
        }
        conversation_id
    }

    /// Seed a message at a specific timestamp.
    pub fn seed_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        body: &str,
        is_read: bool,
        created_at: DateTime<Utc>,
    ) -> MessageId {
        let id = MessageId::generate();
        self.messages.lock().unwrap().push(Message {
            id,
            conversation_id: conversation,
            sender_id: sender,
            body: body.to_owned(),
            is_read,
            created_at,
        });
        id
    }

    /// Insert a notification row server-side (some other actor created it)
    /// and push it to realtime subscribers.
    pub async fn push_notification(&self, row: Notification) {
        self.notifications.lock().unwrap().push(row.clone());
        self.broadcast(ChangeTopic::notifications(row.user_id), &row).await;
    }

    fn emit_auth(&self, event: &AuthEvent) {
        self.auth
            .lock()
            .unwrap()
            .listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    async fn broadcast(&self, topic: ChangeTopic, row: &Notification) {
        let event = ChangeEvent {
            action: ChangeAction::Insert,
            row: serde_json::to_value(row).expect("serializable row"),
        };
        let senders: Vec<mpsc::Sender<ChangeEvent>> = self
            .realtime
            .lock()
            .unwrap()
            .iter()
            .filter(|(subscribed, _)| *subscribed == topic)
            .map(|(_, tx)| tx.clone())
            .collect();
        for tx in senders {
            let _ = tx.send(event.clone()).await;
        }
    }
}

#[async_trait]
impl AuthApi for InMemoryPlatform {
    async fn current_session(&self) -> Result<Option<AuthSession>, PlatformError> {
        Ok(self.auth.lock().unwrap().session.clone())
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, PlatformError> {
        let user_id = {
            let auth = self.auth.lock().unwrap();
            match auth.accounts.get(email.as_str()) {
                Some((stored, user_id)) if stored == password => *user_id,
                _ => {
                    return Err(PlatformError::Unauthorized(
                        "invalid credentials".to_owned(),
                    ));
                }
            }
        };

        let session = AuthSession {
            user_id,
            email: email.clone(),
            access_token: "token".to_owned(),
            refresh_token: None,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        };
        self.auth.lock().unwrap().session = Some(session.clone());
        self.emit_auth(&AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthCredential, PlatformError> {
        let user_id = UserId::generate();
        self.auth
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
        self.auth.lock().unwrap().session = None;
        self.emit_auth(&AuthEvent::SignedOut);
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
        self.auth.lock().unwrap().listeners.push(tx);
        rx
    }
}

#[async_trait]
impl ProfileStore for InMemoryPlatform {
    async fn get_profile(&self, id: UserId) -> Result<Profile, PlatformError> {
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
        self.profiles
            .lock()
            .unwrap()
            .insert(profile.id, profile.clone());
        Ok(profile)
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Profile, PlatformError> {
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
impl NotificationStore for InMemoryPlatform {
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
        let mut rows = self.notifications.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(PlatformError::RowNotFound)?;
        row.is_read = true;
        Ok(())
    }

    async fn mark_all_read(&self, user: UserId) -> Result<(), PlatformError> {
        for row in self.notifications.lock().unwrap().iter_mut() {
            if row.user_id == user {
                row.is_read = true;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: NotificationId) -> Result<(), PlatformError> {
        self.notifications.lock().unwrap().retain(|n| n.id != id);
        Ok(())
    }

    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification, PlatformError> {
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
        self.notifications.lock().unwrap().push(row.clone());
        // The platform pushes inserts back to their owner's change feed.
        self.broadcast(ChangeTopic::notifications(row.user_id), &row)
            .await;
        Ok(row)
    }
}

#[async_trait]
impl MessageStore for InMemoryPlatform {
    async fn conversations_for(
        &self,
        user: UserId,
    ) -> Result<Vec<Conversation>, PlatformError> {
        let member_of: Vec<ConversationId> = self
            .participants
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.user_id == user)
            .map(|p| p.conversation_id)
            .collect();
        let mut rows: Vec<Conversation> = self
            .conversations
            .lock()
            .unwrap()
            .iter()
            .filter(|c| member_of.contains(&c.id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn participants(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<ConversationParticipant>, PlatformError> {
        Ok(self
            .participants
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.conversation_id == conversation)
            .cloned()
            .collect())
    }

    async fn messages_for(
        &self,
        conversation: ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, PlatformError> {
        let mut rows: Vec<Message> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.conversation_id == conversation)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn insert_message(&self, draft: &MessageDraft) -> Result<Message, PlatformError> {
        let row = Message {
            id: MessageId::generate(),
            conversation_id: draft.conversation_id,
            sender_id: draft.sender_id,
            body: draft.body.clone(),
            is_read: draft.is_read,
            created_at: Utc::now(),
        };
        self.messages.lock().unwrap().push(row.clone());
        for conversation in self.conversations.lock().unwrap().iter_mut() {
            if conversation.id == draft.conversation_id {
                conversation.updated_at = row.created_at;
            }
        }
        Ok(row)
    }

    async fn mark_incoming_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
    ) -> Result<(), PlatformError> {
        for message in self.messages.lock().unwrap().iter_mut() {
            if message.conversation_id == conversation && message.sender_id != reader {
                message.is_read = true;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryPlatform {
    async fn appointments_for(&self, user: UserId) -> Result<Vec<Appointment>, PlatformError> {
        let mut rows: Vec<Appointment> = self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.patient_id == user || a.provider_id == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(rows)
    }

    async fn insert_appointment(
        &self,
        draft: &AppointmentDraft,
    ) -> Result<Appointment, PlatformError> {
        let row = Appointment {
            id: AppointmentId::generate(),
            patient_id: draft.patient_id,
            provider_id: draft.provider_id,
            scheduled_at: draft.scheduled_at,
            duration_minutes: draft.duration_minutes,
            status: draft.status,
            reason: draft.reason.clone(),
            location: draft.location.clone(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.appointments.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn set_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, PlatformError> {
        let mut rows = self.appointments.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(PlatformError::RowNotFound)?;
        row.status = status;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn set_time(
        &self,
        id: AppointmentId,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Appointment, PlatformError> {
        let mut rows = self.appointments.lock().unwrap();
        let row = rows
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(PlatformError::RowNotFound)?;
        row.scheduled_at = scheduled_at;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[async_trait]
impl HealthRecordStore for InMemoryPlatform {
    async fn test_results_for(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<TestResult>, PlatformError> {
        let mut rows: Vec<TestResult> = self
            .test_results
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.collected_at.cmp(&a.collected_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn vital_signs_for(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<VitalSign>, PlatformError> {
        let mut rows: Vec<VitalSign> = self
            .vital_signs
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.user_id == user)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        rows.truncate(limit as usize);
        Ok(rows)
    }

    async fn medications_for(&self, user: UserId) -> Result<Vec<Medication>, PlatformError> {
        Ok(self
            .medications
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user && m.active)
            .cloned()
            .collect())
    }

    async fn insert_symptom(&self, draft: &SymptomDraft) -> Result<Symptom, PlatformError> {
        let row = Symptom {
            id: RecordId::generate(),
            user_id: draft.user_id,
            description: draft.description.clone(),
            severity: draft.severity,
            noted_at: draft.noted_at,
        };
        self.symptoms.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn insert_metric(
        &self,
        draft: &HealthMetricDraft,
    ) -> Result<HealthMetric, PlatformError> {
        let row = HealthMetric {
            id: RecordId::generate(),
            user_id: draft.user_id,
            kind: draft.kind.clone(),
            value: draft.value,
            unit: draft.unit.clone(),
            measured_at: draft.measured_at,
        };
        self.health_metrics.lock().unwrap().push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl RealtimeApi for InMemoryPlatform {
    async fn subscribe(&self, topic: ChangeTopic) -> Result<RealtimeSubscription, PlatformError> {
        let (tx, rx) = mpsc::channel(16);
        self.realtime.lock().unwrap().push((topic, tx));
        Ok(RealtimeSubscription::new(rx, CancellationToken::new()))
    }
}

// =============================================================================
// Test context
// =============================================================================

/// Fully wired portal client over one [`InMemoryPlatform`].
pub struct TestContext {
    pub platform: Arc<InMemoryPlatform>,
    pub session: SessionManager,
    pub feed: NotificationFeed,
    pub messaging: MessagingService,
    pub appointments: AppointmentService,
    pub health: HealthRecordService,
}

impl TestContext {
    /// Wire everything the way the application root does.
    #[must_use]
    pub fn new() -> Self {
        let platform = Arc::new(InMemoryPlatform::new());

        let session = SessionManager::start(
            Arc::clone(&platform) as Arc<dyn AuthApi>,
            Arc::clone(&platform) as Arc<dyn ProfileStore>,
            INIT_TIMEOUT,
        );
        let feed = NotificationFeed::start(
            Arc::clone(&platform) as Arc<dyn NotificationStore>,
            Arc::clone(&platform) as Arc<dyn RealtimeApi>,
            Arc::new(NoopNotifier),
            session.subscribe(),
            PAGE_SIZE,
        );
        let messaging = MessagingService::new(
            Arc::clone(&platform) as Arc<dyn MessageStore>,
            Arc::clone(&platform) as Arc<dyn ProfileStore>,
        );
        let appointments =
            AppointmentService::new(Arc::clone(&platform) as Arc<dyn AppointmentStore>);
        let health = HealthRecordService::new(Arc::clone(&platform) as Arc<dyn HealthRecordStore>);

        Self {
            platform,
            session,
            feed,
            messaging,
            appointments,
            health,
        }
    }

    /// Tear down the pumps in dependency order.
    pub async fn shutdown(&self) {
        self.feed.shutdown().await;
        self.session.shutdown().await;
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
