//! Platform contracts.
//!
//! The backend platform supplies authentication, a relational row store with
//! row-level access policy, and a real-time change feed. Everything the
//! services need from it is expressed as the traits in this module, consumed
//! as `Arc<dyn …>` handles so tests can wire in-memory doubles. The REST
//! implementations live in [`rest`].

pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use meridian_core::{
    AppointmentId, AppointmentStatus, ConversationId, Email, NotificationId, UserId,
};

use crate::models::{
    Appointment, AppointmentDraft, Conversation, ConversationParticipant, HealthMetric,
    HealthMetricDraft, Medication, Message, MessageDraft, Notification, NotificationDraft,
    Profile, ProfileDraft, ProfileUpdate, Symptom, SymptomDraft, TestResult, VitalSign,
};

// =============================================================================
// Errors
// =============================================================================

/// Machine-readable code the platform attaches to a missing-row rejection.
pub const CODE_ROW_NOT_FOUND: &str = "row_not_found";

/// Machine-readable code the platform attaches to a row-level policy
/// rejection.
pub const CODE_UNAUTHORIZED: &str = "unauthorized";

/// Errors surfaced by platform calls.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not parse.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Referenced row does not exist (or is hidden by row policy).
    #[error("row not found")]
    RowNotFound,

    /// Row-level policy rejected the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The call requires an authenticated platform session.
    #[error("no active session")]
    NoSession,

    /// The client itself could not be assembled (bad key or URL material).
    #[error("client build error: {0}")]
    Client(String),

    /// Any other platform rejection.
    #[error("platform error ({status}): {message}")]
    Service {
        /// HTTP status of the rejection.
        status: u16,
        /// Platform-supplied message.
        message: String,
    },
}

impl PlatformError {
    /// Build an error from a platform error body's machine-readable code.
    #[must_use]
    pub fn from_code(code: &str, status: u16, message: String) -> Self {
        match code {
            CODE_ROW_NOT_FOUND => Self::RowNotFound,
            CODE_UNAUTHORIZED => Self::Unauthorized(message),
            _ => Self::Service { status, message },
        }
    }
}

// =============================================================================
// Auth
// =============================================================================

/// An authenticated platform session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Credential's user ID; equals the profile row ID.
    pub user_id: UserId,
    pub email: Email,
    /// Bearer token for row-store and realtime calls.
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// A freshly created credential, before any profile row exists.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthCredential {
    pub user_id: UserId,
    pub email: Email,
}

/// Session change events, delivered strictly in order per subscriber.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// A session was established (login here or on another tab/device).
    SignedIn(AuthSession),
    /// The session ended.
    SignedOut,
    /// The access token was renewed; the identity did not change.
    TokenRefreshed(AuthSession),
}

/// Ordered stream of [`AuthEvent`]s for one subscriber.
pub type AuthEvents = mpsc::UnboundedReceiver<AuthEvent>;

/// The platform's authentication surface.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Look up the existing session, refreshing it if the platform supports
    /// that. `None` means no one is signed in.
    async fn current_session(&self) -> Result<Option<AuthSession>, PlatformError>;

    /// Verify credentials and establish a session.
    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, PlatformError>;

    /// Create a credential. Does not create a profile row.
    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthCredential, PlatformError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), PlatformError>;

    /// Ask the platform to email a password-reset link.
    async fn send_password_reset(&self, email: &Email) -> Result<(), PlatformError>;

    /// Check a two-factor code. `Ok(false)` means the code was wrong.
    async fn verify_code(&self, email: &Email, code: &str) -> Result<bool, PlatformError>;

    /// Subscribe to session change events.
    fn subscribe(&self) -> AuthEvents;
}

// =============================================================================
// Row stores
// =============================================================================

/// `profiles` collection access.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch one profile. Errors with [`PlatformError::RowNotFound`] when the
    /// row is absent.
    async fn get_profile(&self, id: UserId) -> Result<Profile, PlatformError>;

    /// Fetch profiles by membership; absent IDs are silently skipped.
    async fn get_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>, PlatformError>;

    async fn insert_profile(&self, draft: &ProfileDraft) -> Result<Profile, PlatformError>;

    /// Partial update; returns the server's authoritative row.
    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Profile, PlatformError>;
}

/// `notifications` collection access.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Most-recent-first, bounded at `limit` rows.
    async fn list_recent(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<Notification>, PlatformError>;

    /// Server-side unread count, independent of `list_recent`'s bound.
    async fn count_unread(&self, user: UserId) -> Result<u32, PlatformError>;

    async fn mark_read(&self, id: NotificationId) -> Result<(), PlatformError>;

    async fn mark_all_read(&self, user: UserId) -> Result<(), PlatformError>;

    async fn delete(&self, id: NotificationId) -> Result<(), PlatformError>;

    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification, PlatformError>;
}

/// `conversations` / `conversation_participants` / `messages` access.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Conversations the user belongs to, most recently active first.
    async fn conversations_for(&self, user: UserId)
    -> Result<Vec<Conversation>, PlatformError>;

    async fn participants(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<ConversationParticipant>, PlatformError>;

    /// Messages in a conversation, newest first, bounded at `limit`.
    async fn messages_for(
        &self,
        conversation: ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, PlatformError>;

    async fn insert_message(&self, draft: &MessageDraft) -> Result<Message, PlatformError>;

    /// Flip every unread message in the conversation that `reader` did not
    /// send.
    async fn mark_incoming_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
    ) -> Result<(), PlatformError>;
}

/// `appointments` collection access.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments where the user is the patient or the provider.
    async fn appointments_for(&self, user: UserId) -> Result<Vec<Appointment>, PlatformError>;

    async fn insert_appointment(
        &self,
        draft: &AppointmentDraft,
    ) -> Result<Appointment, PlatformError>;

    async fn set_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, PlatformError>;

    async fn set_time(
        &self,
        id: AppointmentId,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Appointment, PlatformError>;
}

/// Health-record collections access.
#[async_trait]
pub trait HealthRecordStore: Send + Sync {
    async fn test_results_for(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<TestResult>, PlatformError>;

    async fn vital_signs_for(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<VitalSign>, PlatformError>;

    async fn medications_for(&self, user: UserId) -> Result<Vec<Medication>, PlatformError>;

    async fn insert_symptom(&self, draft: &SymptomDraft) -> Result<Symptom, PlatformError>;

    async fn insert_metric(
        &self,
        draft: &HealthMetricDraft,
    ) -> Result<HealthMetric, PlatformError>;
}

// =============================================================================
// Realtime
// =============================================================================

/// What a realtime subscription watches: one collection, filtered to one
/// owner's rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeTopic {
    /// Collection name, e.g. `"notifications"`.
    pub collection: &'static str,
    /// Row owner the platform filters on.
    pub user: UserId,
}

impl ChangeTopic {
    /// Topic for one user's notification rows.
    #[must_use]
    pub const fn notifications(user: UserId) -> Self {
        Self {
            collection: "notifications",
            user,
        }
    }
}

/// Kind of row change carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// A row-level change pushed by the platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub action: ChangeAction,
    /// The affected row, as the platform serialized it.
    pub row: serde_json::Value,
}

/// Handle to an active realtime subscription.
///
/// Events arrive in delivery order through [`recv`](Self::recv). Dropping the
/// handle or calling [`unsubscribe`](Self::unsubscribe) releases the
/// underlying channel.
#[derive(Debug)]
pub struct RealtimeSubscription {
    events: mpsc::Receiver<ChangeEvent>,
    cancel: CancellationToken,
}

impl RealtimeSubscription {
    /// Wrap a receiving channel and the token that tears down its producer.
    #[must_use]
    pub const fn new(events: mpsc::Receiver<ChangeEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Next change event; `None` once the feed has closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Release the subscription.
    pub fn unsubscribe(self) {
        self.cancel.cancel();
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The platform's change-feed surface.
#[async_trait]
pub trait RealtimeApi: Send + Sync {
    /// Open a subscription for the topic.
    async fn subscribe(&self, topic: ChangeTopic) -> Result<RealtimeSubscription, PlatformError>;
}
