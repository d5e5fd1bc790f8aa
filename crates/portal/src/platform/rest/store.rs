//! REST row-store client.
//!
//! One path segment per collection, `field=op.value` filter parameters,
//! `order`/`limit` clauses, and a `Prefer: return=representation` header on
//! writes that need the server's row back. Row-level access policy is
//! enforced server-side; this client only shapes requests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use meridian_core::{
    AppointmentId, AppointmentStatus, ConversationId, NotificationId, UserId,
};

use super::PlatformClient;
use crate::models::{
    Appointment, AppointmentDraft, Conversation, ConversationParticipant, HealthMetric,
    HealthMetricDraft, Medication, Message, MessageDraft, Notification, NotificationDraft,
    Profile, ProfileDraft, ProfileUpdate, Symptom, SymptomDraft, TestResult, VitalSign,
};
use crate::platform::{
    AppointmentStore, HealthRecordStore, MessageStore, NotificationStore, PlatformError,
    ProfileStore,
};

/// REST implementation of the row-store contracts.
#[derive(Debug, Clone)]
pub struct RestStore {
    client: PlatformClient,
}

impl RestStore {
    /// Wrap the shared platform client.
    #[must_use]
    pub const fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    async fn select<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, PlatformError> {
        let mut url = self.client.rest_url(collection)?;
        url.query_pairs_mut().extend_pairs(query);

        let response = self.client.request(Method::GET, url).send().await?;
        Ok(PlatformClient::check(response).await?.json().await?)
    }

    async fn insert_returning<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        collection: &str,
        body: &B,
    ) -> Result<T, PlatformError> {
        let url = self.client.rest_url(collection)?;
        let response = self
            .client
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        let mut rows: Vec<T> = PlatformClient::check(response).await?.json().await?;
        rows.pop().ok_or(PlatformError::RowNotFound)
    }

    async fn update_returning<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        collection: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T, PlatformError> {
        let mut url = self.client.rest_url(collection)?;
        url.query_pairs_mut().extend_pairs(query);

        let response = self
            .client
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        let mut rows: Vec<T> = PlatformClient::check(response).await?.json().await?;
        rows.pop().ok_or(PlatformError::RowNotFound)
    }

    async fn update_where<B: Serialize + Sync>(
        &self,
        collection: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<(), PlatformError> {
        let mut url = self.client.rest_url(collection)?;
        url.query_pairs_mut().extend_pairs(query);

        let response = self
            .client
            .request(Method::PATCH, url)
            .json(body)
            .send()
            .await?;
        PlatformClient::check(response).await?;
        Ok(())
    }

    async fn delete_where(
        &self,
        collection: &str,
        query: &[(&str, String)],
    ) -> Result<(), PlatformError> {
        let mut url = self.client.rest_url(collection)?;
        url.query_pairs_mut().extend_pairs(query);

        let response = self.client.request(Method::DELETE, url).send().await?;
        PlatformClient::check(response).await?;
        Ok(())
    }
}

/// `field=eq.value` filter.
fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// `field=in.(a,b,c)` membership filter.
fn within<T: std::fmt::Display>(values: impl IntoIterator<Item = T>) -> String {
    let joined: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
    format!("in.({})", joined.join(","))
}

#[async_trait]
impl ProfileStore for RestStore {
    async fn get_profile(&self, id: UserId) -> Result<Profile, PlatformError> {
        let mut rows: Vec<Profile> = self
            .select("profiles", &[("id", eq(id)), ("limit", "1".to_owned())])
            .await?;
        rows.pop().ok_or(PlatformError::RowNotFound)
    }

    async fn get_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>, PlatformError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select("profiles", &[("id", within(ids.iter().copied()))])
            .await
    }

    async fn insert_profile(&self, draft: &ProfileDraft) -> Result<Profile, PlatformError> {
        self.insert_returning("profiles", draft).await
    }

    async fn update_profile(
        &self,
        id: UserId,
        update: &ProfileUpdate,
    ) -> Result<Profile, PlatformError> {
        self.update_returning("profiles", &[("id", eq(id))], update)
            .await
    }
}

#[async_trait]
impl NotificationStore for RestStore {
    async fn list_recent(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<Notification>, PlatformError> {
        self.select(
            "notifications",
            &[
                ("user_id", eq(user)),
                ("order", "created_at.desc".to_owned()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn count_unread(&self, user: UserId) -> Result<u32, PlatformError> {
        #[derive(serde::Deserialize)]
        struct CountRow {
            count: u32,
        }

        let rows: Vec<CountRow> = self
            .select(
                "notifications",
                &[
                    ("user_id", eq(user)),
                    ("is_read", eq(false)),
                    ("select", "count".to_owned()),
                ],
            )
            .await?;
        Ok(rows.first().map_or(0, |row| row.count))
    }

    async fn mark_read(&self, id: NotificationId) -> Result<(), PlatformError> {
        self.update_where(
            "notifications",
            &[("id", eq(id))],
            &serde_json::json!({ "is_read": true }),
        )
        .await
    }

    async fn mark_all_read(&self, user: UserId) -> Result<(), PlatformError> {
        self.update_where(
            "notifications",
            &[("user_id", eq(user)), ("is_read", eq(false))],
            &serde_json::json!({ "is_read": true }),
        )
        .await
    }

    async fn delete(&self, id: NotificationId) -> Result<(), PlatformError> {
        self.delete_where("notifications", &[("id", eq(id))]).await
    }

    async fn insert(&self, draft: &NotificationDraft) -> Result<Notification, PlatformError> {
        self.insert_returning("notifications", draft).await
    }
}

#[async_trait]
impl MessageStore for RestStore {
    async fn conversations_for(
        &self,
        user: UserId,
    ) -> Result<Vec<Conversation>, PlatformError> {
        let memberships: Vec<ConversationParticipant> = self
            .select("conversation_participants", &[("user_id", eq(user))])
            .await?;
        if memberships.is_empty() {
            return Ok(Vec::new());
        }

        self.select(
            "conversations",
            &[
                (
                    "id",
                    within(memberships.iter().map(|m| m.conversation_id)),
                ),
                ("order", "updated_at.desc".to_owned()),
            ],
        )
        .await
    }

    async fn participants(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<ConversationParticipant>, PlatformError> {
        self.select(
            "conversation_participants",
            &[("conversation_id", eq(conversation))],
        )
        .await
    }

    async fn messages_for(
        &self,
        conversation: ConversationId,
        limit: u32,
    ) -> Result<Vec<Message>, PlatformError> {
        self.select(
            "messages",
            &[
                ("conversation_id", eq(conversation)),
                ("order", "created_at.desc".to_owned()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn insert_message(&self, draft: &MessageDraft) -> Result<Message, PlatformError> {
        self.insert_returning("messages", draft).await
    }

    async fn mark_incoming_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
    ) -> Result<(), PlatformError> {
        self.update_where(
            "messages",
            &[
                ("conversation_id", eq(conversation)),
                ("sender_id", format!("neq.{reader}")),
                ("is_read", eq(false)),
            ],
            &serde_json::json!({ "is_read": true }),
        )
        .await
    }
}

#[async_trait]
impl AppointmentStore for RestStore {
    async fn appointments_for(&self, user: UserId) -> Result<Vec<Appointment>, PlatformError> {
        self.select(
            "appointments",
            &[
                ("or", format!("(patient_id.eq.{user},provider_id.eq.{user})")),
                ("order", "scheduled_at.asc".to_owned()),
            ],
        )
        .await
    }

    async fn insert_appointment(
        &self,
        draft: &AppointmentDraft,
    ) -> Result<Appointment, PlatformError> {
        self.insert_returning("appointments", draft).await
    }

    async fn set_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, PlatformError> {
        self.update_returning(
            "appointments",
            &[("id", eq(id))],
            &serde_json::json!({ "status": status }),
        )
        .await
    }

    async fn set_time(
        &self,
        id: AppointmentId,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Appointment, PlatformError> {
        self.update_returning(
            "appointments",
            &[("id", eq(id))],
            &serde_json::json!({ "scheduled_at": scheduled_at }),
        )
        .await
    }
}

#[async_trait]
impl HealthRecordStore for RestStore {
    async fn test_results_for(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<TestResult>, PlatformError> {
        self.select(
            "test_results",
            &[
                ("user_id", eq(user)),
                ("order", "collected_at.desc".to_owned()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn vital_signs_for(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<VitalSign>, PlatformError> {
        self.select(
            "vital_signs",
            &[
                ("user_id", eq(user)),
                ("order", "recorded_at.desc".to_owned()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn medications_for(&self, user: UserId) -> Result<Vec<Medication>, PlatformError> {
        self.select(
            "medications",
            &[
                ("user_id", eq(user)),
                ("active", eq(true)),
                ("order", "started_at.desc".to_owned()),
            ],
        )
        .await
    }

    async fn insert_symptom(&self, draft: &SymptomDraft) -> Result<Symptom, PlatformError> {
        self.insert_returning("symptoms", draft).await
    }

    async fn insert_metric(
        &self,
        draft: &HealthMetricDraft,
    ) -> Result<HealthMetric, PlatformError> {
        self.insert_returning("health_metrics", draft).await
    }
}
