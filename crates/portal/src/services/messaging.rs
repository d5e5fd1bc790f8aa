//! Secure messaging.
//!
//! The inbox screen needs one derived row per conversation: who else is in
//! it, the latest message, and how many incoming messages the viewer has not
//! read. All of that is computed here from fetched rows; nothing derived is
//! persisted.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use meridian_core::{ConversationId, UserId};

use crate::error::Result;
use crate::models::{ConversationSummary, Message, MessageDraft, Profile};
use crate::platform::{MessageStore, ProfileStore};
use crate::services::degrade_list;

/// Messages fetched per conversation; the unread count is computed over this
/// window.
const MESSAGE_PAGE: u32 = 50;

/// Participant profiles cached this long before a refetch.
const PROFILE_CACHE_TTL: Duration = Duration::from_secs(300);

/// Conversation and message operations for one portal instance.
pub struct MessagingService {
    messages: Arc<dyn MessageStore>,
    profiles: Arc<dyn ProfileStore>,
    profile_cache: Cache<UserId, Profile>,
}

impl MessagingService {
    /// Create the service with a fresh participant-profile cache.
    #[must_use]
    pub fn new(messages: Arc<dyn MessageStore>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self {
            messages,
            profiles,
            profile_cache: Cache::builder()
                .max_capacity(256)
                .time_to_live(PROFILE_CACHE_TTL)
                .build(),
        }
    }

    /// Build the viewer's inbox: one summary per conversation, most recently
    /// active first.
    ///
    /// The unread count per conversation is the number of messages the viewer
    /// did not send that are still unread, within the fetched window.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PortalError::Unauthorized`] on a row-policy
    /// rejection; other read failures degrade to an empty inbox.
    pub async fn conversation_summaries(
        &self,
        viewer: UserId,
    ) -> Result<Vec<ConversationSummary>> {
        let conversations = degrade_list(
            self.messages.conversations_for(viewer).await,
            "conversations",
        )?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let participants = degrade_list(
                self.messages.participants(conversation.id).await,
                "conversation participants",
            )?;
            let other_ids: Vec<UserId> = participants
                .iter()
                .map(|p| p.user_id)
                .filter(|id| *id != viewer)
                .collect();
            let other_participants = self.profiles_for(&other_ids).await;

            let messages = degrade_list(
                self.messages.messages_for(conversation.id, MESSAGE_PAGE).await,
                "messages",
            )?;
            let unread_count = u32::try_from(
                messages
                    .iter()
                    .filter(|m| m.sender_id != viewer && !m.is_read)
                    .count(),
            )
            .unwrap_or(u32::MAX);
            let last_message = messages.into_iter().next();

            summaries.push(ConversationSummary {
                conversation,
                other_participants,
                last_message,
                unread_count,
            });
        }

        Ok(summaries)
    }

    /// Messages in one conversation, newest first.
    ///
    /// # Errors
    ///
    /// Same read-path policy as
    /// [`conversation_summaries`](Self::conversation_summaries).
    pub async fn conversation_messages(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<Message>> {
        degrade_list(
            self.messages.messages_for(conversation, MESSAGE_PAGE).await,
            "messages",
        )
    }

    /// Send a message into a conversation.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn send_message(
        &self,
        conversation: ConversationId,
        sender: UserId,
        body: &str,
    ) -> Result<Message> {
        let draft = MessageDraft::new(conversation, sender, body);
        Ok(self.messages.insert_message(&draft).await?)
    }

    /// Mark every incoming message in the conversation read for `reader`.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn mark_conversation_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
    ) -> Result<()> {
        self.messages
            .mark_incoming_read(conversation, reader)
            .await?;
        Ok(())
    }

    /// Resolve display profiles, hitting the cache first and fetching the
    /// misses in one request. Unresolvable profiles are skipped.
    async fn profiles_for(&self, ids: &[UserId]) -> Vec<Profile> {
        let mut resolved = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();

        for id in ids {
            if let Some(profile) = self.profile_cache.get(id).await {
                resolved.push(profile);
            } else {
                missing.push(*id);
            }
        }

        if !missing.is_empty() {
            match self.profiles.get_profiles(&missing).await {
                Ok(fetched) => {
                    for profile in fetched {
                        self.profile_cache.insert(profile.id, profile.clone()).await;
                        resolved.push(profile);
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, "participant profile fetch failed");
                }
            }
        }

        resolved
    }
}
