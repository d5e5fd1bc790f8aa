//! Messaging domain types.
//!
//! Conversations, their participants, and messages are separate platform
//! collections; [`ConversationSummary`] is the derived view the inbox screen
//! renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meridian_core::{ConversationId, MessageId, UserId};

use super::Profile;

/// A conversation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    /// Optional subject line; patient-provider threads usually have one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Bumped by the platform whenever a message lands.
    pub updated_at: DateTime<Utc>,
}

/// Membership row joining users to conversations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationParticipant {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
}

/// A message row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    /// Read state as seen by the recipient side of the thread.
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Row values for sending a message.
#[derive(Debug, Clone, Serialize)]
pub struct MessageDraft {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub body: String,
    pub is_read: bool,
}

impl MessageDraft {
    /// An unread outgoing message.
    #[must_use]
    pub fn new(conversation_id: ConversationId, sender_id: UserId, body: &str) -> Self {
        Self {
            conversation_id,
            sender_id,
            body: body.to_owned(),
            is_read: false,
        }
    }
}

/// Derived inbox entry for one conversation, as seen by one viewer.
///
/// `unread_count` counts messages in the conversation that the viewer did not
/// send and that are still unread.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub conversation: Conversation,
    /// Everyone in the thread except the viewer.
    pub other_participants: Vec<Profile>,
    /// Most recent message, if the thread has any.
    pub last_message: Option<Message>,
    pub unread_count: u32,
}

impl ConversationSummary {
    /// Inbox line title: the subject if set, otherwise the other
    /// participants' names.
    #[must_use]
    pub fn title(&self) -> String {
        if let Some(subject) = &self.conversation.subject
            && !subject.trim().is_empty()
        {
            return subject.clone();
        }

        let names: Vec<String> = self
            .other_participants
            .iter()
            .map(Profile::display_name)
            .collect();
        if names.is_empty() {
            "Conversation".to_owned()
        } else {
            names.join(", ")
        }
    }
}

#[cfg(test)]
mod tests {
    use meridian_core::{Email, Preferences, Role};

    use super::*;

    fn summary(subject: Option<&str>, names: &[(&str, &str)]) -> ConversationSummary {
        ConversationSummary {
            conversation: Conversation {
                id: ConversationId::generate(),
                subject: subject.map(str::to_owned),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            other_participants: names
                .iter()
                .map(|(first, last)| Profile {
                    id: UserId::generate(),
                    email: Email::parse("p@example.com").expect("valid"),
                    first_name: (*first).to_owned(),
                    last_name: (*last).to_owned(),
                    role: Role::Doctor,
                    phone: None,
                    date_of_birth: None,
                    two_factor_enabled: false,
                    biometric_enabled: false,
                    preferences: Preferences::default(),
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
                .collect(),
            last_message: None,
            unread_count: 0,
        }
    }

    #[test]
    fn title_prefers_subject() {
        let s = summary(Some("Lab follow-up"), &[("Ada", "Reyes")]);
        assert_eq!(s.title(), "Lab follow-up");
    }

    #[test]
    fn title_joins_participant_names() {
        let s = summary(None, &[("Ada", "Reyes"), ("Ben", "Cho")]);
        assert_eq!(s.title(), "Ada Reyes, Ben Cho");
    }

    #[test]
    fn title_has_a_fallback() {
        let s = summary(Some("   "), &[]);
        assert_eq!(s.title(), "Conversation");
    }
}
