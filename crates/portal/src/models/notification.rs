//! Notification domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meridian_core::{NotificationId, NotificationPriority, NotificationType, UserId};

/// A notification row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    #[serde(default)]
    pub priority: NotificationPriority,
    pub is_read: bool,
    /// Portal route the notification links to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    /// Free-form payload attached by whichever backend process created the
    /// row (appointment IDs, result IDs, …).
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Whether the portal lets the user dismiss this notification.
    ///
    /// Urgent notifications stay until they have been read.
    #[must_use]
    pub fn can_dismiss(&self) -> bool {
        self.is_read || self.priority != NotificationPriority::Urgent
    }

    /// Whether the notification asks the user to go somewhere and do
    /// something, rather than just informing them.
    #[must_use]
    pub fn requires_action(&self) -> bool {
        self.action_url.is_some()
            || matches!(
                self.notification_type,
                NotificationType::Appointment | NotificationType::TestResult
            )
    }

    /// Button label for the notification's action, keyed by type.
    #[must_use]
    pub const fn action_label(&self) -> &'static str {
        match self.notification_type {
            NotificationType::Appointment => "View appointment",
            NotificationType::Message => "Read message",
            NotificationType::TestResult => "View results",
            NotificationType::Medication => "View medication",
            NotificationType::System => "View",
        }
    }
}

/// Optional attributes for a locally created notification.
#[derive(Debug, Clone, Default)]
pub struct NotificationOptions {
    pub priority: NotificationPriority,
    pub action_url: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Row values for inserting a notification.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationDraft {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub is_read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    pub metadata: serde_json::Value,
}

impl NotificationDraft {
    /// An unread draft for `user` from the given type, title, message, and
    /// options.
    #[must_use]
    pub fn new(
        user_id: UserId,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        options: NotificationOptions,
    ) -> Self {
        Self {
            user_id,
            title: title.to_owned(),
            message: message.to_owned(),
            notification_type,
            priority: options.priority,
            is_read: false,
            action_url: options.action_url,
            metadata: options.metadata.unwrap_or(serde_json::Value::Null),
        }
    }
}
