//! Per-user portal preferences.

use serde::{Deserialize, Serialize};

/// Notification and privacy preferences stored on a profile row.
///
/// New accounts are seeded with [`Preferences::default`]. Missing fields on
/// older rows deserialize to the same defaults, so adding a preference never
/// requires a backfill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// BCP 47 language tag for portal copy.
    pub language: String,
    /// Receive notification digests by email.
    pub email_notifications: bool,
    /// Receive notification digests by SMS.
    pub sms_notifications: bool,
    /// Receive push notifications.
    pub push_notifications: bool,
    /// Allow the assigned care team to view health records.
    pub share_records_with_care_team: bool,
    /// Allow providers to find this profile by name.
    pub show_profile_to_providers: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: "en".to_owned(),
            email_notifications: true,
            sms_notifications: false,
            push_notifications: true,
            share_records_with_care_team: true,
            show_profile_to_providers: true,
        }
    }
}
