//! Profile domain types.
//!
//! The profile is the application-level user record, distinct from the raw
//! authentication credential the platform holds. The session manager caches
//! one of these; the platform row remains authoritative.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use meridian_core::{Email, Preferences, Role, UserId};

/// A portal user's profile row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Row ID; equals the platform credential's user ID.
    pub id: UserId,
    /// Login email, duplicated from the credential for display and search.
    pub email: Email,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Account role.
    pub role: Role,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Date of birth (patients only in practice).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    /// Whether two-factor login is enabled.
    pub two_factor_enabled: bool,
    /// Whether biometric unlock is enabled on the user's devices.
    pub biometric_enabled: bool,
    /// Notification and privacy preferences.
    #[serde(default)]
    pub preferences: Preferences,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Human-readable name, falling back to the email's local part when both
    /// name fields are blank.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.email.local_part().to_owned()
        } else {
            full.to_owned()
        }
    }
}

/// Row values inserted when an account registers.
///
/// Seeded with [`Preferences::default`]; the platform fills in timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileDraft {
    pub id: UserId,
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    pub two_factor_enabled: bool,
    pub biometric_enabled: bool,
    pub preferences: Preferences,
}

impl ProfileDraft {
    /// A draft for a freshly created credential with default preferences.
    #[must_use]
    pub fn new(id: UserId, email: Email, first_name: &str, last_name: &str, role: Role) -> Self {
        Self {
            id,
            email,
            first_name: first_name.to_owned(),
            last_name: last_name.to_owned(),
            role,
            phone: None,
            date_of_birth: None,
            two_factor_enabled: false,
            biometric_enabled: false,
            preferences: Preferences::default(),
        }
    }
}

/// Partial profile update; only set fields are sent.
///
/// The server's returned row replaces the local cache wholesale, so there is
/// no client-side merge logic to keep correct.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub two_factor_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub biometric_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

impl ProfileUpdate {
    /// Whether the update carries no changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
            && self.date_of_birth.is_none()
            && self.two_factor_enabled.is_none()
            && self.biometric_enabled.is_none()
            && self.preferences.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(first: &str, last: &str) -> Profile {
        Profile {
            id: UserId::generate(),
            email: Email::parse("sam.okafor@example.com").expect("valid"),
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

    #[test]
    fn display_name_uses_name_fields() {
        assert_eq!(profile("Sam", "Okafor").display_name(), "Sam Okafor");
    }

    #[test]
    fn display_name_falls_back_to_email() {
        assert_eq!(profile("", "").display_name(), "sam.okafor");
        assert_eq!(profile("  ", "").display_name(), "sam.okafor");
    }

    #[test]
    fn update_serializes_only_set_fields() {
        let update = ProfileUpdate {
            phone: Some("555-0199".to_owned()),
            ..ProfileUpdate::default()
        };
        let json = serde_json::to_value(&update).expect("serialize");
        assert_eq!(json, serde_json::json!({"phone": "555-0199"}));
    }
}
