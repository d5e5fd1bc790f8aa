//! Role and status enums used on platform rows.
//!
//! All enums serialize as `snake_case` strings to match the column values the
//! platform stores.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Account role of a portal user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A patient using the portal for their own care.
    Patient,
    /// A physician.
    Doctor,
    /// A nurse or other clinical staff member.
    Nurse,
    /// Portal administrator.
    Admin,
}

impl Role {
    /// Whether this role belongs to the care-provider side of the portal.
    #[must_use]
    pub const fn is_provider(self) -> bool {
        matches!(self, Self::Doctor | Self::Nurse)
    }

    /// The stored string value for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Patient => "patient",
            Self::Doctor => "doctor",
            Self::Nurse => "nurse",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a notification row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// Appointment booked, confirmed, rescheduled, or cancelled.
    Appointment,
    /// New message in a conversation.
    Message,
    /// A test result became available.
    TestResult,
    /// Medication reminder or refill notice.
    Medication,
    /// Anything the portal itself announces.
    System,
}

impl NotificationType {
    /// The stored string value for this type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Appointment => "appointment",
            Self::Message => "message",
            Self::TestResult => "test_result",
            Self::Medication => "medication",
            Self::System => "system",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery priority of a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Routine notification.
    #[default]
    Normal,
    /// Surfaced prominently in the portal.
    High,
    /// Requires attention; cannot be dismissed while unread.
    Urgent,
}

/// Lifecycle status of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    /// Requested by the patient, not yet scheduled.
    Requested,
    /// Scheduled by the provider's office.
    Scheduled,
    /// Confirmed by the patient.
    Confirmed,
    /// Visit happened.
    Completed,
    /// Cancelled by either side.
    Cancelled,
}

impl AppointmentStatus {
    /// Whether the appointment still occupies a future slot.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Requested | Self::Scheduled | Self::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_classify_providers() {
        assert!(Role::Doctor.is_provider());
        assert!(Role::Nurse.is_provider());
        assert!(!Role::Patient.is_provider());
        assert!(!Role::Admin.is_provider());
    }

    #[test]
    fn enums_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&NotificationType::TestResult).expect("serialize"),
            "\"test_result\""
        );
        assert_eq!(
            serde_json::to_string(&AppointmentStatus::Scheduled).expect("serialize"),
            "\"scheduled\""
        );
    }

    #[test]
    fn priority_defaults_to_normal() {
        assert_eq!(NotificationPriority::default(), NotificationPriority::Normal);
    }

    #[test]
    fn open_statuses() {
        assert!(AppointmentStatus::Requested.is_open());
        assert!(AppointmentStatus::Confirmed.is_open());
        assert!(!AppointmentStatus::Completed.is_open());
        assert!(!AppointmentStatus::Cancelled.is_open());
    }
}
