//! Appointment domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meridian_core::{AppointmentId, AppointmentStatus, UserId};

/// An appointment row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub patient_id: UserId,
    pub provider_id: UserId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    /// Patient-entered reason for the visit.
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Provider notes, filled in after the visit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row values for booking an appointment.
///
/// New bookings start in [`AppointmentStatus::Requested`] until the
/// provider's office schedules them.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentDraft {
    pub patient_id: UserId,
    pub provider_id: UserId,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl AppointmentDraft {
    /// A requested appointment of the default 30-minute length.
    #[must_use]
    pub fn new(
        patient_id: UserId,
        provider_id: UserId,
        scheduled_at: DateTime<Utc>,
        reason: &str,
    ) -> Self {
        Self {
            patient_id,
            provider_id,
            scheduled_at,
            duration_minutes: 30,
            status: AppointmentStatus::Requested,
            reason: reason.to_owned(),
            location: None,
        }
    }
}
