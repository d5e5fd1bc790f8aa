//! Appointment management.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use meridian_core::{AppointmentId, AppointmentStatus, UserId};

use crate::error::Result;
use crate::models::{Appointment, AppointmentDraft};
use crate::platform::AppointmentStore;
use crate::services::degrade_list;

/// Appointment operations for one portal instance.
pub struct AppointmentService {
    store: Arc<dyn AppointmentStore>,
}

impl AppointmentService {
    #[must_use]
    pub const fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// Open appointments from now on, soonest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PortalError::Unauthorized`] on a row-policy
    /// rejection; other read failures degrade to an empty list.
    pub async fn upcoming(&self, user: UserId) -> Result<Vec<Appointment>> {
        let now = Utc::now();
        let appointments = degrade_list(self.store.appointments_for(user).await, "appointments")?;
        Ok(appointments
            .into_iter()
            .filter(|a| a.status.is_open() && a.scheduled_at >= now)
            .collect())
    }

    /// Everything on record for the user, past and future.
    ///
    /// # Errors
    ///
    /// Same read-path policy as [`upcoming`](Self::upcoming).
    pub async fn all(&self, user: UserId) -> Result<Vec<Appointment>> {
        degrade_list(self.store.appointments_for(user).await, "appointments")
    }

    /// Request a new appointment.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn book(&self, draft: AppointmentDraft) -> Result<Appointment> {
        Ok(self.store.insert_appointment(&draft).await?)
    }

    /// Confirm a scheduled appointment.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn confirm(&self, id: AppointmentId) -> Result<Appointment> {
        Ok(self
            .store
            .set_status(id, AppointmentStatus::Confirmed)
            .await?)
    }

    /// Cancel an appointment.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn cancel(&self, id: AppointmentId) -> Result<Appointment> {
        Ok(self
            .store
            .set_status(id, AppointmentStatus::Cancelled)
            .await?)
    }

    /// Move an appointment to a new time.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn reschedule(
        &self,
        id: AppointmentId,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Appointment> {
        Ok(self.store.set_time(id, scheduled_at).await?)
    }
}
