//! Health records.
//!
//! Thin CRUD over the record collections; the platform's row policy decides
//! whose records a caller can see.

use std::sync::Arc;

use chrono::Utc;

use meridian_core::UserId;

use crate::error::Result;
use crate::models::{
    HealthMetric, HealthMetricDraft, Medication, Symptom, SymptomDraft, TestResult, VitalSign,
};
use crate::platform::HealthRecordStore;
use crate::services::degrade_list;

const RESULT_PAGE: u32 = 20;
const VITALS_PAGE: u32 = 30;

/// Health-record operations for one portal instance.
pub struct HealthRecordService {
    store: Arc<dyn HealthRecordStore>,
}

impl HealthRecordService {
    #[must_use]
    pub const fn new(store: Arc<dyn HealthRecordStore>) -> Self {
        Self { store }
    }

    /// Recent released results, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PortalError::Unauthorized`] on a row-policy
    /// rejection; other read failures degrade to an empty list.
    pub async fn recent_test_results(&self, user: UserId) -> Result<Vec<TestResult>> {
        degrade_list(
            self.store.test_results_for(user, RESULT_PAGE).await,
            "test results",
        )
    }

    /// The most recent vitals reading, if any.
    ///
    /// # Errors
    ///
    /// Same read-path policy as
    /// [`recent_test_results`](Self::recent_test_results).
    pub async fn latest_vitals(&self, user: UserId) -> Result<Option<VitalSign>> {
        let mut readings = degrade_list(self.store.vital_signs_for(user, 1).await, "vitals")?;
        Ok(readings.drain(..).next())
    }

    /// Recent vitals history, newest first.
    ///
    /// # Errors
    ///
    /// Same read-path policy as
    /// [`recent_test_results`](Self::recent_test_results).
    pub async fn vitals_history(&self, user: UserId) -> Result<Vec<VitalSign>> {
        degrade_list(self.store.vital_signs_for(user, VITALS_PAGE).await, "vitals")
    }

    /// Active medications.
    ///
    /// # Errors
    ///
    /// Same read-path policy as
    /// [`recent_test_results`](Self::recent_test_results).
    pub async fn active_medications(&self, user: UserId) -> Result<Vec<Medication>> {
        degrade_list(self.store.medications_for(user).await, "medications")
    }

    /// Log a symptom now. Severity is clamped into the 1-10 scale.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn log_symptom(
        &self,
        user: UserId,
        description: &str,
        severity: u8,
    ) -> Result<Symptom> {
        let draft = SymptomDraft {
            user_id: user,
            description: description.to_owned(),
            severity: severity.clamp(1, 10),
            noted_at: Utc::now(),
        };
        Ok(self.store.insert_symptom(&draft).await?)
    }

    /// Record a metric sample now.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn record_metric(
        &self,
        user: UserId,
        kind: &str,
        value: f64,
        unit: &str,
    ) -> Result<HealthMetric> {
        let draft = HealthMetricDraft {
            user_id: user,
            kind: kind.to_owned(),
            value,
            unit: unit.to_owned(),
            measured_at: Utc::now(),
        };
        Ok(self.store.insert_metric(&draft).await?)
    }
}
