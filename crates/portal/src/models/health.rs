//! Health-record domain types.
//!
//! Plain typed rows; the portal only lists and inserts these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use meridian_core::{RecordId, UserId};

/// A released lab or imaging result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: RecordId,
    pub user_id: UserId,
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_range: Option<String>,
    /// Set by the lab when the value falls outside the reference range.
    pub flagged: bool,
    pub collected_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// A vitals reading taken at a visit or submitted from a home device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSign {
    pub id: RecordId,
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub systolic: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diastolic: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_c: Option<f32>,
    pub recorded_at: DateTime<Utc>,
}

/// A prescribed medication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: RecordId,
    pub user_id: UserId,
    pub name: String,
    pub dosage: String,
    /// Free-text schedule, e.g. "twice daily with food".
    pub schedule: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescribed_by: Option<UserId>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

/// A patient-logged symptom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symptom {
    pub id: RecordId,
    pub user_id: UserId,
    pub description: String,
    /// Self-reported severity, 1 (mild) to 10 (worst).
    pub severity: u8,
    pub noted_at: DateTime<Utc>,
}

/// Row values for logging a symptom.
#[derive(Debug, Clone, Serialize)]
pub struct SymptomDraft {
    pub user_id: UserId,
    pub description: String,
    pub severity: u8,
    pub noted_at: DateTime<Utc>,
}

/// A tracked health metric sample (weight, glucose, steps, …).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetric {
    pub id: RecordId,
    pub user_id: UserId,
    pub kind: String,
    pub value: f64,
    pub unit: String,
    pub measured_at: DateTime<Utc>,
}

/// Row values for recording a metric sample.
#[derive(Debug, Clone, Serialize)]
pub struct HealthMetricDraft {
    pub user_id: UserId,
    pub kind: String,
    pub value: f64,
    pub unit: String,
    pub measured_at: DateTime<Utc>,
}
