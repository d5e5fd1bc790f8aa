//! Domain models for platform rows.
//!
//! These mirror the platform's collections one struct per row, plus the
//! derived view types the portal screens render (conversation summaries,
//! notification display attributes). Derived attributes are computed, never
//! persisted.

pub mod appointment;
pub mod health;
pub mod message;
pub mod notification;
pub mod profile;

pub use appointment::{Appointment, AppointmentDraft};
pub use health::{
    HealthMetric, HealthMetricDraft, Medication, Symptom, SymptomDraft, TestResult, VitalSign,
};
pub use message::{
    Conversation, ConversationParticipant, ConversationSummary, Message, MessageDraft,
};
pub use notification::{Notification, NotificationDraft, NotificationOptions};
pub use profile::{Profile, ProfileDraft, ProfileUpdate};
