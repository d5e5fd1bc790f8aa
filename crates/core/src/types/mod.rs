//! Shared type definitions.
//!
//! # Modules
//!
//! - [`id`] - Type-safe ID newtypes minted with the `define_id!` macro
//! - [`email`] - Validated email address type
//! - [`role`] - Role and status enums used on platform rows
//! - [`preferences`] - Per-user portal preferences

pub mod email;
pub mod id;
pub mod preferences;
pub mod role;

pub use email::{Email, EmailError};
pub use id::{AppointmentId, ConversationId, MessageId, NotificationId, RecordId, UserId};
pub use preferences::Preferences;
pub use role::{AppointmentStatus, NotificationPriority, NotificationType, Role};
