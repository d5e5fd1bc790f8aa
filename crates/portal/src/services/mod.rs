//! Client-side services behind the portal screens.
//!
//! # Services
//!
//! - `session` - who is logged in; auth operations and the auth-event pump
//! - `notifications` - notification list + unread counter synchronization
//! - `messaging` - conversation summaries with unread counts, send/mark-read
//! - `appointments` - booking and schedule management
//! - `health` - test results, vitals, medications, symptoms, metrics
//!
//! Services hold `Arc<dyn …>` platform handles and are constructed explicitly
//! at the application root; nothing in here is a global.

pub mod appointments;
pub mod health;
pub mod messaging;
pub mod notifications;
pub mod session;

pub use appointments::AppointmentService;
pub use health::HealthRecordService;
pub use messaging::MessagingService;
pub use notifications::{NotificationFeed, NotificationState};
pub use session::{SessionManager, SessionState};

use crate::error::{PortalError, Result};
use crate::platform::PlatformError;

/// Read-path policy: list loads degrade to empty instead of failing the
/// caller, except that a row-policy rejection is always surfaced.
pub(crate) fn degrade_list<T>(
    result: std::result::Result<Vec<T>, PlatformError>,
    what: &'static str,
) -> Result<Vec<T>> {
    match result {
        Ok(rows) => Ok(rows),
        Err(PlatformError::Unauthorized(detail)) => Err(PortalError::Unauthorized(detail)),
        Err(err) => {
            tracing::warn!(error = %err, what, "read failed, degrading to empty");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degrades_ordinary_failures() {
        let result: Result<Vec<u8>> = degrade_list(
            Err(PlatformError::Service {
                status: 500,
                message: "boom".to_owned(),
            }),
            "test",
        );
        assert_eq!(result.expect("degraded"), Vec::<u8>::new());
    }

    #[test]
    fn surfaces_policy_rejections() {
        let result: Result<Vec<u8>> = degrade_list(
            Err(PlatformError::Unauthorized("row policy".to_owned())),
            "test",
        );
        assert!(matches!(result, Err(PortalError::Unauthorized(_))));
    }
}
