//! Portal error taxonomy.
//!
//! Platform failures are translated into a small taxonomy at this boundary:
//! `NotFound` and `Unauthorized` are recognized from the platform's
//! machine-readable codes and surfaced as-is; everything else becomes
//! `Unexpected` with a generic message, with the detail kept in the log
//! rather than shown to callers.

use thiserror::Error;

use meridian_core::EmailError;

use crate::platform::PlatformError;

/// Application-level error type for the portal client.
#[derive(Debug, Error)]
pub enum PortalError {
    /// Referenced row absent (or hidden by row policy).
    #[error("not found")]
    NotFound,

    /// Row-level policy rejected the operation. Never silently swallowed.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The operation requires an authenticated user.
    #[error("not logged in")]
    NotLoggedIn,

    /// Invalid email address supplied to an auth operation.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Any other platform failure; detail is in the log, not the message.
    #[error("something went wrong, please try again")]
    Unexpected,
}

impl From<PlatformError> for PortalError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::RowNotFound => Self::NotFound,
            PlatformError::Unauthorized(detail) => Self::Unauthorized(detail),
            PlatformError::NoSession => Self::NotLoggedIn,
            other => {
                tracing::error!(error = %other, "platform call failed");
                Self::Unexpected
            }
        }
    }
}

/// Result type alias for `PortalError`.
pub type Result<T> = std::result::Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_translation() {
        let err = PortalError::from(PlatformError::RowNotFound);
        assert!(matches!(err, PortalError::NotFound));
    }

    #[test]
    fn test_unauthorized_keeps_policy_detail() {
        let err = PortalError::from(PlatformError::Unauthorized("row policy".to_owned()));
        assert_eq!(err.to_string(), "unauthorized: row policy");
    }

    #[test]
    fn test_unexpected_hides_internal_detail() {
        let err = PortalError::from(PlatformError::Service {
            status: 500,
            message: "pg_catalog exploded at line 3".to_owned(),
        });
        assert!(matches!(err, PortalError::Unexpected));
        assert!(!err.to_string().contains("pg_catalog"));
    }

    #[test]
    fn test_missing_session_maps_to_not_logged_in() {
        let err = PortalError::from(PlatformError::NoSession);
        assert!(matches!(err, PortalError::NotLoggedIn));
    }
}
