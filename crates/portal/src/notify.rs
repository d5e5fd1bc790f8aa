//! System notification seam.
//!
//! Native notification popups are a best-effort nicety: the portal asks for
//! permission once and shows a popup when a notification row is pushed while
//! the app is open. Hosts without the capability plug in [`NoopNotifier`] and
//! everything else keeps working.

use async_trait::async_trait;

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
    /// The user has not answered yet.
    Undecided,
}

/// Host capability for native notification popups.
#[async_trait]
pub trait SystemNotifier: Send + Sync {
    /// Ask the host for permission to show popups.
    async fn request_permission(&self) -> PermissionState;

    /// Show a popup. Implementations must not fail loudly; a popup that
    /// cannot be shown is dropped.
    fn show(&self, title: &str, body: &str);
}

/// No-op notifier for hosts without a notification capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl SystemNotifier for NoopNotifier {
    async fn request_permission(&self) -> PermissionState {
        PermissionState::Undecided
    }

    fn show(&self, title: &str, _body: &str) {
        tracing::debug!(title, "dropping system notification (no notifier)");
    }
}
