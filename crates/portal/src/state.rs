//! Application state shared across portal screens.

use std::sync::Arc;

use crate::config::PortalConfig;
use crate::notify::{NoopNotifier, SystemNotifier};
use crate::platform::{
    AppointmentStore, HealthRecordStore, MessageStore, NotificationStore, PlatformError,
    ProfileStore,
};
use crate::platform::rest::{PlatformClient, RestAuth, RestRealtime, RestStore};
use crate::services::{
    AppointmentService, HealthRecordService, MessagingService, NotificationFeed, SessionManager,
};

/// Everything the portal screens need, wired over the REST platform clients.
///
/// This struct is cheaply cloneable via `Arc` and is the application's
/// composition root: construct one per process inside a tokio runtime, call
/// [`SessionManager::initialize`] on its session, and hand references to the
/// screens. Teardown is explicit through [`shutdown`](Self::shutdown).
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    session: SessionManager,
    notifications: NotificationFeed,
    messaging: MessagingService,
    appointments: AppointmentService,
    health: HealthRecordService,
}

impl AppState {
    /// Connect with no system-notification capability.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform client cannot be built from the
    /// configuration.
    pub fn connect(config: &PortalConfig) -> Result<Self, PlatformError> {
        Self::connect_with_notifier(config, Arc::new(NoopNotifier))
    }

    /// Connect with a host-provided notifier for native popups.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform client cannot be built from the
    /// configuration.
    pub fn connect_with_notifier(
        config: &PortalConfig,
        notifier: Arc<dyn SystemNotifier>,
    ) -> Result<Self, PlatformError> {
        let client = PlatformClient::new(config)?;
        let auth = Arc::new(RestAuth::new(client.clone()));
        let store = Arc::new(RestStore::new(client.clone()));
        let realtime = Arc::new(RestRealtime::new(client));

        let session = SessionManager::start(
            auth,
            Arc::clone(&store) as Arc<dyn ProfileStore>,
            config.init_timeout,
        );
        let notifications = NotificationFeed::start(
            Arc::clone(&store) as Arc<dyn NotificationStore>,
            realtime,
            notifier,
            session.subscribe(),
            config.notification_page_size,
        );
        let messaging = MessagingService::new(
            Arc::clone(&store) as Arc<dyn MessageStore>,
            Arc::clone(&store) as Arc<dyn ProfileStore>,
        );
        let appointments =
            AppointmentService::new(Arc::clone(&store) as Arc<dyn AppointmentStore>);
        let health = HealthRecordService::new(store as Arc<dyn HealthRecordStore>);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                session,
                notifications,
                messaging,
                appointments,
                health,
            }),
        })
    }

    /// Get the session manager.
    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.inner.session
    }

    /// Get the notification feed.
    #[must_use]
    pub fn notifications(&self) -> &NotificationFeed {
        &self.inner.notifications
    }

    /// Get the messaging service.
    #[must_use]
    pub fn messaging(&self) -> &MessagingService {
        &self.inner.messaging
    }

    /// Get the appointment service.
    #[must_use]
    pub fn appointments(&self) -> &AppointmentService {
        &self.inner.appointments
    }

    /// Get the health-record service.
    #[must_use]
    pub fn health(&self) -> &HealthRecordService {
        &self.inner.health
    }

    /// Stop the feed and session pumps, releasing their subscriptions.
    pub async fn shutdown(&self) {
        self.inner.notifications.shutdown().await;
        self.inner.session.shutdown().await;
    }
}
