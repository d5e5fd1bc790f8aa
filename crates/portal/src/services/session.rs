//! Session management.
//!
//! [`SessionManager`] owns the single authoritative view of who is logged in.
//! It moves through `Uninitialized → Loading → {Authenticated, Anonymous}`
//! once, then flips between `Authenticated` and `Anonymous` as the platform's
//! auth events and the manager's own operations dictate. Consumers observe
//! the state through a `watch` channel; every state-changing operation fans
//! out to all of them.
//!
//! Two paths can resolve the same sign-in: the direct profile fetch inside
//! [`login`](SessionManager::login) and the `SignedIn` event arriving on the
//! pump. Both funnel through the same state write, so whichever finishes
//! second is a no-op.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use meridian_core::{Email, Role, UserId};

use crate::error::{PortalError, Result};
use crate::models::{Profile, ProfileDraft, ProfileUpdate};
use crate::platform::{AuthApi, AuthEvent, AuthEvents, PlatformError, ProfileStore};

/// Observable authentication state.
///
/// `is_loading` is true only before the first resolution of the session
/// lookup; once `is_initialized` turns true it never reverts.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// The cached profile of the signed-in user, if any.
    pub user: Option<Profile>,
    pub is_loading: bool,
    pub is_initialized: bool,
}

impl SessionState {
    fn uninitialized() -> Self {
        Self {
            user: None,
            is_loading: true,
            is_initialized: false,
        }
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Owns session state and the imperative auth operations that mutate it.
///
/// Construct one per application root with [`start`](Self::start) and tear it
/// down with [`shutdown`](Self::shutdown); consumers receive a state handle
/// from [`subscribe`](Self::subscribe).
pub struct SessionManager {
    inner: Arc<SessionInner>,
    init_timeout: Duration,
    pump: Mutex<Option<JoinHandle<()>>>,
}

struct SessionInner {
    auth: Arc<dyn AuthApi>,
    profiles: Arc<dyn ProfileStore>,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
}

impl SessionManager {
    /// Create the manager and start its auth-event pump.
    ///
    /// The manager starts in the loading state; call
    /// [`initialize`](Self::initialize) to resolve the existing session.
    #[must_use]
    pub fn start(
        auth: Arc<dyn AuthApi>,
        profiles: Arc<dyn ProfileStore>,
        init_timeout: Duration,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::uninitialized());
        let events = auth.subscribe();
        let inner = Arc::new(SessionInner {
            auth,
            profiles,
            state,
            cancel: CancellationToken::new(),
        });

        let pump = tokio::spawn(run_pump(events, Arc::clone(&inner)));

        Self {
            inner,
            init_timeout,
            pump: Mutex::new(Some(pump)),
        }
    }

    /// Observe session state. The receiver always holds the latest value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// The cached profile of the signed-in user, if any.
    #[must_use]
    pub fn current_user(&self) -> Option<Profile> {
        self.inner.state.borrow().user.clone()
    }

    /// Resolve the existing platform session, bounded by the configured
    /// deadline.
    ///
    /// Never fails the caller: a missing session, a lookup error, or the
    /// deadline all resolve to the anonymous state with loading complete. A
    /// session whose profile row is gone is treated as invalid and signed out
    /// remotely. Hitting the deadline drops the in-flight lookup; a session
    /// that materializes afterwards still arrives through the event pump.
    pub async fn initialize(&self) {
        let inner = &self.inner;
        let lookup = async {
            match inner.auth.current_session().await {
                Ok(Some(session)) => inner.resolve_profile(session.user_id).await,
                Ok(None) => inner.set_user(None),
                Err(err) => {
                    tracing::warn!(error = %err, "session lookup failed, continuing anonymously");
                    inner.set_user(None);
                }
            }
        };

        if tokio::time::timeout(self.init_timeout, lookup).await.is_err() {
            tracing::warn!(
                timeout_secs = self.init_timeout.as_secs(),
                "session initialization deadline hit, continuing anonymously"
            );
            inner.set_user(None);
        }
    }

    /// Sign in and cache the profile.
    ///
    /// The profile is fetched directly rather than waiting for the `SignedIn`
    /// event, so the caller sees the authenticated state as soon as the
    /// platform confirms the credentials.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::InvalidEmail`] for a malformed address,
    /// [`PortalError::Unauthorized`] for rejected credentials, and the
    /// translated platform error otherwise.
    pub async fn login(&self, email: &str, password: &str) -> Result<Profile> {
        let email = Email::parse(email)?;
        let session = self.inner.auth.sign_in(&email, password).await?;

        let profile = self.inner.profiles.get_profile(session.user_id).await?;
        self.inner.set_user(Some(profile.clone()));
        Ok(profile)
    }

    /// Register a new account: create the credential, then insert a profile
    /// row seeded with default preferences.
    ///
    /// The two phases are not atomic. If the profile insert fails the
    /// credential already exists and stays behind; the failure is logged with
    /// the email so operators can reconcile.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error from either phase.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
    ) -> Result<Profile> {
        let email = Email::parse(email)?;
        let credential = self.inner.auth.sign_up(&email, password).await?;

        let draft = ProfileDraft::new(
            credential.user_id,
            credential.email,
            first_name,
            last_name,
            role,
        );
        match self.inner.profiles.insert_profile(&draft).await {
            Ok(profile) => Ok(profile),
            Err(err) => {
                tracing::error!(
                    error = %err,
                    email = %draft.email,
                    user_id = %draft.id,
                    "profile insert failed after credential creation; credential is orphaned"
                );
                Err(err.into())
            }
        }
    }

    /// Sign out remotely, then clear the cached profile unconditionally.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error from the remote sign-out; local
    /// state is anonymous either way.
    pub async fn logout(&self) -> Result<()> {
        let result = self.inner.auth.sign_out().await;
        self.inner.set_user(None);
        result.map_err(Into::into)
    }

    /// Apply a partial profile update and replace the cache with the
    /// server's returned row.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::NotLoggedIn`] when no user is authenticated,
    /// otherwise the translated platform error.
    pub async fn update_user(&self, update: ProfileUpdate) -> Result<Profile> {
        let current = self.current_user().ok_or(PortalError::NotLoggedIn)?;
        let updated = self
            .inner
            .profiles
            .update_profile(current.id, &update)
            .await?;
        self.inner.set_user(Some(updated.clone()));
        Ok(updated)
    }

    /// Ask the platform to email a password-reset link.
    ///
    /// # Errors
    ///
    /// Returns the translated platform error.
    pub async fn reset_password(&self, email: &str) -> Result<()> {
        let email = Email::parse(email)?;
        self.inner.auth.send_password_reset(&email).await?;
        Ok(())
    }

    /// Check a two-factor code for the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::NotLoggedIn`] when no user is authenticated,
    /// otherwise the translated platform error. `Ok(false)` means the code
    /// was wrong.
    pub async fn verify_two_factor(&self, code: &str) -> Result<bool> {
        let current = self.current_user().ok_or(PortalError::NotLoggedIn)?;
        Ok(self.inner.auth.verify_code(&current.email, code).await?)
    }

    /// Turn two-factor login on.
    ///
    /// # Errors
    ///
    /// Same as [`update_user`](Self::update_user).
    pub async fn enable_two_factor(&self) -> Result<Profile> {
        self.set_two_factor(true).await
    }

    /// Turn two-factor login off.
    ///
    /// # Errors
    ///
    /// Same as [`update_user`](Self::update_user).
    pub async fn disable_two_factor(&self) -> Result<Profile> {
        self.set_two_factor(false).await
    }

    async fn set_two_factor(&self, enabled: bool) -> Result<Profile> {
        self.update_user(ProfileUpdate {
            two_factor_enabled: Some(enabled),
            ..ProfileUpdate::default()
        })
        .await
    }

    /// Stop the event pump and release the auth subscription.
    ///
    /// After shutdown the state no longer changes; late results from
    /// in-flight fetches are discarded.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let pump = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pump) = pump
            && let Err(err) = pump.await
        {
            tracing::debug!(error = %err, "session pump did not stop cleanly");
        }
    }
}

impl SessionInner {
    /// Every state write funnels through here; nothing lands after shutdown.
    fn set_user(&self, user: Option<Profile>) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.state.send_modify(|state| {
            state.user = user;
            state.is_loading = false;
            state.is_initialized = true;
        });
    }

    /// Fetch and cache the profile backing a session.
    ///
    /// A missing row means the session points at an account that no longer
    /// exists: force a remote sign-out and go anonymous. Any other error is
    /// logged and surfaces anonymous without propagating.
    async fn resolve_profile(&self, user_id: UserId) {
        match self.profiles.get_profile(user_id).await {
            Ok(profile) => self.set_user(Some(profile)),
            Err(PlatformError::RowNotFound) => {
                tracing::warn!(%user_id, "session references a missing profile, signing out");
                if let Err(err) = self.auth.sign_out().await {
                    tracing::warn!(error = %err, "forced sign-out failed");
                }
                self.set_user(None);
            }
            Err(err) => {
                tracing::error!(error = %err, %user_id, "profile fetch failed");
                self.set_user(None);
            }
        }
    }

    async fn handle_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => self.resolve_profile(session.user_id).await,
            AuthEvent::SignedOut => self.set_user(None),
            AuthEvent::TokenRefreshed(session) => {
                // Only fetch when nothing is cached; a refresh does not
                // change the identity.
                if self.state.borrow().user.is_none() {
                    self.resolve_profile(session.user_id).await;
                }
            }
        }
    }
}

/// Consume auth events strictly in delivery order until cancelled or the
/// provider closes the stream.
async fn run_pump(mut events: AuthEvents, inner: Arc<SessionInner>) {
    loop {
        let event = tokio::select! {
            () = inner.cancel.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => {
                    tracing::debug!("auth event stream closed");
                    break;
                }
            },
        };
        inner.handle_event(event).await;
    }
}
