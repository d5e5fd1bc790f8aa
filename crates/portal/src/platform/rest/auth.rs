//! REST auth client.
//!
//! Speaks the platform's `auth/v1` endpoints and emits [`AuthEvent`]s to
//! subscribers as a side effect of its own operations, so every consumer of
//! the event stream sees sign-ins and sign-outs in the order they happened in
//! this process.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::Deserialize;
use tokio::sync::mpsc;

use meridian_core::{Email, UserId};

use super::PlatformClient;
use crate::platform::{AuthApi, AuthCredential, AuthEvent, AuthEvents, AuthSession, PlatformError};

/// Tokens closer than this many seconds to expiry are refreshed eagerly.
const EXPIRY_SKEW_SECS: i64 = 30;

/// REST implementation of [`AuthApi`].
pub struct RestAuth {
    client: PlatformClient,
    state: Mutex<AuthState>,
}

#[derive(Default)]
struct AuthState {
    session: Option<AuthSession>,
    listeners: Vec<mpsc::UnboundedSender<AuthEvent>>,
}

impl RestAuth {
    /// Wrap the shared platform client.
    #[must_use]
    pub fn new(client: PlatformClient) -> Self {
        Self {
            client,
            state: Mutex::new(AuthState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver an event to every live subscriber, dropping closed channels.
    fn emit(&self, event: &AuthEvent) {
        self.lock()
            .listeners
            .retain(|listener| listener.send(event.clone()).is_ok());
    }

    /// Install a session: cache it, arm the bearer token, notify subscribers.
    fn install(&self, session: AuthSession, event: fn(AuthSession) -> AuthEvent) {
        self.client.set_token(Some(session.access_token.clone()));
        self.lock().session = Some(session.clone());
        self.emit(&event(session));
    }

    /// Drop the session locally and notify subscribers.
    fn clear(&self) {
        self.client.set_token(None);
        self.lock().session = None;
        self.emit(&AuthEvent::SignedOut);
    }

    async fn token_request(
        &self,
        grant_type: &str,
        body: &serde_json::Value,
    ) -> Result<AuthSession, PlatformError> {
        let mut url = self.client.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);

        let response = self
            .client
            .request(Method::POST, url)
            .json(body)
            .send()
            .await?;
        let token: TokenResponse = PlatformClient::check(response).await?.json().await?;
        Ok(token.into_session())
    }
}

#[async_trait]
impl AuthApi for RestAuth {
    async fn current_session(&self) -> Result<Option<AuthSession>, PlatformError> {
        let cached = self.lock().session.clone();
        let Some(session) = cached else {
            return Ok(None);
        };

        if session.expires_at - Utc::now() > Duration::seconds(EXPIRY_SKEW_SECS) {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            self.clear();
            return Ok(None);
        };

        let body = serde_json::json!({ "refresh_token": refresh_token });
        match self.token_request("refresh_token", &body).await {
            Ok(renewed) => {
                self.install(renewed.clone(), AuthEvent::TokenRefreshed);
                Ok(Some(renewed))
            }
            Err(err) => {
                tracing::warn!(error = %err, "session refresh failed, signing out locally");
                self.clear();
                Ok(None)
            }
        }
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<AuthSession, PlatformError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let session = self.token_request("password", &body).await?;
        self.install(session.clone(), AuthEvent::SignedIn);
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<AuthCredential, PlatformError> {
        let url = self.client.auth_url("signup")?;
        let body = serde_json::json!({ "email": email, "password": password });

        let response = self
            .client
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await?;
        let user: AuthUser = PlatformClient::check(response).await?.json().await?;

        Ok(AuthCredential {
            user_id: user.id,
            email: user.email,
        })
    }

    async fn sign_out(&self) -> Result<(), PlatformError> {
        let url = self.client.auth_url("logout")?;
        let result = self.client.request(Method::POST, url).send().await;

        // The local session goes away regardless of what the remote said.
        self.clear();

        match result {
            Ok(response) => {
                PlatformClient::check(response).await?;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn send_password_reset(&self, email: &Email) -> Result<(), PlatformError> {
        let url = self.client.auth_url("recover")?;
        let body = serde_json::json!({ "email": email });
        let response = self
            .client
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await?;
        PlatformClient::check(response).await?;
        Ok(())
    }

    async fn verify_code(&self, email: &Email, code: &str) -> Result<bool, PlatformError> {
        let url = self.client.auth_url("verify")?;
        let body = serde_json::json!({ "email": email, "token": code, "type": "totp" });
        let response = self
            .client
            .request(Method::POST, url)
            .json(&body)
            .send()
            .await?;

        match PlatformClient::check(response).await {
            Ok(_) => Ok(true),
            Err(PlatformError::Unauthorized(_)) => Ok(false),
            Err(PlatformError::Service { status: 400, .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn subscribe(&self) -> AuthEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().listeners.push(tx);
        rx
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Lifetime in seconds; fallback when the token carries no `exp` claim.
    expires_in: i64,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: UserId,
    email: Email,
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = jwt_expiry(&self.access_token)
            .unwrap_or_else(|| Utc::now() + Duration::seconds(self.expires_in));
        AuthSession {
            user_id: self.user.id,
            email: self.user.email,
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
        }
    }
}

/// Expiry from the token's `exp` claim, when the token is a readable JWT.
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    struct Claims {
        exp: i64,
    }

    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}
