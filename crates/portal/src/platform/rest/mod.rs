//! REST implementations of the platform contracts.
//!
//! The platform exposes three HTTP surfaces under one base URL:
//!
//! - `auth/v1` - credential and session endpoints
//! - `rest/v1` - row-store endpoints (one path segment per collection, with
//!   `field=op.value` filter parameters)
//! - `realtime/v1` - server-sent-events change feed
//!
//! [`PlatformClient`] owns the shared `reqwest` client, the derived endpoint
//! URLs, and the current access token. [`RestAuth`] writes the token on
//! sign-in/out; the row store and realtime clients read it on every request.

mod auth;
mod realtime;
mod store;

pub use auth::RestAuth;
pub use realtime::RestRealtime;
pub use store::RestStore;

use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use url::Url;

use crate::config::PortalConfig;
use crate::platform::PlatformError;

/// Shared HTTP state for the REST platform clients.
///
/// Cheaply cloneable via `Arc`.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    inner: Arc<PlatformClientInner>,
}

#[derive(Debug)]
struct PlatformClientInner {
    http: reqwest::Client,
    auth_base: Url,
    rest_base: Url,
    realtime_base: Url,
    /// Bearer token of the active session, if any.
    token: Mutex<Option<String>>,
}

impl PlatformClient {
    /// Build a client from configuration.
    ///
    /// The publishable key goes into the default `apikey` header; per-session
    /// bearer tokens are attached per request.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(config: &PortalConfig) -> Result<Self, PlatformError> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(config.platform_key.expose_secret())
            .map_err(|e| PlatformError::Client(e.to_string()))?;
        api_key.set_sensitive(true);
        headers.insert("apikey", api_key);

        let http = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            inner: Arc::new(PlatformClientInner {
                http,
                auth_base: join_base(&config.platform_url, "auth/v1/")?,
                rest_base: join_base(&config.platform_url, "rest/v1/")?,
                realtime_base: join_base(&config.platform_url, "realtime/v1/")?,
                token: Mutex::new(None),
            }),
        })
    }

    /// Endpoint under the auth surface.
    fn auth_url(&self, path: &str) -> Result<Url, PlatformError> {
        join_base(&self.inner.auth_base, path)
    }

    /// Endpoint under the row-store surface.
    fn rest_url(&self, path: &str) -> Result<Url, PlatformError> {
        join_base(&self.inner.rest_base, path)
    }

    /// Endpoint under the realtime surface.
    fn realtime_url(&self, path: &str) -> Result<Url, PlatformError> {
        join_base(&self.inner.realtime_base, path)
    }

    /// Replace (or clear) the session bearer token.
    fn set_token(&self, token: Option<String>) {
        *self
            .inner
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Start a request with the bearer token attached when present.
    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.inner.http.request(method, url);
        let token = self
            .inner
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Translate an error response into a [`PlatformError`], passing
    /// successes through.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let code = status.as_u16();
        let text = response.text().await.unwrap_or_default();

        if let Ok(body) = serde_json::from_str::<ErrorBody>(&text)
            && let Some(body_code) = body.code
        {
            let message = body.message.unwrap_or_else(|| body_code.clone());
            return Err(PlatformError::from_code(&body_code, code, message));
        }

        Err(match code {
            404 => PlatformError::RowNotFound,
            401 | 403 => PlatformError::Unauthorized(text),
            _ => PlatformError::Service {
                status: code,
                message: text,
            },
        })
    }
}

/// Error body the platform attaches to rejections.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

/// Join a path onto a base URL, keeping the base's path prefix.
fn join_base(base: &Url, path: &str) -> Result<Url, PlatformError> {
    // Url::join drops the last path segment unless the base ends with '/'.
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    base.join(path)
        .map_err(|e| PlatformError::Client(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn join_base_keeps_prefixes() {
        let base = Url::parse("https://platform.example.com/tenant-a").unwrap();
        let joined = join_base(&base, "auth/v1/").unwrap();
        assert_eq!(joined.as_str(), "https://platform.example.com/tenant-a/auth/v1/");
    }

    #[test]
    fn error_body_parses_partial_payloads() {
        let body: ErrorBody = serde_json::from_str(r#"{"code":"row_not_found"}"#).unwrap();
        assert_eq!(body.code.as_deref(), Some("row_not_found"));
        assert!(body.message.is_none());
    }
}
