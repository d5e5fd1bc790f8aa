//! Portal configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MERIDIAN_PLATFORM_URL` - Base URL of the backend platform
//! - `MERIDIAN_PLATFORM_KEY` - Publishable API key for the platform (sent as
//!   the `apikey` header on every request)
//!
//! ## Optional
//! - `MERIDIAN_INIT_TIMEOUT_SECS` - Session initialization deadline
//!   (default: 10)
//! - `MERIDIAN_NOTIFICATION_PAGE_SIZE` - Most-recent-N bound on the
//!   notification list (default: 50)

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Minimum plausible length of a platform API key.
const MIN_PLATFORM_KEY_LENGTH: usize = 20;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "insert",
    "todo",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Portal client configuration.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Base URL of the backend platform. Auth, row-store, and realtime
    /// endpoints are derived from it.
    pub platform_url: Url,
    /// Publishable platform API key.
    pub platform_key: SecretString,
    /// How long `initialize` waits for the platform before resolving
    /// anonymous.
    pub init_timeout: Duration,
    /// Most-recent-N bound applied to notification list loads.
    pub notification_page_size: u32,
}

impl PortalConfig {
    /// Load configuration, reading a local `.env` file first if present.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or fails
    /// validation.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or fails
    /// validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let platform_url = parse_platform_url(&get_required_env("MERIDIAN_PLATFORM_URL")?)?;
        let platform_key = get_validated_key("MERIDIAN_PLATFORM_KEY")?;
        let init_timeout = Duration::from_secs(parse_env_or_default(
            "MERIDIAN_INIT_TIMEOUT_SECS",
            10,
        )?);
        let notification_page_size =
            parse_env_or_default("MERIDIAN_NOTIFICATION_PAGE_SIZE", 50)?;

        Ok(Self {
            platform_url,
            platform_key,
            init_timeout,
            notification_page_size,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Parse an optional numeric environment variable with a default.
fn parse_env_or_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Parse and validate the platform base URL.
fn parse_platform_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| {
        ConfigError::InvalidEnvVar("MERIDIAN_PLATFORM_URL".to_string(), e.to_string())
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidEnvVar(
            "MERIDIAN_PLATFORM_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidEnvVar(
            "MERIDIAN_PLATFORM_URL".to_string(),
            "URL must have a host".to_string(),
        ));
    }

    Ok(url)
}

/// Validate that a key is not a placeholder and has a plausible length.
fn validate_key_strength(key: &str, var_name: &str) -> Result<(), ConfigError> {
    if key.len() < MIN_PLATFORM_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_PLATFORM_KEY_LENGTH,
                key.len()
            ),
        ));
    }

    let lower = key.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    Ok(())
}

/// Load and validate the platform key from environment.
fn get_validated_key(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_key_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platform_url_accepts_https() {
        let url = parse_platform_url("https://platform.example.com").unwrap();
        assert_eq!(url.host_str(), Some("platform.example.com"));
    }

    #[test]
    fn test_parse_platform_url_rejects_other_schemes() {
        let err = parse_platform_url("ftp://platform.example.com").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_parse_platform_url_rejects_garbage() {
        assert!(parse_platform_url("not a url").is_err());
    }

    #[test]
    fn test_validate_key_strength_rejects_short_keys() {
        let err = validate_key_strength("abc123", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_key_strength_rejects_placeholders() {
        let err =
            validate_key_strength("your-platform-key-goes-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_key_strength_accepts_real_looking_keys() {
        assert!(validate_key_strength("sb_pk_9f8a7b6c5d4e3f2a1b0c", "TEST_VAR").is_ok());
    }
}
