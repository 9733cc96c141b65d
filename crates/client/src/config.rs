//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CARTSYNC_API_URL` - Base URL of the cart service (e.g. `https://shop.example.com/api/`)
//!
//! ## Optional
//! - `CARTSYNC_SESSION_COOKIE` - Session cookie sent with every request (e.g. `sid=...`)
//! - `CARTSYNC_USER_ID` - ID of the signed-in user; absent means guest
//! - `CARTSYNC_USER_EMAIL` - Email of the signed-in user
//! - `CARTSYNC_STORE_PATH` - Guest cart file (default: `.cartsync/guest_cart.json`)
//! - `CARTSYNC_TIMEOUT_SECS` - Request timeout in seconds (default: 30)
//! - `CARTSYNC_LOG_JSON` - Emit JSON logs when set to `1` or `true`
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::path::PathBuf;
use std::time::Duration;

use cartsync_core::UserId;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

use crate::auth::User;

const DEFAULT_STORE_PATH: &str = ".cartsync/guest_cart.json";
const DEFAULT_TIMEOUT_SECS: &str = "30";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
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

/// cartsync client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Cart service connection settings
    pub api: CartApiConfig,
    /// Signed-in user, if any
    pub user: Option<User>,
    /// Where the guest cart is persisted
    pub store_path: PathBuf,
    /// Emit logs as JSON
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Cart service connection settings.
///
/// Implements `Debug` manually to redact the session cookie.
#[derive(Clone)]
pub struct CartApiConfig {
    /// Base URL all endpoint paths are appended to
    pub base_url: Url,
    /// Session cookie (`name=value`) attached to every request
    pub session_cookie: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for CartApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "[REDACTED]"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CartApiConfig {
    /// Settings for a base URL with no session and the default timeout.
    #[must_use]
    pub const fn new(base_url: Url) -> Self {
        Self {
            base_url,
            session_cookie: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid, or
    /// if the session cookie looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = CartApiConfig::from_env()?;
        let user = get_optional_env("CARTSYNC_USER_ID").map(|id| User {
            id: UserId::new(id),
            email: get_optional_env("CARTSYNC_USER_EMAIL"),
        });
        let store_path = PathBuf::from(get_env_or_default("CARTSYNC_STORE_PATH", DEFAULT_STORE_PATH));
        let log_json = get_optional_env("CARTSYNC_LOG_JSON")
            .is_some_and(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"));
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api,
            user,
            store_path,
            log_json,
            sentry_dsn,
        })
    }
}

impl CartApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url("CARTSYNC_API_URL", &get_required_env("CARTSYNC_API_URL")?)?;
        let session_cookie = get_optional_env("CARTSYNC_SESSION_COOKIE")
            .map(|cookie| validate_session_cookie(&cookie, "CARTSYNC_SESSION_COOKIE").map(|()| cookie))
            .transpose()?
            .map(SecretString::from);
        let timeout_secs = get_env_or_default("CARTSYNC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CARTSYNC_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            base_url,
            session_cookie,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Expose the session cookie for attaching to the HTTP client.
    pub(crate) fn session_cookie_str(&self) -> Option<&str> {
        self.session_cookie.as_ref().map(|cookie| cookie.expose_secret())
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable, treating blank values as absent.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse the service base URL. Only `http` and `https` are accepted.
fn parse_base_url(var_name: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "must be a base URL".to_string(),
        ));
    }

    Ok(url)
}

/// Validate that a session cookie is `name=value` and not a placeholder.
fn validate_session_cookie(cookie: &str, var_name: &str) -> Result<(), ConfigError> {
    let Some((name, value)) = cookie.split_once('=') else {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "expected name=value".to_string(),
        ));
    };
    if name.trim().is_empty() || value.trim().is_empty() {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            "cookie name and value must not be empty".to_string(),
        ));
    }

    let lower = value.to_lowercase();
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
