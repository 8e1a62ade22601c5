//! Configuration Types
//!
//! Client configuration and the defaults shared with the builder.

use std::time::Duration;
use url::Url;

use crate::builders::ClientConfigBuilder;
use crate::error::{AuthClientError, ProtocolError};
use crate::types::CookieOptions;

/// Default request timeout. Keeps callers from hanging when the backend is unreachable.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_REFRESH_PATH: &str = "/auth/refresh";
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login";
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";
/// Seven days, the lifetime login gives both cookies.
pub const DEFAULT_SESSION_MAX_AGE: Duration = Duration::from_secs(60 * 60 * 24 * 7);
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

/// Environment variables read by [`ClientConfig::from_env`].
pub const ENV_BASE_URL: &str = "AUTH_CLIENT_BASE_URL";
pub const ENV_TIMEOUT: &str = "AUTH_CLIENT_TIMEOUT";
pub const ENV_REFRESH_PATH: &str = "AUTH_CLIENT_REFRESH_PATH";
pub const ENV_LOGIN_PATH: &str = "AUTH_CLIENT_LOGIN_PATH";
pub const ENV_COOKIE_SECURE: &str = "AUTH_CLIENT_COOKIE_SECURE";

/// Authenticated client configuration.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Backend base URL; request paths are joined onto it.
    pub base_url: Url,
    /// HTTP timeout.
    pub timeout: Duration,
    /// Token refresh endpoint path.
    pub refresh_path: String,
    /// Login endpoint path.
    pub login_path: String,
    /// Cookie holding the access token.
    pub access_token_cookie: String,
    /// Cookie holding the refresh token.
    pub refresh_token_cookie: String,
    /// Base options for both cookies.
    pub cookie_options: CookieOptions,
    /// Access token cookie lifetime when the token carries no expiry.
    pub access_token_max_age: Duration,
    /// Refresh token cookie lifetime.
    pub refresh_token_max_age: Duration,
    /// Headers sent with every request.
    pub default_headers: Vec<(String, String)>,
    /// Largest response body accepted.
    pub max_response_size: usize,
}

impl ClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Create a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AUTH_CLIENT_BASE_URL` (required): backend base URL
    /// - `AUTH_CLIENT_TIMEOUT` (optional): request timeout in seconds
    /// - `AUTH_CLIENT_REFRESH_PATH` (optional): refresh endpoint path
    /// - `AUTH_CLIENT_LOGIN_PATH` (optional): login endpoint path
    /// - `AUTH_CLIENT_COOKIE_SECURE` (optional): `true` to mark cookies Secure
    pub fn from_env() -> Result<Self, AuthClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create a configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ClientConfigBuilder::new();

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            builder = builder.base_url(base_url);
        }

        if let Some(timeout_str) = lookup(ENV_TIMEOUT) {
            if let Ok(timeout_secs) = timeout_str.trim().parse::<u64>() {
                builder = builder.timeout(Duration::from_secs(timeout_secs));
            }
        }

        if let Some(path) = lookup(ENV_REFRESH_PATH) {
            builder = builder.refresh_path(path);
        }

        if let Some(path) = lookup(ENV_LOGIN_PATH) {
            builder = builder.login_path(path);
        }

        if let Some(secure) = lookup(ENV_COOKIE_SECURE) {
            builder = builder.secure_cookies(matches!(secure.trim(), "true" | "1"));
        }

        builder.build()
    }

    /// Resolve a request path against the base URL.
    ///
    /// Absolute `http(s)` URLs pass through unchanged.
    pub fn resolve_url(&self, path: &str) -> Result<String, AuthClientError> {
        let candidate = if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.base_url.as_str().trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        };

        Url::parse(&candidate)
            .map(String::from)
            .map_err(|e| {
                AuthClientError::Protocol(ProtocolError::InvalidUrl {
                    url: candidate.clone(),
                    message: e.to_string(),
                })
            })
    }

    /// Full URL of the refresh endpoint.
    pub fn refresh_url(&self) -> Result<String, AuthClientError> {
        self.resolve_url(&self.refresh_path)
    }

    /// Full URL of the login endpoint.
    pub fn login_url(&self) -> Result<String, AuthClientError> {
        self.resolve_url(&self.login_path)
    }
}
