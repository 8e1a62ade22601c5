//! Configuration Builder
//!
//! Fluent builder for the client configuration.

use std::time::Duration;
use url::Url;

use crate::error::{AuthClientError, ConfigurationError};
use crate::types::{
    ClientConfig, CookieOptions, ACCESS_TOKEN_COOKIE, DEFAULT_LOGIN_PATH,
    DEFAULT_MAX_RESPONSE_SIZE, DEFAULT_REFRESH_PATH, DEFAULT_SESSION_MAX_AGE, DEFAULT_TIMEOUT,
    REFRESH_TOKEN_COOKIE,
};

/// Client configuration builder.
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    timeout: Duration,
    refresh_path: String,
    login_path: String,
    access_token_cookie: String,
    refresh_token_cookie: String,
    cookie_options: CookieOptions,
    access_token_max_age: Duration,
    refresh_token_max_age: Duration,
    default_headers: Vec<(String, String)>,
    max_response_size: usize,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientConfigBuilder {
    /// Create new configuration builder.
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout: DEFAULT_TIMEOUT,
            refresh_path: DEFAULT_REFRESH_PATH.to_string(),
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            access_token_cookie: ACCESS_TOKEN_COOKIE.to_string(),
            refresh_token_cookie: REFRESH_TOKEN_COOKIE.to_string(),
            cookie_options: CookieOptions::default(),
            access_token_max_age: DEFAULT_SESSION_MAX_AGE,
            refresh_token_max_age: DEFAULT_SESSION_MAX_AGE,
            default_headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("accept".to_string(), "application/json".to_string()),
            ],
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    /// Set backend base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set refresh endpoint path.
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = path.into();
        self
    }

    /// Set login endpoint path.
    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    /// Set cookie names for the access and refresh tokens.
    pub fn cookie_names(mut self, access: impl Into<String>, refresh: impl Into<String>) -> Self {
        self.access_token_cookie = access.into();
        self.refresh_token_cookie = refresh.into();
        self
    }

    /// Set base cookie options.
    pub fn cookie_options(mut self, options: CookieOptions) -> Self {
        self.cookie_options = options;
        self
    }

    /// Mark cookies Secure.
    pub fn secure_cookies(mut self, secure: bool) -> Self {
        self.cookie_options.secure = secure;
        self
    }

    /// Set fallback access token cookie lifetime.
    pub fn access_token_max_age(mut self, max_age: Duration) -> Self {
        self.access_token_max_age = max_age;
        self
    }

    /// Set refresh token cookie lifetime.
    pub fn refresh_token_max_age(mut self, max_age: Duration) -> Self {
        self.refresh_token_max_age = max_age;
        self
    }

    /// Add a header sent with every request, replacing a default of the same name.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into().to_ascii_lowercase();
        self.default_headers.retain(|(existing, _)| *existing != name);
        self.default_headers.push((name, value.into()));
        self
    }

    /// Set maximum accepted response size.
    pub fn max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<ClientConfig, AuthClientError> {
        let raw_base_url = self.base_url.ok_or_else(|| {
            AuthClientError::Configuration(ConfigurationError::MissingRequired {
                field: "base_url".to_string(),
            })
        })?;

        let base_url = Url::parse(&raw_base_url).map_err(|_| {
            AuthClientError::Configuration(ConfigurationError::InvalidEndpoint {
                url: raw_base_url.clone(),
            })
        })?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(AuthClientError::Configuration(
                ConfigurationError::InvalidEndpoint { url: raw_base_url },
            ));
        }

        if self.timeout.is_zero() {
            return Err(invalid("timeout must be greater than zero"));
        }

        if self.refresh_path.trim().is_empty() {
            return Err(invalid("refresh_path must not be empty"));
        }

        if self.login_path.trim().is_empty() {
            return Err(invalid("login_path must not be empty"));
        }

        for name in [&self.access_token_cookie, &self.refresh_token_cookie] {
            if !is_valid_cookie_name(name) {
                return Err(invalid(&format!("invalid cookie name '{}'", name)));
            }
        }

        if self.access_token_cookie == self.refresh_token_cookie {
            return Err(invalid("access and refresh cookies must have different names"));
        }

        Ok(ClientConfig {
            base_url,
            timeout: self.timeout,
            refresh_path: self.refresh_path,
            login_path: self.login_path,
            access_token_cookie: self.access_token_cookie,
            refresh_token_cookie: self.refresh_token_cookie,
            cookie_options: self.cookie_options,
            access_token_max_age: self.access_token_max_age,
            refresh_token_max_age: self.refresh_token_max_age,
            default_headers: self.default_headers,
            max_response_size: self.max_response_size,
        })
    }
}

fn invalid(message: &str) -> AuthClientError {
    AuthClientError::Configuration(ConfigurationError::InvalidConfig {
        message: message.to_string(),
    })
}

/// Cookie names are RFC 6265 tokens.
pub(crate) fn is_valid_cookie_name(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
        })
}

/// Create a new client configuration builder.
pub fn auth_client_config() -> ClientConfigBuilder {
    ClientConfigBuilder::new()
}
