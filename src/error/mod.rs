//! Error Types
//!
//! Error hierarchy for the authenticated client and its token refresh cycle.
//!
//! Every error is `Clone` so that a single refresh failure can be handed to
//! each request that was waiting on it.

use std::time::Duration;
use thiserror::Error;

/// Root error type for the authenticated client.
#[derive(Error, Debug, Clone)]
pub enum AuthClientError {
    #[error("Unauthorized: {method} {url}")]
    Unauthorized { method: String, url: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(#[from] RefreshError),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthClientError {
    /// Get error code for telemetry.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "AUTH_UNAUTHORIZED",
            Self::RefreshFailed(_) => "AUTH_REFRESH_FAILED",
            Self::Http { .. } => "AUTH_HTTP",
            Self::Network(_) => "AUTH_NETWORK",
            Self::Protocol(_) => "AUTH_PROTOCOL",
            Self::Configuration(_) => "AUTH_CONFIG",
            Self::Storage(_) => "AUTH_STORAGE",
        }
    }

    /// Check if the error means the session is no longer authenticated.
    ///
    /// A failed refresh presents the same way as the 401 that triggered it,
    /// so callers can send the user back to the login page.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. } | Self::RefreshFailed(_))
    }

    /// HTTP status equivalent of this error, when one applies.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } | Self::RefreshFailed(_) => Some(401),
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure of a token refresh cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("refresh endpoint returned HTTP {status}")]
    EndpointStatus {
        status: u16,
        message: Option<String>,
    },

    #[error("refresh endpoint returned no access token")]
    EmptyToken,

    #[error("malformed refresh response: {message}")]
    MalformedResponse { message: String },

    #[error("refresh request failed: {message}")]
    Transport { message: String },

    #[error("refresh cycle abandoned before completion")]
    Abandoned,
}

/// Network/transport error.
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Protocol/response handling error.
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Invalid JSON: {message}")]
    InvalidJson { message: String },

    #[error("Response too large: {size} bytes")]
    ResponseTooLarge { size: usize },

    #[error("Invalid request URL {url}: {message}")]
    InvalidUrl { url: String, message: String },
}

/// Configuration error.
#[derive(Error, Debug, Clone)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Missing required field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid endpoint URL: {url}")]
    InvalidEndpoint { url: String },
}

/// Credential storage error.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Invalid credential name: {name}")]
    InvalidCredentialName { name: String },

    #[error("Write failed: {message}")]
    WriteFailed { message: String },
}

/// Result type for client operations.
pub type AuthClientResult<T> = Result<T, AuthClientError>;

/// Error body returned by the backend.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub message: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiErrorResponse {
    /// Flatten the message field, which is either a string or a list of strings.
    pub fn message(&self) -> Option<String> {
        match &self.message {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Array(items)) => {
                let parts: Vec<&str> = items.iter().filter_map(|v| v.as_str()).collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(", "))
                }
            }
            _ => self.error.clone(),
        }
    }
}

/// Extract a human readable message from an error body.
pub fn parse_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|response| response.message())
}

/// Create error from a non-success HTTP response.
pub fn create_error_from_response(status: u16, body: &str) -> AuthClientError {
    let message = parse_error_message(body).unwrap_or_else(|| format!("HTTP {}", status));
    AuthClientError::Http { status, message }
}

/// Get user-friendly error message.
pub fn get_user_message(error: &AuthClientError) -> String {
    match error {
        AuthClientError::Unauthorized { .. } | AuthClientError::RefreshFailed(_) => {
            "Your session has expired. Please sign in again.".to_string()
        }
        AuthClientError::Network(NetworkError::Timeout { .. }) => {
            "The request timed out. Please check your connection and try again.".to_string()
        }
        AuthClientError::Network(_) => {
            "The service could not be reached. Please try again later.".to_string()
        }
        AuthClientError::Http { message, .. } => message.clone(),
        _ => "Something went wrong. Please try again.".to_string(),
    }
}
