//! Token Refresher
//!
//! Exchanges a refresh token for a new access token at the refresh endpoint.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::sync::MutexExt;
use crate::core::{HttpMethod, HttpRequest, HttpTransport};
use crate::error::{parse_error_message, AuthClientError, RefreshError};
use crate::types::{AccessToken, ClientConfig, RefreshRequest, RefreshResponse, RefreshToken};

/// Token refresher interface.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Obtain a new access token.
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<AccessToken, RefreshError>;
}

/// Refresher calling `POST {base}/auth/refresh`.
///
/// The call goes straight to the transport: it carries no bearer token and
/// never passes through refresh coordination itself.
pub struct HttpTokenRefresher<T: HttpTransport> {
    transport: Arc<T>,
    endpoint: String,
    default_headers: Vec<(String, String)>,
    timeout: Duration,
}

impl<T: HttpTransport> HttpTokenRefresher<T> {
    pub fn new(transport: Arc<T>, config: &ClientConfig) -> Result<Self, AuthClientError> {
        Ok(Self {
            transport,
            endpoint: config.refresh_url()?,
            default_headers: config.default_headers.clone(),
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl<T: HttpTransport> TokenRefresher for HttpTokenRefresher<T> {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<AccessToken, RefreshError> {
        let body = serde_json::to_string(&RefreshRequest {
            refresh_token: refresh_token.secret(),
        })
        .map_err(|e| RefreshError::MalformedResponse {
            message: e.to_string(),
        })?;

        let mut request = HttpRequest::new(HttpMethod::Post, self.endpoint.clone())
            .with_body(body)
            .with_timeout(self.timeout);
        for (name, value) in &self.default_headers {
            request = request.with_header(name.clone(), value.clone());
        }

        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| RefreshError::Transport {
                message: e.to_string(),
            })?;

        if !response.is_success() {
            return Err(RefreshError::EndpointStatus {
                status: response.status,
                message: parse_error_message(&response.body),
            });
        }

        let parsed: RefreshResponse =
            serde_json::from_str(&response.body).map_err(|e| RefreshError::MalformedResponse {
                message: e.to_string(),
            })?;

        let value = parsed
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or(RefreshError::EmptyToken)?;

        let token = AccessToken::new(value);
        Ok(match parsed.expires_in {
            Some(seconds) => token.with_expires_in(seconds),
            None => token,
        })
    }
}

/// Mock token refresher for testing.
///
/// Results are handed out in the order they were queued; once the queue is
/// empty every call succeeds with `refreshed-access-token`.
#[derive(Default)]
pub struct MockTokenRefresher {
    results: Mutex<VecDeque<Result<AccessToken, RefreshError>>>,
    delay: Mutex<Option<Duration>>,
    refresh_history: Mutex<Vec<String>>,
    call_count: AtomicU32,
}

impl MockTokenRefresher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful refresh.
    pub fn push_token(&self, token: impl Into<String>) -> &Self {
        self.results
            .lock_or_recover()
            .push_back(Ok(AccessToken::new(token)));
        self
    }

    /// Queue a failed refresh.
    pub fn push_error(&self, error: RefreshError) -> &Self {
        self.results.lock_or_recover().push_back(Err(error));
        self
    }

    /// Wait before answering each call.
    pub fn set_delay(&self, delay: Duration) -> &Self {
        *self.delay.lock_or_recover() = Some(delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Refresh tokens received, in call order.
    pub fn get_refresh_history(&self) -> Vec<String> {
        self.refresh_history.lock_or_recover().clone()
    }
}

#[async_trait]
impl TokenRefresher for MockTokenRefresher {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<AccessToken, RefreshError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.refresh_history
            .lock_or_recover()
            .push(refresh_token.secret().to_string());

        let delay = *self.delay.lock_or_recover();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.results
            .lock_or_recover()
            .pop_front()
            .unwrap_or_else(|| Ok(AccessToken::new("refreshed-access-token")))
    }
}

/// Create mock token refresher for testing.
pub fn create_mock_refresher() -> MockTokenRefresher {
    MockTokenRefresher::new()
}
