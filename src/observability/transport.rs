//! Request Logging
//!
//! Transport wrapper emitting one structured event per outbound request.

use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::core::{HttpRequest, HttpResponse, HttpTransport};
use crate::error::AuthClientError;

/// Logs method, URL, status and latency around an inner transport.
///
/// Headers and bodies are never logged; they carry credentials.
pub struct LoggingTransport<T: HttpTransport> {
    inner: T,
}

impl<T: HttpTransport> LoggingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

/// URL without its query string.
fn loggable_url(url: &str) -> &str {
    url.split_once('?').map(|(path, _)| path).unwrap_or(url)
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for LoggingTransport<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthClientError> {
        let method = request.method;
        let url = loggable_url(&request.url).to_string();
        let authenticated = request.header(crate::core::AUTHORIZATION).is_some();

        debug!(
            method = %method,
            url = %url,
            authenticated = authenticated,
            "Sending request"
        );

        let start = Instant::now();
        let result = self.inner.send(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(response) if response.is_success() => {
                info!(
                    method = %method,
                    url = %url,
                    status = response.status,
                    duration_ms = duration_ms,
                    "Request completed"
                );
            }
            Ok(response) => {
                warn!(
                    method = %method,
                    url = %url,
                    status = response.status,
                    duration_ms = duration_ms,
                    "Request returned error status"
                );
            }
            Err(error) => {
                warn!(
                    method = %method,
                    url = %url,
                    error = %error,
                    error_code = error.error_code(),
                    duration_ms = duration_ms,
                    "Request failed"
                );
            }
        }

        result
    }
}
