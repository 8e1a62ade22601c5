//! HTTP Transport
//!
//! HTTP client interface and implementations. Non-success statuses come back
//! as responses; only failures to complete the exchange are errors.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::sync::MutexExt;
use crate::error::{AuthClientError, ConfigurationError, NetworkError, ProtocolError};
use crate::types::{DEFAULT_MAX_RESPONSE_SIZE, DEFAULT_TIMEOUT};

/// Name of the header carrying the bearer token.
pub const AUTHORIZATION: &str = "authorization";

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL.
    pub url: String,
    /// Request headers, keyed by lowercase name.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<String>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Set a header, replacing any previous value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Look up a header by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Status text.
    pub status_text: String,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Create a response with the given status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Create a JSON response.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        let mut response = Self::new(status, body.to_string());
        response
            .headers
            .insert("content-type".to_string(), "application/json".to_string());
        response
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    /// Deserialize the body as JSON.
    pub fn parse_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, AuthClientError> {
        serde_json::from_str(&self.body).map_err(|e| {
            AuthClientError::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })
    }
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthClientError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthClientError> {
        (**self).send(request).await
    }
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
    max_response_size: usize,
}

impl ReqwestHttpTransport {
    /// Create new transport with default settings.
    pub fn new() -> Result<Self, AuthClientError> {
        Self::with_options(DEFAULT_TIMEOUT, DEFAULT_MAX_RESPONSE_SIZE)
    }

    /// Create transport with custom options.
    pub fn with_options(timeout: Duration, max_response_size: usize) -> Result<Self, AuthClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AuthClientError::Configuration(ConfigurationError::InvalidConfig {
                    message: format!("failed to create HTTP client: {}", e),
                })
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
            max_response_size,
        })
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

fn send_error(error: reqwest::Error, timeout: Duration) -> AuthClientError {
    if error.is_timeout() {
        NetworkError::Timeout { timeout }.into()
    } else if error.is_connect() || error.is_request() {
        NetworkError::ConnectionFailed {
            message: error.to_string(),
        }
        .into()
    } else {
        ProtocolError::InvalidResponse {
            message: error.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthClientError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let builder = request.headers.iter().fold(
            self.client
                .request(request.method.into(), &request.url)
                .timeout(timeout),
            |builder, (name, value)| builder.header(name, value),
        );
        let builder = match request.body {
            Some(body) => builder.body(body),
            None => builder,
        };

        let response = builder.send().await.map_err(|e| send_error(e, timeout))?;

        let too_large = |size: usize| -> AuthClientError {
            ProtocolError::ResponseTooLarge { size }.into()
        };
        if let Some(declared) = response.content_length() {
            if declared as usize > self.max_response_size {
                return Err(too_large(declared as usize));
            }
        }

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let body = response.text().await.map_err(|e| send_error(e, timeout))?;
        if body.len() > self.max_response_size {
            return Err(too_large(body.len()));
        }

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}

type Responder = Arc<dyn Fn(&HttpRequest) -> Result<HttpResponse, AuthClientError> + Send + Sync>;

struct MockRoute {
    method: HttpMethod,
    path: String,
    delay: Option<Duration>,
    responder: Responder,
}

/// Mock HTTP transport for testing.
///
/// Routes are matched on method and URL path; the most recently added
/// matching route wins.
#[derive(Default)]
pub struct MockHttpTransport {
    routes: Mutex<Vec<MockRoute>>,
    request_history: Mutex<Vec<HttpRequest>>,
}

impl MockHttpTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests to `path` with a computed response.
    pub fn on<F>(&self, method: HttpMethod, path: &str, responder: F) -> &Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, AuthClientError> + Send + Sync + 'static,
    {
        self.add_route(method, path, None, Arc::new(responder))
    }

    /// Like [`MockHttpTransport::on`], but wait `delay` before answering.
    pub fn on_delayed<F>(&self, method: HttpMethod, path: &str, delay: Duration, responder: F) -> &Self
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, AuthClientError> + Send + Sync + 'static,
    {
        self.add_route(method, path, Some(delay), Arc::new(responder))
    }

    /// Answer requests to `path` with a fixed JSON response.
    pub fn respond_json(
        &self,
        method: HttpMethod,
        path: &str,
        status: u16,
        body: serde_json::Value,
    ) -> &Self {
        self.on(method, path, move |_| Ok(HttpResponse::json(status, &body)))
    }

    fn add_route(
        &self,
        method: HttpMethod,
        path: &str,
        delay: Option<Duration>,
        responder: Responder,
    ) -> &Self {
        self.routes.lock_or_recover().push(MockRoute {
            method,
            path: path.to_string(),
            delay,
            responder,
        });
        self
    }

    /// Get request history.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.request_history.lock_or_recover().clone()
    }

    /// Get the requests sent to `path`.
    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.request_history
            .lock_or_recover()
            .iter()
            .filter(|r| url_path(&r.url) == path)
            .cloned()
            .collect()
    }

    /// Get last request.
    pub fn get_last_request(&self) -> Option<HttpRequest> {
        self.request_history.lock_or_recover().last().cloned()
    }

    /// Clear request history.
    pub fn clear_history(&self) {
        self.request_history.lock_or_recover().clear();
    }
}

fn url_path(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthClientError> {
        self.request_history.lock_or_recover().push(request.clone());

        let path = url_path(&request.url);
        let route = self
            .routes
            .lock_or_recover()
            .iter()
            .rev()
            .find(|route| route.method == request.method && route.path == path)
            .map(|route| (route.delay, route.responder.clone()));

        let (delay, responder) = route.ok_or_else(|| {
            AuthClientError::Network(NetworkError::ConnectionFailed {
                message: format!("No mock route for {} {}", request.method, path),
            })
        })?;

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        responder(&request)
    }
}
