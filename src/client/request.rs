//! API Requests
//!
//! Caller-facing request description, resolved against the client
//! configuration before it is sent.

use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::core::{HttpMethod, HttpRequest};
use crate::error::{AuthClientError, ProtocolError};
use crate::types::ClientConfig;

/// Request to a backend path.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: HttpMethod,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<String>,
    timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// Append a query parameter when a value is present.
    pub fn query_opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    /// Repeat a query parameter once per value (`status=a&status=b`).
    pub fn query_all<V: ToString>(mut self, name: &str, values: impl IntoIterator<Item = V>) -> Self {
        for value in values {
            self.query.push((name.to_string(), value.to_string()));
        }
        self
    }

    /// Set a header for this request, overriding configured defaults.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, AuthClientError> {
        let body = serde_json::to_string(body).map_err(|e| {
            AuthClientError::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })?;
        self.body = Some(body);
        Ok(self)
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(crate) fn into_http_request(self, config: &ClientConfig) -> Result<HttpRequest, AuthClientError> {
        let mut url = config.resolve_url(&self.path)?;

        if !self.query.is_empty() {
            let mut parsed = Url::parse(&url).map_err(|e| {
                AuthClientError::Protocol(ProtocolError::InvalidUrl {
                    url: url.clone(),
                    message: e.to_string(),
                })
            })?;
            parsed.query_pairs_mut().extend_pairs(self.query.iter());
            url = parsed.into();
        }

        let mut request = HttpRequest::new(self.method, url)
            .with_timeout(self.timeout.unwrap_or(config.timeout));

        for (name, value) in config.default_headers.iter().chain(self.headers.iter()) {
            request = request.with_header(name.clone(), value.clone());
        }

        if let Some(body) = self.body {
            request = request.with_body(body);
        }

        Ok(request)
    }
}
