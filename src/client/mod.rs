//! Authenticated Client
//!
//! HTTP client that decorates every request with the session's bearer token
//! and recovers from an expired token by refreshing it once and replaying
//! the request.

pub mod decorator;
pub mod request;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestHttpTransport};
use crate::error::{create_error_from_response, AuthClientError, ProtocolError};
use crate::observability::LoggingTransport;
use crate::refresh::{HttpTokenRefresher, RefreshCoordinator, RefreshStats, TokenRefresher};
use crate::token::SessionContext;
use crate::types::{
    AccessToken, ClientConfig, LoginRequest, LoginResponse, LoginResult, RefreshToken,
};

pub use decorator::RequestDecorator;
pub use request::ApiRequest;

/// Client for the authenticated backend.
///
/// One instance serves one session: on the server, one incoming request;
/// in the client, the whole application lifetime.
pub struct AuthenticatedClient<T: HttpTransport = LoggingTransport<ReqwestHttpTransport>> {
    config: ClientConfig,
    transport: Arc<T>,
    session: Arc<dyn SessionContext>,
    decorator: RequestDecorator,
    coordinator: RefreshCoordinator,
}

impl AuthenticatedClient {
    /// Create a client over the default reqwest transport.
    pub fn new(config: ClientConfig, session: Arc<dyn SessionContext>) -> Result<Self, AuthClientError> {
        let transport = ReqwestHttpTransport::with_options(config.timeout, config.max_response_size)?;
        Self::with_transport(config, LoggingTransport::new(transport), session)
    }
}

impl<T: HttpTransport + 'static> AuthenticatedClient<T> {
    /// Create a client with a custom transport. Refreshes go through the
    /// same transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: T,
        session: Arc<dyn SessionContext>,
    ) -> Result<Self, AuthClientError> {
        let transport = Arc::new(transport);
        let refresher = Arc::new(HttpTokenRefresher::new(transport.clone(), &config)?);
        Ok(Self::with_components(config, transport, session, refresher))
    }

    /// Create a client with custom components.
    pub fn with_components(
        config: ClientConfig,
        transport: Arc<T>,
        session: Arc<dyn SessionContext>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            decorator: RequestDecorator::new(session.clone()),
            coordinator: RefreshCoordinator::new(refresher, session.clone()),
            config,
            transport,
            session,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<dyn SessionContext> {
        &self.session
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// Whether a token refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.coordinator.is_refreshing()
    }

    pub fn refresh_stats(&self) -> RefreshStats {
        self.coordinator.get_stats()
    }

    /// Send a request built against this client's configuration.
    pub async fn send(&self, request: ApiRequest) -> Result<HttpResponse, AuthClientError> {
        let request = request.into_http_request(&self.config)?;
        self.execute(request).await
    }

    /// Send a request and deserialize its JSON response.
    pub async fn request<R: DeserializeOwned>(&self, request: ApiRequest) -> Result<R, AuthClientError> {
        self.send(request).await?.parse_json()
    }

    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, AuthClientError> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, AuthClientError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.request(ApiRequest::post(path).json(body)?).await
    }

    pub async fn patch<B, R>(&self, path: &str, body: &B) -> Result<R, AuthClientError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        self.request(ApiRequest::patch(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<HttpResponse, AuthClientError> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Send a fully-formed request.
    ///
    /// A 401 hands the request to the refresh coordinator and replays it
    /// once with the new token. A 401 on the replay is final.
    pub async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, AuthClientError> {
        let request = self.decorator.decorate(request);
        let response = self.transport.send(request.clone()).await?;
        if !response.is_unauthorized() {
            return into_result(&request, response);
        }

        debug!(method = %request.method, url = %request.url, "Received 401, awaiting token refresh");
        let replay = self.coordinator.on_unauthorized(request).await?;

        let response = self.transport.send(replay.clone()).await?;
        if response.is_unauthorized() {
            debug!(method = %replay.method, url = %replay.url, "Replayed request rejected again");
        }
        into_result(&replay, response)
    }

    /// Exchange credentials for a token pair and store it in the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResult, AuthClientError> {
        let body = serde_json::to_string(&LoginRequest { email, password }).map_err(|e| {
            AuthClientError::Protocol(ProtocolError::InvalidJson {
                message: e.to_string(),
            })
        })?;

        let mut request = HttpRequest::new(HttpMethod::Post, self.config.login_url()?)
            .with_body(body)
            .with_timeout(self.config.timeout);
        for (name, value) in &self.config.default_headers {
            request = request.with_header(name.clone(), value.clone());
        }

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(create_error_from_response(response.status, &response.body));
        }

        let tokens: LoginResponse = response.parse_json()?;
        let access_token = AccessToken::new(tokens.access_token);
        self.session.store_refresh_token(&RefreshToken::new(tokens.refresh_token))?;
        self.session.store_access_token(&access_token)?;

        info!(context = ?self.session.context(), "Logged in");
        Ok(LoginResult {
            access_token,
            message: tokens.message,
        })
    }

    /// Forget the session's tokens. Nothing is sent to the backend.
    pub fn logout(&self) -> Result<(), AuthClientError> {
        self.session.clear()?;
        info!(context = ?self.session.context(), "Logged out");
        Ok(())
    }
}

fn into_result(request: &HttpRequest, response: HttpResponse) -> Result<HttpResponse, AuthClientError> {
    if response.is_success() {
        Ok(response)
    } else if response.is_unauthorized() {
        Err(AuthClientError::Unauthorized {
            method: request.method.to_string(),
            url: request.url.clone(),
        })
    } else {
        Err(create_error_from_response(response.status, &response.body))
    }
}

/// Create an authenticated client over the default transport.
pub fn authenticated_client(
    config: ClientConfig,
    session: Arc<dyn SessionContext>,
) -> Result<AuthenticatedClient, AuthClientError> {
    AuthenticatedClient::new(config, session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{MockHttpTransport, AUTHORIZATION};
    use crate::error::RefreshError;
    use crate::token::{
        ClientSession, CredentialStore, InMemoryCredentialStore, ServerSession, SessionSettings,
        TokenStore,
    };
    use serde_json::{json, Value};

    fn config() -> ClientConfig {
        ClientConfig::builder()
            .base_url("https://api.example.com")
            .build()
            .unwrap()
    }

    fn client_session(jar: Arc<InMemoryCredentialStore>, token: Option<&str>) -> Arc<ClientSession> {
        let store = match token {
            Some(token) => TokenStore::with_token(AccessToken::new(token)),
            None => TokenStore::new(),
        };
        Arc::new(ClientSession::new(Arc::new(store), jar, SessionSettings::default()))
    }

    fn client(
        transport: Arc<MockHttpTransport>,
        session: Arc<dyn SessionContext>,
    ) -> AuthenticatedClient<Arc<MockHttpTransport>> {
        AuthenticatedClient::with_transport(config(), transport, session).unwrap()
    }

    /// `/me` answers 200 only to `Bearer fresh`.
    fn me_route(transport: &MockHttpTransport) {
        transport.on(HttpMethod::Get, "/me", |request| {
            Ok(match request.header(AUTHORIZATION) {
                Some("Bearer fresh") => HttpResponse::json(200, &json!({"id": 1})),
                _ => HttpResponse::json(401, &json!({"message": "Unauthorized"})),
            })
        });
    }

    #[tokio::test]
    async fn test_request_carries_bearer_token() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.respond_json(HttpMethod::Get, "/companies", 200, json!([{"id": 1}]));
        let jar = Arc::new(InMemoryCredentialStore::new());
        let client = client(transport.clone(), client_session(jar, Some("abc123")));

        let companies: Value = client.get("/companies").await.unwrap();
        assert_eq!(companies[0]["id"], 1);

        let request = transport.get_last_request().unwrap();
        assert_eq!(request.header(AUTHORIZATION), Some("Bearer abc123"));
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_replayed() {
        let transport = Arc::new(MockHttpTransport::new());
        me_route(&transport);
        transport.respond_json(
            HttpMethod::Post,
            "/auth/refresh",
            200,
            json!({"accessToken": "fresh"}),
        );
        let jar = Arc::new(InMemoryCredentialStore::from_cookie_header("refreshToken=r-1"));
        let session = client_session(jar.clone(), Some("stale"));
        let client = client(transport.clone(), session.clone());

        let me: Value = client.get("/me").await.unwrap();
        assert_eq!(me["id"], 1);

        assert_eq!(transport.requests_to("/me").len(), 2);
        assert_eq!(transport.requests_to("/auth/refresh").len(), 1);
        assert_eq!(session.access_token().unwrap().secret(), "fresh");
        assert_eq!(jar.get("accessToken").as_deref(), Some("fresh"));
        assert_eq!(client.refresh_stats().successes, 1);
    }

    #[tokio::test]
    async fn test_server_keeps_refreshed_token_when_cookie_is_rejected() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.on(HttpMethod::Get, "/me", |request| {
            Ok(match request.header(AUTHORIZATION) {
                Some("Bearer fresh token") => HttpResponse::json(200, &json!({"id": 1})),
                _ => HttpResponse::json(401, &json!({"message": "Unauthorized"})),
            })
        });
        transport.respond_json(
            HttpMethod::Post,
            "/auth/refresh",
            200,
            json!({"accessToken": "fresh token"}),
        );
        let jar = Arc::new(InMemoryCredentialStore::from_cookie_header(
            "accessToken=stale; refreshToken=r-1",
        ));
        let session = Arc::new(ServerSession::new(jar, SessionSettings::default()));
        let client = client(transport.clone(), session.clone());

        let first: Value = client.get("/me").await.unwrap();
        let second: Value = client.get("/me").await.unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(second["id"], 1);

        assert_eq!(transport.requests_to("/me").len(), 3);
        assert_eq!(transport.requests_to("/auth/refresh").len(), 1);
        assert_eq!(session.dehydrate().unwrap().secret(), "fresh token");
    }

    #[tokio::test]
    async fn test_replayed_401_is_not_retried_again() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.respond_json(HttpMethod::Get, "/admin", 401, json!({"message": "Unauthorized"}));
        transport.respond_json(
            HttpMethod::Post,
            "/auth/refresh",
            200,
            json!({"accessToken": "fresh"}),
        );
        let jar = Arc::new(InMemoryCredentialStore::from_cookie_header("refreshToken=r-1"));
        let client = client(transport.clone(), client_session(jar, Some("stale")));

        let error = client.send(ApiRequest::get("/admin")).await.unwrap_err();
        assert!(matches!(error, AuthClientError::Unauthorized { .. }));
        assert!(error.is_auth_failure());
        assert_eq!(transport.requests_to("/admin").len(), 2);
        assert_eq!(transport.requests_to("/auth/refresh").len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_surfaces_as_auth_failure() {
        let transport = Arc::new(MockHttpTransport::new());
        me_route(&transport);
        transport.respond_json(
            HttpMethod::Post,
            "/auth/refresh",
            400,
            json!({"message": "Invalid refresh token"}),
        );
        let jar = Arc::new(InMemoryCredentialStore::from_cookie_header("refreshToken=r-1"));
        let session = client_session(jar, Some("stale"));
        let client = client(transport.clone(), session.clone());

        let error = client.send(ApiRequest::get("/me")).await.unwrap_err();
        assert!(error.is_auth_failure());
        assert!(matches!(
            error,
            AuthClientError::RefreshFailed(RefreshError::EndpointStatus { status: 400, .. })
        ));
        assert_eq!(transport.requests_to("/me").len(), 1);
        assert_eq!(session.access_token().unwrap().secret(), "stale");
        assert!(!client.is_refreshing());
    }

    #[tokio::test]
    async fn test_other_errors_bypass_refresh() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.respond_json(
            HttpMethod::Get,
            "/companies/9",
            404,
            json!({"message": "Company not found"}),
        );
        let jar = Arc::new(InMemoryCredentialStore::from_cookie_header("refreshToken=r-1"));
        let client = client(transport.clone(), client_session(jar, Some("abc")));

        let error = client.send(ApiRequest::get("/companies/9")).await.unwrap_err();
        match error {
            AuthClientError::Http { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Company not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let error = client.send(ApiRequest::get("/unrouted")).await.unwrap_err();
        assert!(matches!(error, AuthClientError::Network(_)));
        assert!(!client.is_refreshing());
        assert!(transport.requests_to("/auth/refresh").is_empty());
    }

    #[tokio::test]
    async fn test_login_stores_tokens_in_server_session() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.respond_json(
            HttpMethod::Post,
            "/auth/login",
            200,
            json!({"accessToken": "a-1", "refreshToken": "r-1", "message": "Login successful"}),
        );
        let jar = Arc::new(InMemoryCredentialStore::new());
        let session = Arc::new(ServerSession::new(jar.clone(), SessionSettings::default()));
        let client = client(transport.clone(), session.clone());

        let result = client.login("ana@example.com", "secret").await.unwrap();
        assert_eq!(result.access_token.secret(), "a-1");
        assert_eq!(result.message.as_deref(), Some("Login successful"));

        let request = transport.get_last_request().unwrap();
        let body: Value = serde_json::from_str(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"email": "ana@example.com", "password": "secret"}));
        assert_eq!(request.header(AUTHORIZATION), None);

        assert_eq!(session.dehydrate().unwrap().secret(), "a-1");
        assert_eq!(session.refresh_token().unwrap().secret(), "r-1");
        let headers = jar.set_cookie_headers();
        assert!(headers.contains(
            &"refreshToken=r-1; Path=/; Max-Age=604800; HttpOnly; SameSite=Lax".to_string()
        ));
        assert!(headers.contains(
            &"accessToken=a-1; Path=/; Max-Age=604800; HttpOnly; SameSite=Lax".to_string()
        ));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.respond_json(
            HttpMethod::Post,
            "/auth/login",
            401,
            json!({"message": "Invalid credentials"}),
        );
        let jar = Arc::new(InMemoryCredentialStore::new());
        let session = Arc::new(ServerSession::new(jar.clone(), SessionSettings::default()));
        let client = client(transport, session.clone());

        let error = client.login("ana@example.com", "wrong").await.unwrap_err();
        assert_eq!(error.status(), Some(401));
        assert_eq!(error.to_string(), "HTTP 401: Invalid credentials");
        assert!(session.access_token().is_none());
        assert!(jar.set_cookie_headers().is_empty());
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let transport = Arc::new(MockHttpTransport::new());
        let jar = Arc::new(InMemoryCredentialStore::from_cookie_header(
            "accessToken=a-1; refreshToken=r-1",
        ));
        let session = client_session(jar.clone(), Some("a-1"));
        let client = client(transport.clone(), session.clone());

        client.logout().unwrap();
        assert!(session.access_token().is_none());
        assert!(jar.get("accessToken").is_none());
        assert!(jar.get("refreshToken").is_none());
        assert!(transport.get_requests().is_empty());
    }
}
