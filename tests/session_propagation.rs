//! Integration tests for token propagation between server and client sessions.

use std::sync::Arc;

use auth_client_integration::{
    auth_client_config, AuthenticatedClient, ClientConfig, ClientSession, CredentialStore,
    ExecutionContext, InMemoryCredentialStore, ServerSession, SessionContext, SessionSettings,
    TokenStore,
};
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> ClientConfig {
    auth_client_config()
        .base_url(server.uri())
        .build()
        .expect("valid config")
}

async fn mount_profile(server: &MockServer, token: &str) {
    Mock::given(method("GET"))
        .and(path("/profile"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Ana"})))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(401))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_server_refresh_is_visible_to_hydrated_client() {
    let server = MockServer::start().await;
    mount_profile(&server, "server-fresh").await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": "refresh-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "server-fresh"})))
        .expect(1)
        .mount(&server)
        .await;

    // Server render: cookies come from the incoming request.
    let server_jar = Arc::new(InMemoryCredentialStore::from_cookie_header(
        "accessToken=expired; refreshToken=refresh-1",
    ));
    let server_session = Arc::new(ServerSession::new(
        server_jar.clone(),
        SessionSettings::from_config(&config(&server)),
    ));
    assert_eq!(server_session.context(), ExecutionContext::Server);
    let server_client = AuthenticatedClient::new(config(&server), server_session.clone()).unwrap();

    let profile: Value = assert_ok!(server_client.get("/profile").await);
    assert_eq!(profile["name"], "Ana");

    let set_cookie = server_jar.take_set_cookie_headers();
    assert_eq!(set_cookie.len(), 1);
    assert!(set_cookie[0].starts_with("accessToken=server-fresh; Path=/;"));
    assert!(set_cookie[0].contains("HttpOnly"));
    assert!(set_cookie[0].contains("SameSite=Lax"));

    // Client start: seeded from what the server rendered with.
    let dehydrated = server_session.dehydrate();
    let browser_jar = Arc::new(InMemoryCredentialStore::from_cookie_header(
        &server_jar.cookie_header().unwrap(),
    ));
    let client_session = Arc::new(ClientSession::new(
        Arc::new(TokenStore::new()),
        browser_jar,
        SessionSettings::from_config(&config(&server)),
    ));
    assert!(client_session.hydrate(dehydrated));
    assert_eq!(client_session.access_token().unwrap().secret(), "server-fresh");

    let browser_client = AuthenticatedClient::new(config(&server), client_session).unwrap();
    let profile: Value = assert_ok!(browser_client.get("/profile").await);
    assert_eq!(profile["name"], "Ana");
    assert_eq!(browser_client.refresh_stats().attempts, 0);
}

#[tokio::test]
async fn test_server_login_then_logout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "ana@example.com", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": "login-access",
            "refreshToken": "login-refresh",
            "message": "Login successful"
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_profile(&server, "login-access").await;

    let jar = Arc::new(InMemoryCredentialStore::new());
    let session = Arc::new(ServerSession::new(
        jar.clone(),
        SessionSettings::from_config(&config(&server)),
    ));
    let client = AuthenticatedClient::new(config(&server), session.clone()).unwrap();

    let result = assert_ok!(client.login("ana@example.com", "secret").await);
    assert_eq!(result.message.as_deref(), Some("Login successful"));
    assert_eq!(jar.get("refreshToken").as_deref(), Some("login-refresh"));

    let profile: Value = assert_ok!(client.get("/profile").await);
    assert_eq!(profile["name"], "Ana");

    jar.take_set_cookie_headers();
    assert_ok!(client.logout());
    assert!(session.access_token().is_none());
    assert!(session.refresh_token().is_none());

    let removals = jar.take_set_cookie_headers();
    assert_eq!(removals.len(), 2);
    assert!(removals.iter().all(|h| h.contains("Max-Age=0")));

    // Without tokens the next call cannot recover.
    let error = assert_err!(client.get::<Value>("/profile").await);
    assert!(error.is_auth_failure());
}

#[tokio::test]
async fn test_login_failure_keeps_session_empty() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid credentials"})))
        .mount(&server)
        .await;

    let jar = Arc::new(InMemoryCredentialStore::new());
    let session = Arc::new(ServerSession::new(
        jar.clone(),
        SessionSettings::from_config(&config(&server)),
    ));
    let client = AuthenticatedClient::new(config(&server), session.clone()).unwrap();

    let error = assert_err!(client.login("ana@example.com", "nope").await);
    assert_eq!(error.status(), Some(401));
    assert!(session.access_token().is_none());
    assert!(jar.set_cookie_headers().is_empty());
}
