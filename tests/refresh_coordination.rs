//! Integration tests for token refresh coordination against a live HTTP server.

use std::sync::Arc;
use std::time::Duration;

use auth_client_integration::{
    auth_client_config, AccessToken, ApiRequest, AuthClientError, AuthenticatedClient,
    ClientSession, InMemoryCredentialStore, RefreshError, SessionContext, SessionSettings,
    TokenStore,
};
use futures::future::join_all;
use serde_json::{json, Value};
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REFRESH_TOKEN: &str = "refresh-1";
const FRESH_TOKEN: &str = "fresh-token";

struct Harness {
    server: MockServer,
    client: AuthenticatedClient,
    session: Arc<ClientSession>,
}

async fn harness() -> Harness {
    let server = MockServer::start().await;
    let config = auth_client_config()
        .base_url(server.uri())
        .timeout(Duration::from_secs(5))
        .build()
        .expect("valid config");

    let session = Arc::new(ClientSession::new(
        Arc::new(TokenStore::with_token(AccessToken::new("stale-token"))),
        Arc::new(InMemoryCredentialStore::from_cookie_header(&format!(
            "refreshToken={}",
            REFRESH_TOKEN
        ))),
        SessionSettings::from_config(&config),
    ));
    let client = AuthenticatedClient::new(config, session.clone()).expect("client");

    Harness {
        server,
        client,
        session,
    }
}

/// Any GET carrying the fresh token succeeds; everything else is 401.
async fn mount_protected_api(server: &MockServer) {
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer fresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .with_priority(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"message": "Unauthorized", "statusCode": 401})),
        )
        .mount(server)
        .await;
}

async fn mount_refresh(server: &MockServer, response: ResponseTemplate, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .and(body_json(json!({"refreshToken": REFRESH_TOKEN})))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let h = harness().await;
    mount_protected_api(&h.server).await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"accessToken": FRESH_TOKEN}))
            .set_delay(Duration::from_millis(300)),
        1,
    )
    .await;

    let results = join_all(
        ["/requests", "/companies", "/users"]
            .into_iter()
            .map(|route| h.client.get::<Value>(route)),
    )
    .await;

    for result in results {
        let body = assert_ok!(result);
        assert_eq!(body, json!({"ok": true}));
    }

    for route in ["/requests", "/companies", "/users"] {
        assert_eq!(requests_to(&h.server, route).await, 2, "{route} sent once and replayed once");
    }
    assert_eq!(h.session.access_token().unwrap().secret(), FRESH_TOKEN);

    let stats = h.client.refresh_stats();
    assert_eq!(stats.attempts, 1);
    assert_eq!(stats.successes, 1);
    assert_eq!(stats.queued, 2);
    assert!(!h.client.is_refreshing());
}

#[tokio::test]
async fn test_many_concurrent_401s_refresh_at_most_once() {
    let h = harness().await;
    mount_protected_api(&h.server).await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200)
            .set_body_json(json!({"accessToken": FRESH_TOKEN}))
            .set_delay(Duration::from_millis(300)),
        1,
    )
    .await;

    let routes: Vec<String> = (0..5).map(|i| format!("/requests/{i}")).collect();
    let results = join_all(routes.iter().map(|route| h.client.get::<Value>(route))).await;
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(requests_to(&h.server, "/auth/refresh").await, 1);
    assert_eq!(h.client.refresh_stats().queued, 4);
}

#[tokio::test]
async fn test_refresh_rejection_fails_every_waiter() {
    let h = harness().await;
    mount_protected_api(&h.server).await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(400)
            .set_body_json(json!({"message": "Invalid refresh token"}))
            .set_delay(Duration::from_millis(200)),
        2,
    )
    .await;

    let results = join_all(["/a", "/b"].into_iter().map(|route| h.client.get::<Value>(route))).await;
    for result in results {
        let error = assert_err!(result);
        assert!(error.is_auth_failure());
        assert_eq!(error.status(), Some(401));
        assert!(matches!(
            error,
            AuthClientError::RefreshFailed(RefreshError::EndpointStatus { status: 400, .. })
        ));
    }
    assert!(!h.client.is_refreshing());
    assert_eq!(h.session.access_token().unwrap().secret(), "stale-token");

    // A later request starts a new cycle of its own.
    let error = assert_err!(h.client.get::<Value>("/c").await);
    assert!(error.is_auth_failure());

    let stats = h.client.refresh_stats();
    assert_eq!(stats.attempts, 2);
    assert_eq!(stats.failures, 2);
    assert_eq!(stats.queued, 1);
}

#[tokio::test]
async fn test_replayed_request_is_not_retried_twice() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path("/admin/settings"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Forbidden area"})))
        .mount(&h.server)
        .await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200).set_body_json(json!({"accessToken": FRESH_TOKEN})),
        1,
    )
    .await;

    let error = assert_err!(h.client.send(ApiRequest::get("/admin/settings")).await);
    match error {
        AuthClientError::Unauthorized { method, url } => {
            assert_eq!(method, "GET");
            assert!(url.ends_with("/admin/settings"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(requests_to(&h.server, "/admin/settings").await, 2);

    let replay = h
        .server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == "/admin/settings")
        .last()
        .expect("replayed request");
    assert_eq!(
        replay.headers.get("authorization").and_then(|v| v.to_str().ok()),
        Some("Bearer fresh-token")
    );
}

#[tokio::test]
async fn test_missing_refresh_token_never_calls_endpoint() {
    let server = MockServer::start().await;
    mount_protected_api(&server).await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"accessToken": FRESH_TOKEN})),
        0,
    )
    .await;

    let config = auth_client_config().base_url(server.uri()).build().unwrap();
    let session = Arc::new(ClientSession::new(
        Arc::new(TokenStore::new()),
        Arc::new(InMemoryCredentialStore::new()),
        SessionSettings::from_config(&config),
    ));
    let client = AuthenticatedClient::new(config, session).unwrap();

    let error = assert_err!(client.get::<Value>("/me").await);
    assert!(matches!(
        error,
        AuthClientError::RefreshFailed(RefreshError::MissingRefreshToken)
    ));
}

#[tokio::test]
async fn test_refreshed_token_is_used_by_later_requests() {
    let h = harness().await;
    mount_protected_api(&h.server).await;
    mount_refresh(
        &h.server,
        ResponseTemplate::new(200).set_body_json(json!({"accessToken": FRESH_TOKEN, "expiresIn": 900})),
        1,
    )
    .await;

    assert_ok!(h.client.get::<Value>("/first").await);
    assert_ok!(h.client.get::<Value>("/second").await);

    assert_eq!(requests_to(&h.server, "/second").await, 1);
    let token = h.session.access_token().unwrap();
    assert!(token.remaining_lifetime().is_some());
}
