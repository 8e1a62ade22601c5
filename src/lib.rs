//! Authenticated HTTP Client
//!
//! HTTP client for a token-authenticated backend, usable both while
//! rendering on the server and in the long-lived client.
//!
//! # Features
//!
//! - Bearer token attached to every request from the current session
//! - Transparent recovery from an expired access token: at most one refresh
//!   call in flight, concurrent 401s wait for it and replay once
//! - Server and client sessions behind one [`SessionContext`] interface,
//!   with cookie persistence and hydration of the client from the server
//! - Login and logout
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use auth_client_integration::{
//!     auth_client_config, AuthenticatedClient, InMemoryCredentialStore, ServerSession,
//!     SessionSettings,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = auth_client_config()
//!         .base_url("https://api.example.com")
//!         .build()?;
//!
//!     // Cookies of the incoming request.
//!     let jar = Arc::new(InMemoryCredentialStore::from_cookie_header(
//!         "accessToken=...; refreshToken=...",
//!     ));
//!     let session = Arc::new(ServerSession::new(jar.clone(), SessionSettings::from_config(&config)));
//!     let client = AuthenticatedClient::new(config, session.clone())?;
//!
//!     let me: serde_json::Value = client.get("/auth/me").await?;
//!     println!("{me}");
//!
//!     // Cookies to send back, and the token to hydrate the client with.
//!     let set_cookie = jar.take_set_cookie_headers();
//!     let hydration = session.dehydrate();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `types`: tokens, cookies, configuration
//! - `error`: error hierarchy
//! - `core`: HTTP transport
//! - `token`: token store, credential storage, session contexts
//! - `refresh`: refresh endpoint client and refresh coordination
//! - `client`: the authenticated client
//! - `builders`: configuration builder
//! - `observability`: logging

pub mod builders;
pub mod client;
pub mod core;
pub mod error;
pub mod observability;
pub mod refresh;
pub mod token;
pub mod types;

// Re-export main client
pub use client::{authenticated_client, ApiRequest, AuthenticatedClient, RequestDecorator};

// Re-export builders
pub use builders::{auth_client_config, ClientConfigBuilder};

// Re-export errors
pub use error::{
    create_error_from_response, get_user_message, parse_error_message, ApiErrorResponse,
    AuthClientError, AuthClientResult, ConfigurationError, NetworkError, ProtocolError,
    RefreshError, StorageError,
};

// Re-export types
pub use types::{
    AccessToken, ClientConfig, CookieOptions, LoginResult, RefreshToken, SameSite,
};

// Re-export core components
pub use crate::core::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MockHttpTransport, ReqwestHttpTransport,
};

// Re-export token management
pub use token::{
    ClientSession, CredentialStore, ExecutionContext, InMemoryCredentialStore, ServerSession,
    SessionContext, SessionSettings, TokenStore,
};

// Re-export refresh coordination
pub use refresh::{
    HttpTokenRefresher, MockTokenRefresher, RefreshCoordinator, RefreshStats, TokenRefresher,
};

// Re-export observability
pub use observability::{LogFormat, LogLevel, LoggingConfig, LoggingTransport};
