//! Session Context
//!
//! Where the current tokens live depends on where the code runs. On the
//! server they arrive as cookies of the incoming request; in the client they
//! sit in memory, seeded from what the server rendered. [`SessionContext`]
//! hides the difference from the rest of the client.

use std::sync::Arc;
use std::time::Duration;

use crate::error::AuthClientError;
use crate::token::credentials::CredentialStore;
use crate::token::store::TokenStore;
use crate::types::{AccessToken, ClientConfig, CookieOptions, RefreshToken};

/// Execution environment of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    Server,
    Client,
}

/// Cookie names and lifetimes used when persisting tokens.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub access_cookie: String,
    pub refresh_cookie: String,
    pub cookie_options: CookieOptions,
    /// Used when the access token carries no expiry.
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            access_cookie: config.access_token_cookie.clone(),
            refresh_cookie: config.refresh_token_cookie.clone(),
            cookie_options: config.cookie_options.clone(),
            access_max_age: config.access_token_max_age,
            refresh_max_age: config.refresh_token_max_age,
        }
    }

    /// Cookie options for an access token: lives as long as the token does.
    fn access_options(&self, token: &AccessToken) -> CookieOptions {
        let max_age = token.remaining_lifetime().unwrap_or(self.access_max_age);
        self.cookie_options.clone().with_max_age(max_age)
    }

    fn refresh_options(&self) -> CookieOptions {
        self.cookie_options.clone().with_max_age(self.refresh_max_age)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_cookie: crate::types::ACCESS_TOKEN_COOKIE.to_string(),
            refresh_cookie: crate::types::REFRESH_TOKEN_COOKIE.to_string(),
            cookie_options: CookieOptions::default(),
            access_max_age: crate::types::DEFAULT_SESSION_MAX_AGE,
            refresh_max_age: crate::types::DEFAULT_SESSION_MAX_AGE,
        }
    }
}

/// Read/write access to the tokens of the current session.
pub trait SessionContext: Send + Sync {
    fn context(&self) -> ExecutionContext;

    /// Current access token, if any.
    fn access_token(&self) -> Option<AccessToken>;

    /// Refresh token from persisted storage, if any.
    fn refresh_token(&self) -> Option<RefreshToken>;

    /// Make `token` current: in memory first, then persisted.
    fn store_access_token(&self, token: &AccessToken) -> Result<(), AuthClientError>;

    fn store_refresh_token(&self, token: &RefreshToken) -> Result<(), AuthClientError>;

    /// Forget the in-memory token and delete both persisted credentials.
    fn clear(&self) -> Result<(), AuthClientError>;
}

fn read_refresh_token(credentials: &dyn CredentialStore, settings: &SessionSettings) -> Option<RefreshToken> {
    credentials
        .get(&settings.refresh_cookie)
        .filter(|value| !value.is_empty())
        .map(RefreshToken::new)
}

fn persist_access_token(
    store: &TokenStore,
    credentials: &dyn CredentialStore,
    settings: &SessionSettings,
    token: &AccessToken,
) -> Result<(), AuthClientError> {
    store.set(token.clone());
    credentials.set(
        &settings.access_cookie,
        token.secret(),
        &settings.access_options(token),
    )
}

fn clear_session(
    store: &TokenStore,
    credentials: &dyn CredentialStore,
    settings: &SessionSettings,
) -> Result<(), AuthClientError> {
    store.clear();
    let access = credentials.delete(&settings.access_cookie, &settings.cookie_options);
    let refresh = credentials.delete(&settings.refresh_cookie, &settings.cookie_options);
    access.and(refresh)
}

/// Session of one incoming server request.
pub struct ServerSession {
    credentials: Arc<dyn CredentialStore>,
    store: TokenStore,
    settings: SessionSettings,
}

impl ServerSession {
    pub fn new(credentials: Arc<dyn CredentialStore>, settings: SessionSettings) -> Self {
        Self {
            credentials,
            store: TokenStore::new(),
            settings,
        }
    }

    /// Token to hand to the client for hydration.
    pub fn dehydrate(&self) -> Option<AccessToken> {
        self.access_token()
    }
}

impl SessionContext for ServerSession {
    fn context(&self) -> ExecutionContext {
        ExecutionContext::Server
    }

    /// A token stored during this request wins over the incoming cookie.
    fn access_token(&self) -> Option<AccessToken> {
        self.store.get().or_else(|| {
            self.credentials
                .get(&self.settings.access_cookie)
                .filter(|value| !value.is_empty())
                .map(AccessToken::new)
        })
    }

    fn refresh_token(&self) -> Option<RefreshToken> {
        read_refresh_token(self.credentials.as_ref(), &self.settings)
    }

    fn store_access_token(&self, token: &AccessToken) -> Result<(), AuthClientError> {
        persist_access_token(&self.store, self.credentials.as_ref(), &self.settings, token)
    }

    fn store_refresh_token(&self, token: &RefreshToken) -> Result<(), AuthClientError> {
        self.credentials.set(
            &self.settings.refresh_cookie,
            token.secret(),
            &self.settings.refresh_options(),
        )
    }

    fn clear(&self) -> Result<(), AuthClientError> {
        clear_session(&self.store, self.credentials.as_ref(), &self.settings)
    }
}

/// Session held by the client for its whole lifetime.
pub struct ClientSession {
    store: Arc<TokenStore>,
    credentials: Arc<dyn CredentialStore>,
    settings: SessionSettings,
}

impl ClientSession {
    pub fn new(
        store: Arc<TokenStore>,
        credentials: Arc<dyn CredentialStore>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            credentials,
            settings,
        }
    }

    /// Seed the store with the token the server rendered with.
    ///
    /// A token already held wins; returns whether `token` was taken.
    pub fn hydrate(&self, token: Option<AccessToken>) -> bool {
        match token {
            Some(token) => {
                let hydrated = self.store.set_if_empty(token);
                if hydrated {
                    tracing::debug!("Client session hydrated from server token");
                }
                hydrated
            }
            None => false,
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }
}

impl SessionContext for ClientSession {
    fn context(&self) -> ExecutionContext {
        ExecutionContext::Client
    }

    fn access_token(&self) -> Option<AccessToken> {
        self.store.get()
    }

    fn refresh_token(&self) -> Option<RefreshToken> {
        read_refresh_token(self.credentials.as_ref(), &self.settings)
    }

    fn store_access_token(&self, token: &AccessToken) -> Result<(), AuthClientError> {
        persist_access_token(&self.store, self.credentials.as_ref(), &self.settings, token)
    }

    fn store_refresh_token(&self, token: &RefreshToken) -> Result<(), AuthClientError> {
        self.credentials.set(
            &self.settings.refresh_cookie,
            token.secret(),
            &self.settings.refresh_options(),
        )
    }

    fn clear(&self) -> Result<(), AuthClientError> {
        clear_session(&self.store, self.credentials.as_ref(), &self.settings)
    }
}
