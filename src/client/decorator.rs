//! Request Decorator
//!
//! Attaches the bearer token of the current session to outgoing requests.

use std::sync::Arc;

use crate::core::{HttpRequest, AUTHORIZATION};
use crate::token::SessionContext;
use crate::types::AccessToken;

/// Adds `authorization: Bearer <token>` when the session holds a token.
#[derive(Clone)]
pub struct RequestDecorator {
    session: Arc<dyn SessionContext>,
}

impl RequestDecorator {
    pub fn new(session: Arc<dyn SessionContext>) -> Self {
        Self { session }
    }

    /// Decorate with the session's current token. Requests pass through
    /// untouched when there is none.
    pub fn decorate(&self, request: HttpRequest) -> HttpRequest {
        match self.session.access_token() {
            Some(token) => Self::decorate_with(request, &token),
            None => request,
        }
    }

    /// Decorate with an explicit token, replacing any existing header.
    pub fn decorate_with(request: HttpRequest, token: &AccessToken) -> HttpRequest {
        request.with_header(AUTHORIZATION, token.authorization_header())
    }
}
