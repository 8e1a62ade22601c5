//! Token Store
//!
//! In-memory holder of the current access token.

use std::sync::RwLock;

use crate::core::sync::RwLockExt;
use crate::types::AccessToken;

/// Current access token of one session.
///
/// Writes are visible to every subsequent read.
#[derive(Default)]
pub struct TokenStore {
    current: RwLock<Option<AccessToken>>,
}

impl TokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `token`.
    pub fn with_token(token: AccessToken) -> Self {
        Self {
            current: RwLock::new(Some(token)),
        }
    }

    pub fn get(&self) -> Option<AccessToken> {
        self.current.read_or_recover().clone()
    }

    /// Replace the current token.
    pub fn set(&self, token: AccessToken) {
        *self.current.write_or_recover() = Some(token);
    }

    /// Set the token only when none is held. Returns whether it was set.
    pub fn set_if_empty(&self, token: AccessToken) -> bool {
        let mut current = self.current.write_or_recover();
        if current.is_some() {
            return false;
        }
        *current = Some(token);
        true
    }

    pub fn clear(&self) {
        *self.current.write_or_recover() = None;
    }

    pub fn is_empty(&self) -> bool {
        self.current.read_or_recover().is_none()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("has_token", &!self.is_empty())
            .finish()
    }
}
