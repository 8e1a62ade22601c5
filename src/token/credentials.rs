//! Credential Storage
//!
//! Named, persisted credentials. On the server this is the cookie jar of one
//! incoming request; in tests it is a plain map.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::builders::config::is_valid_cookie_name;
use crate::core::sync::MutexExt;
use crate::error::{AuthClientError, StorageError};
use crate::types::CookieOptions;

/// Persisted credential storage interface.
pub trait CredentialStore: Send + Sync {
    /// Read a credential by name.
    fn get(&self, name: &str) -> Option<String>;

    /// Persist a credential.
    fn set(&self, name: &str, value: &str, options: &CookieOptions) -> Result<(), AuthClientError>;

    /// Remove a credential. `options` must carry the path it was set with.
    fn delete(&self, name: &str, options: &CookieOptions) -> Result<(), AuthClientError>;
}

#[derive(Clone, Debug)]
struct StoredCredential {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredCredential {
    fn is_live(&self) -> bool {
        self.expires_at.map(|exp| exp > Utc::now()).unwrap_or(true)
    }
}

#[derive(Default)]
struct Jar {
    entries: HashMap<String, StoredCredential>,
    set_cookie: Vec<String>,
}

/// Cookie jar held in memory.
///
/// Built from the `Cookie` header of an incoming request, it records every
/// write as a `Set-Cookie` value for the response.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    jar: Mutex<Jar>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` request header (`name=value; other=value`).
    ///
    /// Malformed pairs are skipped.
    pub fn from_cookie_header(header: &str) -> Self {
        let entries = header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                let name = name.trim();
                if !is_valid_cookie_name(name) {
                    return None;
                }
                let value = value.trim().trim_matches('"');
                Some((
                    name.to_string(),
                    StoredCredential {
                        value: value.to_string(),
                        expires_at: None,
                    },
                ))
            })
            .collect();

        Self {
            jar: Mutex::new(Jar {
                entries,
                set_cookie: Vec::new(),
            }),
        }
    }

    /// `Set-Cookie` values produced by writes so far.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.jar.lock_or_recover().set_cookie.clone()
    }

    /// Drain the pending `Set-Cookie` values.
    pub fn take_set_cookie_headers(&self) -> Vec<String> {
        std::mem::take(&mut self.jar.lock_or_recover().set_cookie)
    }

    /// Render live credentials as a `Cookie` request header, sorted by name.
    pub fn cookie_header(&self) -> Option<String> {
        let jar = self.jar.lock_or_recover();
        let mut pairs: Vec<_> = jar
            .entries
            .iter()
            .filter(|(_, credential)| credential.is_live())
            .map(|(name, credential)| format!("{}={}", name, credential.value))
            .collect();
        if pairs.is_empty() {
            return None;
        }
        pairs.sort();
        Some(pairs.join("; "))
    }
}

fn validate(name: &str, value: &str) -> Result<(), AuthClientError> {
    if !is_valid_cookie_name(name) {
        return Err(AuthClientError::Storage(StorageError::InvalidCredentialName {
            name: name.to_string(),
        }));
    }
    if value
        .chars()
        .any(|c| c == ';' || c == ',' || c == '"' || c.is_whitespace() || c.is_control())
    {
        return Err(AuthClientError::Storage(StorageError::WriteFailed {
            message: format!("value of '{}' contains characters not allowed in a cookie", name),
        }));
    }
    Ok(())
}

impl CredentialStore for InMemoryCredentialStore {
    fn get(&self, name: &str) -> Option<String> {
        self.jar
            .lock_or_recover()
            .entries
            .get(name)
            .filter(|credential| credential.is_live())
            .map(|credential| credential.value.clone())
    }

    fn set(&self, name: &str, value: &str, options: &CookieOptions) -> Result<(), AuthClientError> {
        validate(name, value)?;

        let expires_at = options
            .max_age
            .and_then(|max_age| chrono::Duration::from_std(max_age).ok())
            .and_then(|max_age| Utc::now().checked_add_signed(max_age));

        let mut jar = self.jar.lock_or_recover();
        jar.entries.insert(
            name.to_string(),
            StoredCredential {
                value: value.to_string(),
                expires_at,
            },
        );
        jar.set_cookie.push(options.set_cookie_header(name, value));
        Ok(())
    }

    fn delete(&self, name: &str, options: &CookieOptions) -> Result<(), AuthClientError> {
        if !is_valid_cookie_name(name) {
            return Err(AuthClientError::Storage(StorageError::InvalidCredentialName {
                name: name.to_string(),
            }));
        }

        let mut jar = self.jar.lock_or_recover();
        jar.entries.remove(name);
        jar.set_cookie.push(options.removal_header(name));
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryCredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let jar = self.jar.lock_or_recover();
        let mut names: Vec<_> = jar.entries.keys().cloned().collect();
        names.sort();
        f.debug_struct("InMemoryCredentialStore")
            .field("names", &names)
            .field("pending_set_cookie", &jar.set_cookie.len())
            .finish()
    }
}
