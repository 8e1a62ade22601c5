//! Cookie Types
//!
//! Options for persisted credentials and `Set-Cookie` rendering.

use std::time::Duration;

/// SameSite cookie attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// Options applied when a credential is persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CookieOptions {
    /// Hide the cookie from scripts.
    pub http_only: bool,
    /// SameSite attribute.
    pub same_site: SameSite,
    /// Cookie path.
    pub path: String,
    /// Lifetime. `None` makes a session cookie.
    pub max_age: Option<Duration>,
    /// Only send over HTTPS. Leave off while the site is served over plain HTTP,
    /// otherwise browsers drop the cookie.
    pub secure: bool,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            same_site: SameSite::Lax,
            path: "/".to_string(),
            max_age: None,
            secure: false,
        }
    }
}

impl CookieOptions {
    /// Set the lifetime.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Set the Secure attribute.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Render a `Set-Cookie` header value.
    pub fn set_cookie_header(&self, name: &str, value: &str) -> String {
        let mut parts = vec![format!("{}={}", name, value)];
        parts.push(format!("Path={}", self.path));
        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age.as_secs()));
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        parts.push(format!("SameSite={}", self.same_site.as_str()));
        if self.secure {
            parts.push("Secure".to_string());
        }
        parts.join("; ")
    }

    /// Render the `Set-Cookie` value that removes a cookie.
    pub fn removal_header(&self, name: &str) -> String {
        self.clone()
            .with_max_age(Duration::ZERO)
            .set_cookie_header(name, "")
    }
}
