//! `Set-Cookie` directives attached to a [`Response`](super::Response).

use std::fmt;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left untouched when escaping cookie keys and values: ASCII
/// alphanumerics, `_ . - ~` and `/`.
const COOKIE_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// A single `Set-Cookie` directive.
///
/// Deleting a cookie is the same directive with an empty value and
/// `Max-Age=0`; see [`SetCookie::removal`].
///
/// # Examples
///
/// ```
/// use plainhttp::http::SetCookie;
///
/// let cookie = SetCookie::new("user id", "a&b").path("/").max_age(3600);
/// assert_eq!(cookie.to_string(), "user%20id=a%26b; Path=/; Max-Age=3600");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    key: String,
    value: String,
    path: Option<String>,
    domain: Option<String>,
    max_age: Option<u64>,
}

impl SetCookie {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            path: None,
            domain: None,
            max_age: None,
        }
    }

    /// A directive that makes the client expire `key` immediately.
    pub fn removal(key: impl Into<String>) -> Self {
        Self::new(key, "").max_age(0)
    }

    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Lifetime in seconds.
    #[must_use]
    pub fn max_age(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Renders the header value (everything after `Set-Cookie: `).
impl fmt::Display for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}",
            utf8_percent_encode(&self.key, COOKIE_ESCAPE),
            utf8_percent_encode(&self.value, COOKIE_ESCAPE)
        )?;
        if let Some(path) = &self.path {
            write!(f, "; Path={path}")?;
        }
        if let Some(domain) = &self.domain {
            write!(f, "; Domain={domain}")?;
        }
        if let Some(max_age) = self.max_age {
            write!(f, "; Max-Age={max_age}")?;
        }
        Ok(())
    }
}
