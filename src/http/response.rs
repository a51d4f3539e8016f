//! HTTP/1.1 response builder and wire encoder.
//!
//! Every response is written with `Connection: close` and no
//! `Content-Length`: the end of the body is signalled by closing the
//! connection.

use std::borrow::Cow;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use bytes::{BufMut, BytesMut};
use serde::Serialize;

use super::{SetCookie, StatusCode};

/// Value of the `Server` header on every response.
pub const SERVER_NAME: &str = concat!("plainhttp/", env!("CARGO_PKG_VERSION"));

/// Body of the fixed page sent for unknown routes and malformed requests.
pub const NOT_FOUND_BODY: &str = "404 NOT FOUND";

/// Body of the fixed page sent when a handler faults.
pub const FAULT_BODY: &str = "500 error";

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use plainhttp::http::{Response, SetCookie, StatusCode};
///
/// let response = Response::new(StatusCode::Ok)
///     .text("hi")
///     .cookie(SetCookie::new("seen", "1").path("/"));
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Type: text/plain\r\n"));
/// assert!(text.contains("Set-Cookie: seen=1; Path=/\r\n"));
/// assert!(text.ends_with("\r\n\r\nhi"));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    status_text: Cow<'static, str>,
    content_type: Cow<'static, str>,
    content_disposition: Option<String>,
    cookies: Vec<SetCookie>,
    location: Option<String>,
    expires: Option<String>,
    body: Vec<u8>,
}

impl Response {
    /// Creates an empty `text/html` response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status: status.as_u16(),
            status_text: Cow::Borrowed(status.canonical_reason()),
            content_type: Cow::Borrowed("text/html"),
            content_disposition: None,
            cookies: Vec::new(),
            location: None,
            expires: None,
            body: Vec::new(),
        }
    }

    /// The fixed page for a route miss or a malformed request.
    pub fn not_found_page() -> Self {
        Self::new(StatusCode::NotFound)
            .status(404, "NOT FOUND")
            .body(NOT_FOUND_BODY)
            .expires_now()
    }

    /// The fixed page for a handler fault. `trace` is appended only when
    /// given, which the server does in debug mode.
    pub fn fault_page(trace: Option<&str>) -> Self {
        let body = match trace {
            Some(trace) => format!("{FAULT_BODY}\r\n\r\nlog:\r\n{trace}"),
            None => FAULT_BODY.to_owned(),
        };
        Self::new(StatusCode::InternalServerError)
            .status(500, "ERROR")
            .body(body)
            .expires_now()
    }

    /// Overrides the status code and its status text.
    #[must_use]
    pub fn status(mut self, code: u16, text: impl Into<Cow<'static, str>>) -> Self {
        self.status = code;
        self.status_text = text.into();
        self
    }

    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<Cow<'static, str>>) -> Self {
        self.content_type = content_type.into();
        self
    }

    #[must_use]
    pub fn content_disposition(mut self, disposition: impl Into<String>) -> Self {
        self.content_disposition = Some(disposition.into());
        self
    }

    /// Appends a `Set-Cookie` directive; directives are written in the order
    /// they were added.
    #[must_use]
    pub fn cookie(mut self, cookie: SetCookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Appends a directive expiring `key` on the client.
    #[must_use]
    pub fn delete_cookie(self, key: impl Into<String>, path: Option<&str>, domain: Option<&str>) -> Self {
        let mut cookie = SetCookie::removal(key);
        if let Some(path) = path {
            cookie = cookie.path(path);
        }
        if let Some(domain) = domain {
            cookie = cookie.domain(domain);
        }
        self.cookie(cookie)
    }

    /// Turns this into a `302 JUMP` redirect to `location`.
    #[must_use]
    pub fn redirect(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self.status(StatusCode::Found.as_u16(), "JUMP")
    }

    #[must_use]
    pub fn expires(mut self, when: SystemTime) -> Self {
        self.expires = Some(httpdate::fmt_http_date(when));
        self
    }

    fn expires_now(self) -> Self {
        self.expires(SystemTime::now())
    }

    /// Sets the raw body without touching the content type.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn text(self, text: impl Into<String>) -> Self {
        self.content_type("text/plain").body(text.into())
    }

    #[must_use]
    pub fn html(self, html: impl Into<String>) -> Self {
        self.content_type("text/html").body(html.into())
    }

    #[must_use]
    pub fn css(self, css: impl Into<String>) -> Self {
        self.content_type("text/css").body(css.into())
    }

    #[must_use]
    pub fn js(self, js: impl Into<String>) -> Self {
        self.content_type("application/x-javascript").body(js.into())
    }

    /// Sends `bytes` as a file download named `filename`.
    #[must_use]
    pub fn attachment(self, bytes: impl Into<Vec<u8>>, filename: &str) -> Self {
        self.content_type("application/octet-stream")
            .content_disposition(format!("attachment; filename={filename}"))
            .body(bytes)
    }

    /// Reads the file at `path` into a `200` response of `content_type`.
    ///
    /// A missing file yields the fixed `404` page.
    ///
    /// # Errors
    ///
    /// Any other I/O failure is returned, so a handler propagating it with
    /// `?` turns it into a fault.
    pub async fn static_file(
        path: impl AsRef<Path>,
        content_type: impl Into<Cow<'static, str>>,
    ) -> io::Result<Self> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Self::default().content_type(content_type).body(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::not_found_page()),
            Err(e) => Err(e),
        }
    }

    /// Serializes `value` as the body with `Content-Type: application/json`.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(self.content_type("application/json").body(body))
    }

    pub fn status_code(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn content_type_header(&self) -> &str {
        &self.content_type
    }

    pub fn location_header(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn set_cookies(&self) -> &[SetCookie] {
        &self.cookies
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the response into HTTP/1.1 wire format.
    ///
    /// Header order: `Server`, `Connection`, `Content-Type`, then `Expires`,
    /// `Content-Disposition`, each `Set-Cookie` and `Location` when present.
    /// The body follows the blank line verbatim. CR and LF are dropped from
    /// the status text and header values so a value cannot end its line.
    pub fn into_bytes(self) -> BytesMut {
        let estimated_size = 160 + self.cookies.len() * 64 + self.body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        // Status line
        buf.put(format!("HTTP/1.1 {} ", self.status).as_bytes());
        put_line_safe(&mut buf, &self.status_text);
        buf.put(&b"\r\n"[..]);

        put_header(&mut buf, "Server", SERVER_NAME);
        put_header(&mut buf, "Connection", "close");
        put_header(&mut buf, "Content-Type", &self.content_type);
        if let Some(expires) = &self.expires {
            put_header(&mut buf, "Expires", expires);
        }
        if let Some(disposition) = &self.content_disposition {
            put_header(&mut buf, "Content-Disposition", disposition);
        }
        for cookie in &self.cookies {
            put_header(&mut buf, "Set-Cookie", &cookie.to_string());
        }
        if let Some(location) = &self.location {
            put_header(&mut buf, "Location", location);
        }

        // Header/body separator
        buf.put(&b"\r\n"[..]);
        buf.put(self.body.as_slice());
        buf
    }
}

fn put_header(buf: &mut BytesMut, name: &str, value: &str) {
    buf.put(name.as_bytes());
    buf.put(&b": "[..]);
    put_line_safe(buf, value);
    buf.put(&b"\r\n"[..]);
}

fn put_line_safe(buf: &mut BytesMut, value: &str) {
    for part in value.split(['\r', '\n']) {
        buf.put(part.as_bytes());
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}

/// What a handler hands back: either a bare string or a full [`Response`].
#[derive(Debug, Clone)]
pub enum Reply {
    /// Shorthand for a `200 OK` `text/html` response with this body.
    Text(String),
    Structured(Response),
}

impl Reply {
    /// Resolves the reply into the single response that goes on the wire.
    ///
    /// The text shorthand also carries an `Expires` header set to now;
    /// a structured response passes through unchanged.
    pub fn into_response(self) -> Response {
        match self {
            Reply::Text(text) => Response::new(StatusCode::Ok).html(text).expires_now(),
            Reply::Structured(response) => response,
        }
    }

    /// Like [`into_response`](Self::into_response), but the text shorthand
    /// keeps the `404 NOT FOUND` status.
    pub(crate) fn into_not_found_response(self) -> Response {
        match self {
            Reply::Text(text) => Response::not_found_page().html(text),
            Reply::Structured(response) => response,
        }
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Reply::Text(text)
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_owned())
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Reply::Structured(response)
    }
}
