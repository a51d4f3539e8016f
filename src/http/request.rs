//! HTTP/1.1 request decoding on top of the [`httparse`] crate.
//!
//! [`Request::read_from`] pulls bytes off a connection until the header block
//! is complete, then keeps reading until the body holds `Content-Length`
//! bytes. Without a `Content-Length` header the body is whatever arrived
//! together with the header block; nothing further is awaited.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use super::query::{parse_cookies, parse_form, parse_query};
use super::{Headers, Method, Params};

/// Initial read buffer capacity per connection.
const READ_BUF_SIZE: usize = 8 * 1024;

/// Upper bound on the request line plus header block.
const MAX_HEAD_SIZE: usize = 64 * 1024;

/// Errors that can occur while decoding a request off a connection.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {reason}")]
    Malformed { reason: String },

    #[error("request head exceeds maximum allowed size of {max_bytes} bytes")]
    HeadTooLarge { max_bytes: usize },

    #[error("connection closed after {received} of {expected} body bytes")]
    BodyIncomplete { expected: usize, received: usize },
}

impl RequestError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// `true` for failures caused by the shape of the request itself, as
    /// opposed to the transport.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. } | Self::HeadTooLarge { .. })
    }
}

impl From<httparse::Error> for RequestError {
    fn from(err: httparse::Error) -> Self {
        Self::malformed(err.to_string())
    }
}

/// A decoded HTTP/1.1 request.
///
/// # Examples
///
/// ```
/// use plainhttp::http::Request;
///
/// let raw = b"GET /hello?name=world HTTP/1.1\r\nHost: localhost\r\nCookie: id=7\r\n\r\n";
/// let request = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/hello");
/// assert_eq!(request.query().and_then(|q| q.get("name")), Some("world"));
/// assert_eq!(request.cookies().and_then(|c| c.get("id")), Some("7"));
/// assert_eq!(request.headers().get("host"), Some("localhost"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    path: String,
    version: String,
    headers: Headers,
    content_length: Option<usize>,
    query: Option<Params>,
    cookies: Option<Params>,
    form: Option<Params>,
    multipart_boundary: Option<String>,
    body: Bytes,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Reads and decodes one request from `stream`.
    ///
    /// Returns `Ok(None)` when the peer closed the connection before sending
    /// a single byte. When `Content-Length` is declared this keeps reading
    /// until that many body bytes have arrived; a peer that never sends them
    /// keeps this future pending.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Malformed`] — the request line or a header line does
    ///   not parse, `Content-Length` is not a number, or the peer closed the
    ///   connection inside the header block.
    /// - [`RequestError::HeadTooLarge`] — no blank line within the size limit.
    /// - [`RequestError::BodyIncomplete`] — the peer closed the connection
    ///   before the declared body arrived.
    /// - [`RequestError::Io`] — reading from the stream failed.
    pub async fn read_from<S>(stream: &mut S) -> Result<Option<Self>, RequestError>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);

        let (mut request, head_len) = loop {
            if buf.capacity() == buf.len() {
                buf.reserve(READ_BUF_SIZE);
            }
            let bytes_read = stream.read_buf(&mut buf).await?;
            if bytes_read == 0 {
                if buf.is_empty() {
                    return Ok(None);
                }
                return Err(RequestError::malformed(
                    "connection closed before the header block ended",
                ));
            }

            if let Some(parsed) = Self::parse_head(&buf)? {
                break parsed;
            }
            if buf.len() > MAX_HEAD_SIZE {
                return Err(RequestError::HeadTooLarge {
                    max_bytes: MAX_HEAD_SIZE,
                });
            }
        };

        let mut body = buf.split_off(head_len);
        if let Some(expected) = request.content_length {
            // Grow with the bytes that actually arrive, never by the
            // declared length alone.
            while body.len() < expected {
                if body.capacity() == body.len() {
                    body.reserve((expected - body.len()).min(READ_BUF_SIZE));
                }
                let bytes_read = stream.read_buf(&mut body).await?;
                if bytes_read == 0 {
                    return Err(RequestError::BodyIncomplete {
                        expected,
                        received: body.len(),
                    });
                }
            }
            body.truncate(expected);
        }

        request.attach_body(body.freeze());
        Ok(Some(request))
    }

    /// Decodes a request that is already fully buffered in memory.
    ///
    /// The body is everything after the blank line, cut to `Content-Length`
    /// when that header is present.
    ///
    /// # Errors
    ///
    /// [`RequestError::Malformed`] if the head is invalid or incomplete.
    pub fn parse(raw: &[u8]) -> Result<Self, RequestError> {
        let (mut request, head_len) = Self::parse_head(raw)?
            .ok_or_else(|| RequestError::malformed("header block is incomplete"))?;

        let mut body = &raw[head_len..];
        if let Some(len) = request.content_length {
            body = &body[..len.min(body.len())];
        }
        request.attach_body(Bytes::copy_from_slice(body));
        Ok(request)
    }

    // Parses the request line and header block. `Ok(None)` means more bytes
    // are needed; on success returns the request and the body offset.
    fn parse_head(buf: &[u8]) -> Result<Option<(Self, usize)>, RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let head_len = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Ok(None),
        };

        let method = Method::from(
            raw_req
                .method
                .ok_or_else(|| RequestError::malformed("missing method"))?,
        );
        let target = raw_req
            .path
            .ok_or_else(|| RequestError::malformed("missing request target"))?;
        let version = raw_req
            .version
            .ok_or_else(|| RequestError::malformed("missing protocol version"))?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            let value = std::str::from_utf8(header.value).map_err(|_| {
                RequestError::malformed(format!("header {} is not valid UTF-8", header.name))
            })?;
            header_map.insert(header.name, value);
        }

        let content_length = header_map
            .get("content-length")
            .map(|v| {
                v.trim().parse::<usize>().map_err(|_| {
                    RequestError::malformed(format!("invalid Content-Length: {v:?}"))
                })
            })
            .transpose()?;

        // Only GET and HEAD have their query split off; other methods route
        // on the raw target.
        let (path, query) = match method {
            Method::Get | Method::Head => match target.rfind('?') {
                Some(pos) => (
                    target[..pos].to_owned(),
                    Some(parse_query(&target[pos + 1..])),
                ),
                None => (target.to_owned(), None),
            },
            _ => (target.to_owned(), None),
        };

        let cookies = header_map.get("cookie").map(parse_cookies);

        Ok(Some((
            Self {
                method,
                target: target.to_owned(),
                path,
                version: format!("HTTP/1.{version}"),
                headers: header_map,
                content_length,
                query,
                cookies,
                form: None,
                multipart_boundary: None,
                body: Bytes::new(),
            },
            head_len,
        )))
    }

    fn attach_body(&mut self, body: Bytes) {
        self.body = body;
        if self.method != Method::Post {
            return;
        }

        let Some(content_type) = self.headers.get("content-type") else {
            return;
        };
        let mut parts = content_type.split(';').map(str::trim);
        let media_type = parts.next().unwrap_or_default();

        if media_type.eq_ignore_ascii_case("application/x-www-form-urlencoded") {
            self.form = Some(parse_form(&self.body));
        } else if media_type.eq_ignore_ascii_case("multipart/form-data") {
            // Recognized, but the parts are not decoded.
            self.multipart_boundary = parts
                .find_map(|p| p.strip_prefix("boundary="))
                .map(|b| b.trim_matches('"').to_owned());
            debug!(
                boundary = ?self.multipart_boundary,
                bytes = self.body.len(),
                "multipart body left undecoded"
            );
        }
    }

    /// Returns the HTTP method as sent by the client.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the raw request target, query string included.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the path used for routing. For `GET` and `HEAD` this is the
    /// target up to its last `?`; for other methods it is the raw target.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the protocol version token, e.g. `"HTTP/1.1"`.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the header block as `Name: value` lines, in arrival order.
    pub fn header_lines(&self) -> Vec<String> {
        self.headers.lines()
    }

    /// Returns the parsed `Content-Length`, if declared.
    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    /// Query parameters; `None` unless this is a `GET`/`HEAD` with a `?`.
    pub fn query(&self) -> Option<&Params> {
        self.query.as_ref()
    }

    /// Cookies; `None` when no `Cookie` header was sent.
    pub fn cookies(&self) -> Option<&Params> {
        self.cookies.as_ref()
    }

    /// Url-encoded form fields of a `POST` body; `None` for any other body.
    pub fn form(&self) -> Option<&Params> {
        self.form.as_ref()
    }

    /// The boundary of a `multipart/form-data` `POST` body, whose parts are
    /// left undecoded.
    pub fn multipart_boundary(&self) -> Option<&str> {
        self.multipart_boundary.as_deref()
    }

    /// Returns the request body bytes.
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}
