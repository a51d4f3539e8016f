//! Per-invocation handler arguments.
//!
//! A [`Context`] carries only the request fields its route asked for at
//! registration time. Every field a route did not request is `None`, so a
//! handler can tell "not requested" apart from "requested but empty".

use bytes::Bytes;

use crate::http::{Params, Request};
use crate::router::Requirements;

/// The argument object handed to a [`ContextHandler`](crate::router::ContextHandler).
///
/// # Examples
///
/// ```
/// use plainhttp::context::Context;
/// use plainhttp::http::Request;
/// use plainhttp::router::Requirements;
///
/// let raw = b"HEAD /?q=1 HTTP/1.1\r\n\r\n";
/// let request = Request::parse(raw).unwrap();
/// let ctx = Context::build(&request, &Requirements::new().get_params().method());
///
/// assert_eq!(ctx.method(), Some("GET"));
/// assert_eq!(ctx.get_params().and_then(|q| q.get("q")), Some("1"));
/// assert!(ctx.cookies().is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    cookie: Option<Params>,
    get_parameter: Option<Params>,
    post_parameter: Option<Params>,
    header: Option<Vec<String>>,
    body: Option<Bytes>,
    method: Option<String>,
}

impl Context {
    /// Builds the arguments `requirements` asks for out of `request`.
    ///
    /// Requested mappings the request does not carry are supplied empty.
    /// The exposed method is the routing method, so a `HEAD` request reads
    /// as `"GET"`.
    pub fn build(request: &Request, requirements: &Requirements) -> Self {
        let mapping = |wanted: bool, source: Option<&Params>| {
            wanted.then(|| source.cloned().unwrap_or_default())
        };

        Self {
            cookie: mapping(requirements.cookie, request.cookies()),
            get_parameter: mapping(requirements.get_params, request.query()),
            post_parameter: mapping(requirements.post_params, request.form()),
            header: requirements.headers.then(|| request.header_lines()),
            body: requirements.body.then(|| request.body().clone()),
            method: requirements
                .method
                .then(|| request.method().routing_method().to_string()),
        }
    }

    /// Cookie mapping, if requested.
    pub fn cookies(&self) -> Option<&Params> {
        self.cookie.as_ref()
    }

    /// Query-parameter mapping, if requested.
    pub fn get_params(&self) -> Option<&Params> {
        self.get_parameter.as_ref()
    }

    /// Url-encoded form fields of a `POST`, if requested.
    pub fn post_params(&self) -> Option<&Params> {
        self.post_parameter.as_ref()
    }

    /// Raw `Name: value` header lines, if requested.
    pub fn header_lines(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Raw body bytes, if requested.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// The request method, `"GET"` for a `HEAD` request, if requested.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Deserializes the body as JSON.
    ///
    /// An unrequested body deserializes as empty input and therefore fails.
    pub fn json<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = self.body.as_deref().unwrap_or_default();
        serde_json::from_slice(body)
    }
}
