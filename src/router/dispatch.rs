//! Resolve a decoded request against the sealed route table and run its handler.
//!
//! Each invocation runs on its own tokio task so a panicking handler is
//! caught at the join point and reported as a [`Fault`] instead of taking the
//! connection task down with it.

use std::any::Any;
use std::fmt::Write as _;

use thiserror::Error;
use tracing::debug;

use super::handler::{BoxError, BoxedHandler};
use super::{RouteEntry, Router};
use crate::context::Context;
use crate::http::{Method, Reply, Request, RequestError, Response};

/// Why a request did not produce a handler response.
///
/// Both [`NotFound`](Self::NotFound) and [`Malformed`](Self::Malformed)
/// render as the same fixed `404` page.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no route for {method} {path}")]
    NotFound { method: Method, path: String },

    #[error(transparent)]
    Malformed(RequestError),

    #[error("handler fault: {0}")]
    Fault(#[from] Fault),
}

impl From<RequestError> for DispatchError {
    fn from(err: RequestError) -> Self {
        if err.is_malformed() {
            Self::Malformed(err)
        } else {
            Self::Fault(Fault::from_error(&err))
        }
    }
}

impl DispatchError {
    /// Status code of the page [`into_response`](Self::into_response) renders.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } | Self::Malformed(_) => 404,
            Self::Fault(_) => 500,
        }
    }

    /// Renders the fixed error page. With `debug` set, a fault page carries
    /// the fault's diagnostic trace.
    pub fn into_response(self, debug: bool) -> Response {
        match self {
            Self::NotFound { .. } | Self::Malformed(_) => Response::not_found_page(),
            Self::Fault(fault) => Response::fault_page(debug.then_some(fault.trace())),
        }
    }
}

/// A failure raised while serving a request: a handler error, a handler
/// panic, or a transport failure while decoding.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Fault {
    message: String,
    trace: String,
}

impl Fault {
    /// Captures `err` and its chain of sources.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let message = err.to_string();
        let mut trace = format!("error: {message}");
        let mut source = err.source();
        while let Some(cause) = source {
            let _ = write!(trace, "\ncaused by: {cause}");
            source = cause.source();
        }
        Self { message, trace }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        let trace = format!("handler panicked: {message}");
        Self { message, trace }
    }

    fn from_box(err: BoxError) -> Self {
        Self::from_error(err.as_ref())
    }

    /// Multi-line diagnostic text; never empty.
    pub fn trace(&self) -> &str {
        &self.trace
    }
}

impl Router {
    /// Looks up the route for `request` and runs its handler.
    ///
    /// A `HEAD` request is served by the `GET` entry for the same path, and a
    /// requested `method` field reads `"GET"`. The handler's reply is
    /// resolved into the [`Response`] to send. A miss runs the not-found
    /// handler when one is registered.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::NotFound`] — no entry for the resolved key and no
    ///   not-found handler.
    /// - [`DispatchError::Fault`] — the handler returned an error or panicked.
    pub async fn dispatch(&self, request: &Request) -> Result<Response, DispatchError> {
        let method = request.method().routing_method();
        if let Some(entry) = self.lookup(request.path(), &method) {
            return Ok(run(entry, request).await?.into_response());
        }

        match &self.not_found {
            Some(entry) => {
                debug!(%method, path = request.path(), "no matching route, using not-found handler");
                Ok(run(entry, request).await?.into_not_found_response())
            }
            None => Err(DispatchError::NotFound {
                method,
                path: request.path().to_owned(),
            }),
        }
    }

    /// The page sent for `err`: the registered fault page for a fault when
    /// there is one, otherwise [`DispatchError::into_response`].
    pub fn render_error(&self, err: DispatchError, debug: bool) -> Response {
        match (err, &self.fault_page) {
            (DispatchError::Fault(fault), Some(page)) => (page.0)(&fault),
            (err, _) => err.into_response(debug),
        }
    }
}

async fn run(entry: &RouteEntry, request: &Request) -> Result<Reply, Fault> {
    let task = match entry.handler() {
        BoxedHandler::Bare(handler) => {
            let handler = handler.clone();
            tokio::spawn(async move { handler.call().await })
        }
        BoxedHandler::WithContext(handler) => {
            let handler = handler.clone();
            let ctx = Context::build(request, entry.requirements());
            tokio::spawn(async move { handler.call(ctx).await })
        }
    };

    match task.await {
        Ok(Ok(reply)) => Ok(reply),
        Ok(Err(err)) => Err(Fault::from_box(err)),
        Err(join_err) if join_err.is_panic() => Err(Fault::from_panic(join_err.into_panic())),
        Err(join_err) => Err(Fault::from_error(&join_err)),
    }
}
