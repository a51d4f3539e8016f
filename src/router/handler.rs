//! Handler traits and the type-erased forms the registry stores.
//!
//! A route is served either by a handler that takes no arguments or by one
//! that takes a [`Context`] built from the route's [`Requirements`]. Both
//! kinds are async and return anything implementing [`IntoReply`].
//!
//! [`Requirements`]: super::Requirements

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::http::{Reply, Response};

/// Boxed error a handler may fail with; it becomes a `500` response.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Future returned by every stored handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply, BoxError>> + Send>>;

/// Conversion of a handler's return value into a [`Reply`].
///
/// Implemented for `String`, `&'static str`, [`Response`], [`Reply`] and for
/// `Result<T, E>` where `T: IntoReply` and `E` converts into [`BoxError`].
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, BoxError>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(self)
    }
}

impl IntoReply for Response {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Structured(self))
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Text(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Text(self.to_owned()))
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError>,
{
    fn into_reply(self) -> Result<Reply, BoxError> {
        self.map_err(Into::into)?.into_reply()
    }
}

/// An async handler invoked with no arguments.
///
/// Blanket-implemented for every `Fn() -> impl Future<Output = impl IntoReply>`
/// that is `Send + Sync + 'static`.
pub trait Handler: Send + Sync + 'static {
    fn call(&self) -> HandlerFuture;
}

impl<T, F, R> Handler for T
where
    T: Fn() -> F + Send + Sync + 'static,
    F: Future<Output = R> + Send + 'static,
    R: IntoReply,
{
    fn call(&self) -> HandlerFuture {
        let fut = (self)();
        Box::pin(async move { fut.await.into_reply() })
    }
}

/// An async handler invoked with a [`Context`].
///
/// Blanket-implemented for every
/// `Fn(Context) -> impl Future<Output = impl IntoReply>` that is
/// `Send + Sync + 'static`.
pub trait ContextHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> HandlerFuture;
}

impl<T, F, R> ContextHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = R> + Send + 'static,
    R: IntoReply,
{
    fn call(&self, ctx: Context) -> HandlerFuture {
        let fut = (self)(ctx);
        Box::pin(async move { fut.await.into_reply() })
    }
}

/// The stored, type-erased handler of a route entry.
#[derive(Clone)]
pub(crate) enum BoxedHandler {
    Bare(Arc<dyn Handler>),
    WithContext(Arc<dyn ContextHandler>),
}

impl std::fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bare(_) => f.write_str("Bare(..)"),
            Self::WithContext(_) => f.write_str("WithContext(..)"),
        }
    }
}
