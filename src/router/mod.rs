//! Route registry: map an exact `(path, method)` pair to a handler.
//!
//! Routes are collected in a mutable [`Registry`] during startup. Calling
//! [`Registry::seal`] produces a [`Router`], which is immutable and cheap to
//! share between connection tasks; there is no way back from a `Router` to a
//! mutable registry.
//!
//! Matching is exact string comparison on the path. There are no patterns,
//! wildcards or trailing-slash normalization: `/users` and `/users/` are
//! different routes.
//!
//! A registry may also carry a not-found handler ([`Registry::on_not_found`])
//! and a fault page ([`Registry::on_fault`]) that replace the fixed `404` and
//! `500` pages.
//!
//! # Examples
//!
//! ```rust,no_run
//! use plainhttp::context::Context;
//! use plainhttp::http::Method;
//! use plainhttp::router::{Registry, Requirements};
//!
//! let mut registry = Registry::new();
//! registry.register("/", [Method::Get], || async { "<h1>home</h1>" });
//! registry.register_with_context(
//!     "/echo",
//!     [Method::Get, Method::Post],
//!     Requirements::new().get_params().post_params().method(),
//!     |ctx: Context| async move { format!("{:?}", ctx.method()) },
//! );
//! let router = registry.seal();
//! assert_eq!(router.len(), 3);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::http::{Method, Response};

pub mod dispatch;
pub mod handler;

pub use dispatch::{DispatchError, Fault};
pub use handler::{BoxError, ContextHandler, Handler, IntoReply};

use handler::BoxedHandler;

/// The request fields a handler wants in its [`Context`](crate::context::Context).
///
/// Flags are independent; any subset may be set. They only take effect for
/// handlers registered with [`Registry::register_with_context`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Requirements {
    pub cookie: bool,
    pub get_params: bool,
    pub post_params: bool,
    pub headers: bool,
    pub body: bool,
    pub method: bool,
}

impl Requirements {
    /// No fields requested.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every field requested.
    pub fn all() -> Self {
        Self {
            cookie: true,
            get_params: true,
            post_params: true,
            headers: true,
            body: true,
            method: true,
        }
    }

    #[must_use]
    pub fn cookie(mut self) -> Self {
        self.cookie = true;
        self
    }

    #[must_use]
    pub fn get_params(mut self) -> Self {
        self.get_params = true;
        self
    }

    #[must_use]
    pub fn post_params(mut self) -> Self {
        self.post_params = true;
        self
    }

    #[must_use]
    pub fn headers(mut self) -> Self {
        self.headers = true;
        self
    }

    #[must_use]
    pub fn body(mut self) -> Self {
        self.body = true;
        self
    }

    #[must_use]
    pub fn method(mut self) -> Self {
        self.method = true;
        self
    }
}

/// A registered route: the handler plus the fields it asked for.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    handler: BoxedHandler,
    requirements: Requirements,
}

impl RouteEntry {
    /// `false` when the handler is called with no arguments at all.
    pub fn needs_args(&self) -> bool {
        matches!(self.handler, BoxedHandler::WithContext(_))
    }

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    pub(crate) fn handler(&self) -> &BoxedHandler {
        &self.handler
    }
}

type RouteKey = (String, Method);

/// Renders the `500` page for a handler fault.
#[derive(Clone)]
struct FaultPage(Arc<dyn Fn(&Fault) -> Response + Send + Sync>);

impl std::fmt::Debug for FaultPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FaultPage(..)")
    }
}

/// Route table under construction.
#[derive(Debug, Default)]
pub struct Registry {
    routes: HashMap<RouteKey, RouteEntry>,
    not_found: Option<RouteEntry>,
    fault_page: Option<FaultPage>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler that takes no arguments, for each of `methods`.
    ///
    /// Re-registering an existing `(path, method)` replaces the earlier entry.
    pub fn register<M>(&mut self, path: &str, methods: M, handler: impl Handler)
    where
        M: IntoIterator<Item = Method>,
    {
        let handler = BoxedHandler::Bare(Arc::new(handler));
        self.insert(path, methods, handler, Requirements::new());
    }

    /// Registers a handler that receives a [`Context`](crate::context::Context)
    /// holding the fields in `requirements`, for each of `methods`.
    ///
    /// Re-registering an existing `(path, method)` replaces the earlier entry.
    pub fn register_with_context<M>(
        &mut self,
        path: &str,
        methods: M,
        requirements: Requirements,
        handler: impl ContextHandler,
    ) where
        M: IntoIterator<Item = Method>,
    {
        let handler = BoxedHandler::WithContext(Arc::new(handler));
        self.insert(path, methods, handler, requirements);
    }

    fn insert<M>(&mut self, path: &str, methods: M, handler: BoxedHandler, requirements: Requirements)
    where
        M: IntoIterator<Item = Method>,
    {
        for method in methods {
            if method == Method::Head {
                warn!(path, "HEAD is served by the GET route; this entry is never used");
            }
            let entry = RouteEntry {
                handler: handler.clone(),
                requirements,
            };
            if self.routes.insert((path.to_owned(), method.clone()), entry).is_some() {
                debug!(path, %method, "route replaced");
            }
        }
    }

    /// Serves requests that match no route with `handler` instead of the
    /// fixed `404` page.
    ///
    /// A text reply is sent with the `404 NOT FOUND` status; a [`Response`]
    /// goes out as built. Malformed requests never reach routing and keep
    /// the fixed page. Calling this again replaces the earlier handler.
    pub fn on_not_found(&mut self, requirements: Requirements, handler: impl ContextHandler) {
        self.not_found = Some(RouteEntry {
            handler: BoxedHandler::WithContext(Arc::new(handler)),
            requirements,
        });
    }

    /// Renders handler faults with `page` instead of the fixed `500` page.
    ///
    /// `page` is used whether or not the server runs in debug mode; it can
    /// include [`Fault::trace`] itself.
    pub fn on_fault<F>(&mut self, page: F)
    where
        F: Fn(&Fault) -> Response + Send + Sync + 'static,
    {
        self.fault_page = Some(FaultPage(Arc::new(page)));
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freezes the table. The returned [`Router`] is read-only.
    pub fn seal(self) -> Router {
        Router {
            routes: Arc::new(self.routes),
            not_found: self.not_found,
            fault_page: self.fault_page,
        }
    }
}

/// Sealed, read-only route table. Clones share the same table.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Arc<HashMap<RouteKey, RouteEntry>>,
    not_found: Option<RouteEntry>,
    fault_page: Option<FaultPage>,
}

impl Router {
    /// Exact lookup of `(path, method)`. `HEAD` is not remapped here; the
    /// dispatcher does that.
    pub fn lookup(&self, path: &str, method: &Method) -> Option<&RouteEntry> {
        // HashMap<(String, Method)> cannot be queried with borrowed parts.
        self.routes.get(&(path.to_owned(), method.clone()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;

    #[test]
    fn registry_starts_empty() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.seal().is_empty());
    }

    #[test]
    fn one_entry_per_method() {
        let mut registry = Registry::new();
        registry.register("/a", [Method::Get, Method::Post], || async { "a" });
        let router = registry.seal();
        assert_eq!(router.len(), 2);
        assert!(router.lookup("/a", &Method::Get).is_some());
        assert!(router.lookup("/a", &Method::Post).is_some());
        assert!(router.lookup("/a", &Method::Put).is_none());
    }

    #[test]
    fn lookup_is_exact() {
        let mut registry = Registry::new();
        registry.register("/users", [Method::Get], || async { "u" });
        let router = registry.seal();
        assert!(router.lookup("/users", &Method::Get).is_some());
        assert!(router.lookup("/users/", &Method::Get).is_none());
        assert!(router.lookup("/Users", &Method::Get).is_none());
        assert!(router.lookup("/users/1", &Method::Get).is_none());
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = Registry::new();
        registry.register("/p", [Method::Get], || async { "first" });
        registry.register_with_context(
            "/p",
            [Method::Get],
            Requirements::new().cookie(),
            |_ctx: Context| async { "second" },
        );
        let router = registry.seal();
        assert_eq!(router.len(), 1);
        let entry = router.lookup("/p", &Method::Get).unwrap();
        assert!(entry.needs_args());
        assert!(entry.requirements().cookie);
    }

    #[test]
    fn bare_handlers_need_no_args() {
        let mut registry = Registry::new();
        registry.register("/", [Method::Get], || async { "x" });
        let router = registry.seal();
        let entry = router.lookup("/", &Method::Get).unwrap();
        assert!(!entry.needs_args());
        assert_eq!(entry.requirements(), &Requirements::new());
    }

    #[test]
    fn custom_methods_route() {
        let mut registry = Registry::new();
        registry.register("/cache", [Method::from("PURGE")], || async { "purged" });
        let router = registry.seal();
        assert!(router.lookup("/cache", &Method::Custom("PURGE".into())).is_some());
    }

    #[test]
    fn requirements_builder() {
        let r = Requirements::new().headers().body();
        assert!(r.headers && r.body);
        assert!(!r.cookie && !r.get_params && !r.post_params && !r.method);
        assert_eq!(Requirements::all(), Requirements::new().cookie().get_params().post_params().headers().body().method());
    }
}
