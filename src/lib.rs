//! # plainhttp
//!
//! A minimal HTTP/1.1 server on raw TCP sockets: one task per connection,
//! one request per connection, exact `(path, method)` routing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plainhttp::context::Context;
//! use plainhttp::http::{Method, Response, SetCookie};
//! use plainhttp::router::{Registry, Requirements};
//! use plainhttp::server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = Registry::new();
//!     registry.register("/", [Method::Get], || async { "Hello, World!" });
//!     registry.register_with_context(
//!         "/login",
//!         [Method::Post],
//!         Requirements::new().post_params(),
//!         |ctx: Context| async move {
//!             let user = ctx.post_params().and_then(|p| p.get("user")).unwrap_or("guest");
//!             Response::default()
//!                 .cookie(SetCookie::new("user", user).path("/"))
//!                 .redirect("/")
//!         },
//!     );
//!
//!     let server = Server::bind(&ServerConfig::new().port(8080)).await?;
//!     server.run(registry.seal()).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Limitations
//!
//! - Every connection is closed after one response; keep-alive is not
//!   supported.
//! - `multipart/form-data` bodies are recognized but not decoded.
//! - No TLS, connection limits or timeouts.

pub mod context;
pub mod http;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use context::Context;
pub use http::{Headers, Method, Params, Reply, Request, Response, SetCookie, StatusCode};
pub use router::{Registry, Requirements, Router};
pub use server::{Server, ServerConfig, ServerError};
