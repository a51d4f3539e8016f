//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and runs exactly one request/response cycle per
//! connection on its own task: decode, dispatch, encode, write, close.
//! There are no read timeouts: a client that never finishes its declared
//! body keeps its task waiting.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream, lookup_host};
use tracing::{debug, error, info, warn};

use crate::http::{Request, Response};
use crate::router::{DispatchError, Router};

pub mod config;

pub use config::ServerConfig;

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Pending connections the kernel queues before `accept`.
const LISTEN_BACKLOG: u32 = 5;

/// The plainhttp HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use plainhttp::http::Method;
/// use plainhttp::router::Registry;
/// use plainhttp::server::{Server, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut registry = Registry::new();
///     registry.register("/", [Method::Get], || async { "Hello!" });
///
///     let server = Server::bind(&ServerConfig::new().port(8080)).await?;
///     server.run(registry.seal()).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    debug: bool,
    access_log: bool,
}

impl Server {
    /// Binds the server to `config.host:config.port`.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be resolved or
    /// bound (e.g. port already in use, insufficient permissions).
    pub async fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let addr = config.address();
        let bind_error = |source| ServerError::Bind {
            addr: addr.clone(),
            source,
        };

        let resolved = lookup_host(addr.as_str())
            .await
            .map_err(bind_error)?
            .next()
            .ok_or_else(|| {
                bind_error(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "host resolved to no addresses",
                ))
            })?;

        let socket = if resolved.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(bind_error)?;
        socket.set_reuseaddr(true).map_err(bind_error)?;
        socket.bind(resolved).map_err(bind_error)?;
        let listener = socket.listen(LISTEN_BACKLOG).map_err(bind_error)?;
        let local_addr = listener.local_addr()?;

        if config.keep_alive {
            warn!("keep-alive is not supported; every connection closes after one response");
        }

        Ok(Self {
            listener,
            local_addr,
            debug: config.debug,
            access_log: config.access_log,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and serving them from `router`.
    ///
    /// Each accepted connection gets its own Tokio task; the accept loop
    /// itself never waits on a connection. Runs until the process is
    /// terminated.
    ///
    /// # Errors
    ///
    /// Accept failures are logged and skipped; this does not return under
    /// normal operation.
    pub async fn run(self, router: Router) -> Result<(), ServerError> {
        info!(address = %self.local_addr, routes = router.len(), "plainhttp listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let router = router.clone();
            let debug = self.debug;
            let access_log = self.access_log;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, router, debug, access_log).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Runs one decode → dispatch → encode → write cycle, then closes.
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    router: Router,
    debug: bool,
    access_log: bool,
) -> Result<(), std::io::Error> {
    let (method, path, response) = match Request::read_from(&mut stream).await {
        Ok(None) => {
            debug!(peer = %peer_addr, "connection closed before a request arrived");
            return Ok(());
        }
        Ok(Some(request)) => {
            let response = match router.dispatch(&request).await {
                Ok(response) => response,
                Err(e) => render_error(&router, e, peer_addr, debug),
            };
            (
                request.method().to_string(),
                request.path().to_owned(),
                response,
            )
        }
        Err(e) => {
            let response = render_error(&router, DispatchError::from(e), peer_addr, debug);
            ("-".to_owned(), "-".to_owned(), response)
        }
    };

    let status = response.status_code();
    stream.write_all(&response.into_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await?;

    if access_log {
        info!(
            method = %method,
            path = %path,
            status,
            client = %peer_addr.ip(),
            "{method} {path} {status} {}",
            peer_addr.ip()
        );
    }
    Ok(())
}

fn render_error(router: &Router, err: DispatchError, peer_addr: SocketAddr, debug: bool) -> Response {
    match &err {
        DispatchError::NotFound { .. } => {
            debug!(peer = %peer_addr, error = %err, "no matching route");
        }
        DispatchError::Malformed(e) => {
            warn!(peer = %peer_addr, error = %e, "malformed request");
        }
        DispatchError::Fault(fault) => {
            error!(peer = %peer_addr, trace = fault.trace(), "handler fault");
        }
    }
    router.render_error(err, debug)
}
