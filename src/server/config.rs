//! Startup configuration for [`Server`](super::Server).

use serde::Deserialize;

/// Where to listen and how to render faults.
///
/// Deserializable from JSON; missing fields take their defaults.
///
/// # Examples
///
/// ```
/// use plainhttp::server::ServerConfig;
///
/// let config = ServerConfig::from_json(r#"{ "port": 8080, "debug": true }"#).unwrap();
/// assert_eq!(config.host, "127.0.0.1");
/// assert_eq!(config.port, 8080);
/// assert!(config.debug);
/// assert!(!config.keep_alive);
/// assert!(config.access_log);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Expose fault diagnostics in `500` responses.
    pub debug: bool,
    /// Accepted for compatibility; every connection is closed after one
    /// response regardless.
    pub keep_alive: bool,
    /// Emit one `info` line per served connection.
    pub access_log: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 5000,
            debug: false,
            keep_alive: false,
            access_log: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] on malformed JSON or mistyped fields.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    #[must_use]
    pub fn access_log(mut self, access_log: bool) -> Self {
        self.access_log = access_log;
        self
    }

    /// `host:port`, ready for address resolution.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
