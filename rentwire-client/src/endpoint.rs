//! Endpoint addressing
//!
//! The channel talks to a single endpoint, parameterized by the session
//! identifier as a query parameter:
//!
//! ```text
//! ws[s]://<host>/ws?identifier=<id>
//! ```
//!
//! When the client is embedded in a web page, the scheme mirrors the page
//! (`https` pages use `wss`) and so does the host, except during local
//! development where the page is served by a dev server and the channel
//! lives on the fixed backend address `localhost:8000`.
//!
//! # Examples
//!
//! ```rust
//! use rentwire_client::Endpoint;
//!
//! let endpoint = Endpoint::from_page("https://portal.example.com/leases").unwrap();
//! let url = endpoint.url_for("tenant 7").unwrap();
//! assert_eq!(url.as_str(), "wss://portal.example.com/ws?identifier=tenant+7");
//! ```

use rentwire_core::{Error, Result};
use url::Url;

/// Backend address used during local development
pub const LOCAL_HOST: &str = "localhost:8000";

/// Path of the channel endpoint
pub const DEFAULT_PATH: &str = "/ws";

/// Query parameter carrying the session identifier
pub const IDENTIFIER_PARAM: &str = "identifier";

/// Where the channel connects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    secure: bool,
    host: String,
    path: String,
}

impl Endpoint {
    /// Endpoint with an explicit scheme and `host[:port]`
    pub fn new(secure: bool, host: impl Into<String>) -> Self {
        Self {
            secure,
            host: host.into(),
            path: DEFAULT_PATH.to_string(),
        }
    }

    /// Local development backend: `ws://localhost:8000/ws`
    pub fn local() -> Self {
        Self::new(false, LOCAL_HOST)
    }

    /// Derive the endpoint from the URL of the hosting page
    ///
    /// # Arguments
    ///
    /// * `page_url` - Absolute URL of the page embedding the client
    ///
    /// # Returns
    ///
    /// `wss` for `https`/`wss` pages and `ws` otherwise. The host and port
    /// are the page's own, except that loopback hosts map to `localhost:8000`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rentwire_client::Endpoint;
    ///
    /// let dev = Endpoint::from_page("http://127.0.0.1:5173/dashboard").unwrap();
    /// assert_eq!(dev, Endpoint::local());
    ///
    /// let prod = Endpoint::from_page("https://portal.example.com:8443/").unwrap();
    /// assert!(prod.is_secure());
    /// assert_eq!(prod.host(), "portal.example.com:8443");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidEndpoint` if `page_url` does not parse or has
    /// no host.
    pub fn from_page(page_url: &str) -> Result<Self> {
        let page = Url::parse(page_url).map_err(|e| Error::InvalidEndpoint(e.to_string()))?;
        let secure = matches!(page.scheme(), "https" | "wss");

        let host = page
            .host_str()
            .ok_or_else(|| Error::InvalidEndpoint(format!("{page_url} has no host")))?;

        if is_local(host) {
            return Ok(Self::new(secure, LOCAL_HOST));
        }

        let host = match page.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self::new(secure, host))
    }

    /// Replace the endpoint path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Whether the endpoint uses `wss`
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// `host[:port]` of the endpoint
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Full URL for `identifier`
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidEndpoint` if host and path do not form a URL.
    pub fn url_for(&self, identifier: &str) -> Result<Url> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let mut url = Url::parse(&format!("{scheme}://{}", self.host))
            .map_err(|e| Error::InvalidEndpoint(e.to_string()))?;
        url.set_path(&self.path);
        url.query_pairs_mut()
            .append_pair(IDENTIFIER_PARAM, identifier);
        Ok(url)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::local()
    }
}

fn is_local(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "[::1]" | "::1" | "0.0.0.0")
}
