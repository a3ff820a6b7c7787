//! Endpoint descriptors accepted by [`super::FallbackProviderBuilder`].
//!
//! An endpoint is either a bare URL or a connection carrying extra request settings
//! (authorization, static headers, a per-request timeout). Both forms are validated once, when
//! the provider is built; blank URLs are skipped and malformed ones reject the configuration.

use std::time::Duration;

use alloy::transports::{
    Authorization,
    http::reqwest::{
        Url,
        header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
    },
};
use serde::Deserialize;

use super::errors::Error;

/// A configured node endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    /// A plain endpoint URL.
    Url(String),
    /// An endpoint URL with additional request settings.
    Connection(Connection),
}

/// An endpoint URL with authorization, headers and timeout settings.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Connection {
    /// Endpoint URL.
    pub url: String,
    /// Value of the `Authorization` header sent with every request.
    #[serde(skip)]
    pub authorization: Option<Authorization>,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// Timeout of a single HTTP request, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Endpoint {
    /// Starts a [`Connection`] endpoint for `url`.
    #[must_use]
    pub fn connection(url: impl Into<String>) -> Connection {
        Connection { url: url.into(), ..Connection::default() }
    }

    /// Raw URL of the endpoint as configured.
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Endpoint::Url(url) => url,
            Endpoint::Connection(conn) => &conn.url,
        }
    }

    /// Whether the endpoint should be skipped because its URL is empty.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.url().trim().is_empty()
    }

    /// Validates the endpoint into its parsed form.
    pub(crate) fn resolve(&self) -> Result<ResolvedEndpoint, Error> {
        let url = parse_url(self.url())?;
        let Endpoint::Connection(conn) = self else {
            return Ok(ResolvedEndpoint { url, headers: HeaderMap::new(), timeout: None });
        };

        let mut headers = HeaderMap::with_capacity(conn.headers.len() + 1);
        for (name, value) in &conn.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::InvalidConfiguration(format!("invalid header name {name:?}: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                Error::InvalidConfiguration(format!("invalid value for header {name}: {e}"))
            })?;
            headers.insert(name, value);
        }
        if let Some(auth) = &conn.authorization {
            let mut value = HeaderValue::from_str(&auth.to_string()).map_err(|e| {
                Error::InvalidConfiguration(format!("invalid authorization for {url}: {e}"))
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(ResolvedEndpoint { url, headers, timeout: conn.timeout_ms.map(Duration::from_millis) })
    }
}

impl Connection {
    /// Sends HTTP basic credentials with every request.
    #[must_use]
    pub fn basic_auth(mut self, user: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        self.authorization = Some(Authorization::basic(user.as_ref(), password.as_ref()));
        self
    }

    /// Sends a bearer token with every request.
    #[must_use]
    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.authorization = Some(Authorization::bearer(token));
        self
    }

    /// Adds a static header sent with every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the timeout of a single HTTP request.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }
}

impl From<&str> for Endpoint {
    fn from(url: &str) -> Self {
        Endpoint::Url(url.to_owned())
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Endpoint::Url(url)
    }
}

impl From<Url> for Endpoint {
    fn from(url: Url) -> Self {
        Endpoint::Url(url.into())
    }
}

impl From<Connection> for Endpoint {
    fn from(conn: Connection) -> Self {
        Endpoint::Connection(conn)
    }
}

/// An endpoint that passed validation.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedEndpoint {
    pub(crate) url: Url,
    pub(crate) headers: HeaderMap,
    pub(crate) timeout: Option<Duration>,
}

fn parse_url(raw: &str) -> Result<Url, Error> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::InvalidConfiguration(format!("invalid endpoint URL {raw:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::InvalidConfiguration(format!(
            "unsupported scheme {scheme:?} in endpoint URL {raw:?}"
        ))),
    }
}
