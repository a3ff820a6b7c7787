use std::{sync::Arc, time::Duration};

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer};

use crate::fallback_provider::{
    Endpoint, Error, FallbackProvider, HttpTransport, NetworkIdentity, Retrier, Transport,
    provider::Inner,
    state::{ActiveCursor, EndpointSlot},
};

/// Default maximum number of retries per endpoint.
pub const DEFAULT_MAX_RETRIES: usize = 3;
/// Default delay before the first retry.
pub const DEFAULT_MIN_BACKOFF: Duration = Duration::from_millis(500);
/// Default upper bound for the delay between retries.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_millis(5000);
/// Retries are logged unless disabled.
pub const DEFAULT_LOG_RETRIES: bool = true;

/// Serializable configuration of a [`FallbackProvider`].
///
/// Every field except `urls` is optional and falls back to the `DEFAULT_*` constants, so a
/// minimal configuration only lists endpoints:
///
/// ```rust
/// # use fallback_provider::FallbackConfig;
/// let config: FallbackConfig = serde_json::from_str(
///     r#"{ "urls": ["http://localhost:8545"], "maxRetries": 5 }"#,
/// ).unwrap();
/// assert_eq!(config.max_retries, 5);
/// assert_eq!(config.min_backoff_ms, 500);
/// ```
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FallbackConfig {
    /// Ordered endpoints; the order defines round-robin failover order.
    pub urls: Vec<Endpoint>,
    /// Maximum retries per endpoint before failing over.
    pub max_retries: usize,
    /// Delay before the first retry, in milliseconds.
    pub min_backoff_ms: u64,
    /// Upper bound for the delay between retries, in milliseconds.
    pub max_backoff_ms: u64,
    /// Whether every failed attempt is logged.
    pub log_retries: bool,
    /// Time budget for all attempts against one endpoint, in milliseconds.
    pub call_timeout_ms: Option<u64>,
    /// Maximum number of in-flight requests per endpoint.
    pub max_concurrent_requests: Option<usize>,
    /// Network every endpoint is expected to serve, given as a full identity or a bare chain id.
    #[serde(deserialize_with = "network_or_chain_id")]
    pub network: Option<NetworkIdentity>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            min_backoff_ms: millis(DEFAULT_MIN_BACKOFF),
            max_backoff_ms: millis(DEFAULT_MAX_BACKOFF),
            log_retries: DEFAULT_LOG_RETRIES,
            call_timeout_ms: None,
            max_concurrent_requests: None,
            network: None,
        }
    }
}

/// Builder for constructing a [`FallbackProvider`].
///
/// Use this to configure endpoints, retry/backoff and the expected network. Building performs
/// no network activity; endpoints are checked lazily before the first call, or explicitly with
/// [`FallbackProvider::detect_network_identity`].
#[derive(Clone, Debug)]
pub struct FallbackProviderBuilder {
    endpoints: Vec<Endpoint>,
    max_retries: usize,
    min_backoff: Duration,
    max_backoff: Duration,
    log_retries: bool,
    call_timeout: Option<Duration>,
    max_concurrent_requests: Option<usize>,
    network: Option<NetworkIdentity>,
}

impl Default for FallbackProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackProviderBuilder {
    /// Create a new builder with default settings and no endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoints: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            min_backoff: DEFAULT_MIN_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            log_retries: DEFAULT_LOG_RETRIES,
            call_timeout: None,
            max_concurrent_requests: None,
            network: None,
        }
    }

    /// Create a builder that never retries: every endpoint gets exactly one attempt before the
    /// provider fails over.
    #[must_use]
    pub fn fragile() -> Self {
        Self::new().max_retries(0).min_backoff(Duration::ZERO).max_backoff(Duration::ZERO)
    }

    /// Create a builder from a deserialized [`FallbackConfig`].
    #[must_use]
    pub fn from_config(config: FallbackConfig) -> Self {
        Self {
            endpoints: config.urls,
            max_retries: config.max_retries,
            min_backoff: Duration::from_millis(config.min_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            log_retries: config.log_retries,
            call_timeout: config.call_timeout_ms.map(Duration::from_millis),
            max_concurrent_requests: config.max_concurrent_requests,
            network: config.network,
        }
    }

    /// Append an endpoint. Endpoints are tried in the order they were added.
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<Endpoint>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    /// Append several endpoints.
    #[must_use]
    pub fn endpoints<E: Into<Endpoint>>(mut self, endpoints: impl IntoIterator<Item = E>) -> Self {
        self.endpoints.extend(endpoints.into_iter().map(Into::into));
        self
    }

    /// Set the maximum number of retries per endpoint.
    #[must_use]
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub fn min_backoff(mut self, min_backoff: Duration) -> Self {
        self.min_backoff = min_backoff;
        self
    }

    /// Set the upper bound for the delay between retries.
    #[must_use]
    pub fn max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    /// Enable or disable logging of every failed attempt.
    #[must_use]
    pub fn log_retries(mut self, log_retries: bool) -> Self {
        self.log_retries = log_retries;
        self
    }

    /// Bound the total time spent on one endpoint, retries included.
    ///
    /// When the budget elapses the endpoint counts as failed and the provider fails over.
    #[must_use]
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    /// Limit the number of in-flight requests per HTTP endpoint.
    #[must_use]
    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = Some(limit);
        self
    }

    /// Set the network every endpoint is expected to serve.
    ///
    /// [`FallbackProvider::network`] answers with it without querying the endpoints, and
    /// detection fails with [`Error::NetworkMismatch`] when the endpoints agree on another one.
    #[must_use]
    pub fn network(mut self, network: NetworkIdentity) -> Self {
        self.network = Some(network);
        self
    }

    /// Build a [`FallbackProvider`] over HTTP endpoints.
    ///
    /// Blank endpoints are skipped.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] if no non-blank endpoint was configured, an endpoint is
    /// malformed, or the backoff bounds are inverted.
    pub fn build(self) -> Result<FallbackProvider<HttpTransport>, Error> {
        self.validate_backoff()?;

        let endpoints: Vec<&Endpoint> = self.endpoints.iter().filter(|e| !e.is_blank()).collect();
        if endpoints.is_empty() {
            return Err(Error::InvalidConfiguration(
                "No valid URLs or connections were provided".to_owned(),
            ));
        }

        let transports = endpoints
            .into_iter()
            .map(|endpoint| HttpTransport::new(endpoint.resolve()?, self.max_concurrent_requests))
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(self.assemble(transports))
    }

    /// Build a [`FallbackProvider`] over caller-supplied transports.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfiguration`] if `transports` is empty, endpoints were also configured
    /// on the builder, or the backoff bounds are inverted.
    pub fn build_with_transports<T: Transport>(
        self,
        transports: Vec<T>,
    ) -> Result<FallbackProvider<T>, Error> {
        self.validate_backoff()?;

        if !self.endpoints.is_empty() {
            return Err(Error::InvalidConfiguration(
                "endpoints and custom transports cannot be combined".to_owned(),
            ));
        }
        if transports.is_empty() {
            return Err(Error::InvalidConfiguration("No transports were provided".to_owned()));
        }

        Ok(self.assemble(transports))
    }

    fn validate_backoff(&self) -> Result<(), Error> {
        if self.min_backoff > self.max_backoff {
            return Err(Error::InvalidConfiguration(format!(
                "min backoff ({:?}) exceeds max backoff ({:?})",
                self.min_backoff, self.max_backoff
            )));
        }
        Ok(())
    }

    fn assemble<T: Transport>(self, transports: Vec<T>) -> FallbackProvider<T> {
        debug!(
            endpoints = transports.len(),
            max_retries = self.max_retries,
            min_backoff_ms = self.min_backoff.as_millis(),
            max_backoff_ms = self.max_backoff.as_millis(),
            "Building FallbackProvider"
        );

        let cursor = ActiveCursor::new(transports.len());
        let slots = transports
            .into_iter()
            .enumerate()
            .map(|(index, transport)| EndpointSlot::new(index, transport))
            .collect();

        FallbackProvider {
            inner: Arc::new(Inner {
                slots,
                cursor,
                retrier: Retrier::new(
                    self.max_retries,
                    self.min_backoff,
                    self.max_backoff,
                    self.log_retries,
                ),
                call_timeout: self.call_timeout,
                target_network: self.network,
                agreed_network: RwLock::new(None),
            }),
        }
    }
}

fn network_or_chain_id<'de, D>(deserializer: D) -> Result<Option<NetworkIdentity>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Network {
        ChainId(u64),
        Identity(NetworkIdentity),
    }

    Ok(Option::<Network>::deserialize(deserializer)?.map(|network| match network {
        Network::ChainId(chain_id) => NetworkIdentity::from_chain_id(chain_id),
        Network::Identity(identity) => identity,
    }))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
