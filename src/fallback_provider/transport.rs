//! Single-endpoint transports.
//!
//! A [`Transport`] executes one JSON-RPC call against one endpoint and reports which network
//! that endpoint serves. Transports never retry on their own; retries and failover are layered
//! on top by [`super::FallbackProvider`].

use std::{future::Future, sync::Arc};

use alloy::{
    primitives::U64,
    rpc::client::RpcClient,
    transports::{
        http::{Http, reqwest},
        utils::guess_local_url,
    },
};
use serde_json::Value;
use tokio::sync::Semaphore;

use super::{
    endpoint::ResolvedEndpoint,
    errors::{Error, TransportError},
    network::NetworkIdentity,
};

/// A handle to one remote RPC endpoint.
pub trait Transport: Send + Sync + 'static {
    /// The endpoint URL, used for diagnostics.
    fn url(&self) -> &str;

    /// Executes `method` with `params` and returns the raw result.
    fn call(
        &self,
        method: &str,
        params: &Value,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;

    /// Queries the network identity the endpoint serves.
    fn network_identity(
        &self,
    ) -> impl Future<Output = Result<NetworkIdentity, TransportError>> + Send;
}

/// A [`Transport`] speaking JSON-RPC over HTTP.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    url: String,
    client: RpcClient,
    limiter: Option<Arc<Semaphore>>,
}

impl HttpTransport {
    /// Creates a transport for `endpoint`.
    ///
    /// When `max_concurrent_requests` is set, at most that many requests are in flight against
    /// the endpoint at once; further requests wait for a free slot.
    pub(crate) fn new(
        endpoint: ResolvedEndpoint,
        max_concurrent_requests: Option<usize>,
    ) -> Result<Self, Error> {
        let mut builder = reqwest::Client::builder().default_headers(endpoint.headers);
        if let Some(timeout) = endpoint.timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder.build().map_err(|e| {
            Error::InvalidConfiguration(format!(
                "failed to build HTTP client for {}: {e}",
                endpoint.url
            ))
        })?;

        let is_local = guess_local_url(endpoint.url.as_str());
        let url = endpoint.url.to_string();
        let client = RpcClient::new(Http::with_client(http_client, endpoint.url), is_local);

        Ok(Self {
            url,
            client,
            limiter: max_concurrent_requests.map(|limit| Arc::new(Semaphore::new(limit.max(1)))),
        })
    }
}

impl Transport for HttpTransport {
    fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: &Value) -> Result<Value, TransportError> {
        let _permit = match &self.limiter {
            Some(limiter) => Some(
                limiter
                    .acquire()
                    .await
                    .map_err(|_| TransportError::custom("request limiter closed"))?,
            ),
            None => None,
        };

        trace!(url = %self.url, method = method, "Sending request");

        let result = self.client.request::<_, Value>(method.to_owned(), params.clone()).await?;
        Ok(result)
    }

    async fn network_identity(&self) -> Result<NetworkIdentity, TransportError> {
        let chain_id: U64 = self.client.request_noparams::<U64>("eth_chainId").await?;
        Ok(NetworkIdentity::from_chain_id(chain_id.to::<u64>()))
    }
}
