//! Core [`FallbackProvider`] implementation with retry, failover and network consensus.

use std::{fmt, sync::Arc, time::Duration};

use alloy::{
    eips::BlockId,
    primitives::{Address, B256, Bytes, U64, U256},
    rpc::types::TransactionRequest,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::{
    consensus,
    errors::{EndpointFailure, Error, TransportError},
    network::NetworkIdentity,
    retrier::{RetryError, Retrier},
    state::{ActiveCursor, EndpointSlot, EndpointStatus, find_valid},
    transport::{HttpTransport, Transport},
};

/// JSON-RPC provider that retries and fails over across several endpoints.
///
/// Calls go to the active endpoint and are retried with exponential backoff. Once the retries
/// for an endpoint are exhausted the provider moves on to the next valid endpoint, wrapping
/// around the configured list, until every endpoint has had a turn.
///
/// Endpoints are only used after they agreed on the network they serve, see
/// [`FallbackProvider::detect_network_identity`].
///
/// Cloning is cheap and clones share endpoint state, so concurrent callers observe the same
/// active endpoint and validity.
pub struct FallbackProvider<T = HttpTransport> {
    pub(crate) inner: Arc<Inner<T>>,
}

pub(crate) struct Inner<T> {
    pub(crate) slots: Vec<EndpointSlot<T>>,
    pub(crate) cursor: ActiveCursor,
    pub(crate) retrier: Retrier,
    pub(crate) call_timeout: Option<Duration>,
    pub(crate) target_network: Option<NetworkIdentity>,
    pub(crate) agreed_network: RwLock<Option<NetworkIdentity>>,
}

impl<T> Clone for FallbackProvider<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Transport> fmt::Debug for FallbackProvider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let endpoints: Vec<&str> = self.inner.slots.iter().map(|s| s.transport.url()).collect();
        f.debug_struct("FallbackProvider")
            .field("endpoints", &endpoints)
            .field("active_index", &self.active_index())
            .field("retrier", &self.inner.retrier)
            .field("call_timeout", &self.inner.call_timeout)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> FallbackProvider<T> {
    /// Performs a JSON-RPC call with retries and failover.
    ///
    /// If the endpoints have not agreed on a network yet, the consensus check runs first.
    ///
    /// # Errors
    ///
    /// * [`Error::AllEndpointsFailed`] - if every attempted endpoint exhausted its retries; lists
    ///   the last error of each attempt.
    /// * [`Error::NoValidEndpoints`] - if no endpoint is currently valid.
    /// * [`Error::NetworkMismatch`] - if the endpoints disagree on the network.
    pub async fn perform(&self, method: &str, params: Value) -> Result<Value, Error> {
        self.try_operation_with_failover(method, &params, None).await
    }

    /// Like [`FallbackProvider::perform`], but aborts as soon as `token` is cancelled.
    ///
    /// # Errors
    ///
    /// [`Error::Cancelled`] if `token` fires first, otherwise as [`FallbackProvider::perform`].
    pub async fn perform_with_cancellation(
        &self,
        method: &str,
        params: Value,
        token: &CancellationToken,
    ) -> Result<Value, Error> {
        self.try_operation_with_failover(method, &params, Some(token)).await
    }

    /// Performs a JSON-RPC call and decodes its result into `R`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidResponse`] if the result does not decode, otherwise as
    /// [`FallbackProvider::perform`].
    pub async fn perform_as<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<R, Error> {
        let value = self.perform(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidResponse { method: method.to_owned(), source: Arc::new(e) })
    }

    /// Queries every endpoint's network identity and checks that they agree.
    ///
    /// Every endpoint is marked valid or invalid as a side effect, whatever the outcome. On
    /// success the agreed identity is remembered and calls may use the valid endpoints.
    ///
    /// # Errors
    ///
    /// * [`Error::NetworkMismatch`] - if two reachable endpoints disagree, or they agree on a
    ///   network other than the configured one.
    /// * [`Error::NoValidEndpoints`] - if no endpoint answered.
    pub async fn detect_network_identity(&self) -> Result<NetworkIdentity, Error> {
        let result = consensus::check_all(&self.inner.slots)
            .await
            .and_then(|network| self.check_target_network(network));

        *self.inner.agreed_network.write() = result.as_ref().ok().cloned();
        result
    }

    /// Returns the network the provider serves.
    ///
    /// Answers from the configured network or the last agreed identity when available and only
    /// queries the endpoints otherwise.
    ///
    /// # Errors
    ///
    /// As [`FallbackProvider::detect_network_identity`].
    pub async fn network(&self) -> Result<NetworkIdentity, Error> {
        if let Some(network) = &self.inner.target_network {
            return Ok(network.clone());
        }
        if let Some(network) = self.inner.agreed_network.read().clone() {
            return Ok(network);
        }
        self.detect_network_identity().await
    }

    /// Number of configured endpoints.
    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.inner.slots.len()
    }

    /// Number of endpoints currently marked valid.
    #[must_use]
    pub fn valid_endpoint_count(&self) -> usize {
        self.inner.slots.iter().filter(|slot| slot.is_valid()).count()
    }

    /// Index of the endpoint calls currently start from.
    #[must_use]
    pub fn active_index(&self) -> usize {
        self.inner.cursor.get()
    }

    /// Status of the endpoint at `index`.
    #[must_use]
    pub fn endpoint_status(&self, index: usize) -> Option<EndpointStatus> {
        self.inner.slots.get(index).map(EndpointSlot::status)
    }

    /// URL of the endpoint at `index`.
    #[must_use]
    pub fn endpoint_url(&self, index: usize) -> Option<&str> {
        self.inner.slots.get(index).map(|slot| slot.transport.url())
    }

    /// The retrier applied to every endpoint.
    #[must_use]
    pub fn retrier(&self) -> &Retrier {
        &self.inner.retrier
    }

    async fn try_operation_with_failover(
        &self,
        method: &str,
        params: &Value,
        token: Option<&CancellationToken>,
    ) -> Result<Value, Error> {
        match token {
            Some(token) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => return Err(Error::Cancelled),
                    agreed = self.ensure_network_agreed() => agreed?,
                }
            }
            None => self.ensure_network_agreed().await?,
        }

        let mut tried = vec![false; self.inner.slots.len()];
        let mut failures = Vec::new();

        // Each endpoint gets at most one turn per call, whatever concurrent calls do to the
        // shared cursor in the meantime.
        loop {
            let slot = match self.select_endpoint(&tried) {
                Ok(slot) => slot,
                Err(e) if failures.is_empty() => return Err(e),
                Err(_) => break,
            };
            tried[slot.index] = true;
            let attempt = failures.len();

            trace!(
                endpoint_index = slot.index,
                attempt = attempt,
                method = method,
                "Attempting endpoint"
            );

            match self.try_endpoint(slot, method, params, token).await {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            endpoint_index = slot.index,
                            failed_endpoints = attempt,
                            method = method,
                            "Request succeeded on fallback endpoint"
                        );
                    }
                    return Ok(value);
                }
                Err(RetryError::Cancelled) => {
                    debug!(endpoint_index = slot.index, method = method, "Request cancelled");
                    return Err(Error::Cancelled);
                }
                Err(RetryError::Exhausted(e)) => {
                    error!(
                        endpoint_index = slot.index,
                        method = method,
                        error = %e,
                        "Error while performing RPC request, will try to switch to another endpoint"
                    );
                    failures.push(EndpointFailure {
                        index: slot.index,
                        url: slot.transport.url().to_owned(),
                        error: e,
                    });
                    self.switch_to_next_endpoint(slot.index);
                }
            }
        }

        error!(attempted_endpoints = failures.len(), method = method, "All endpoints exhausted");

        Err(Error::AllEndpointsFailed {
            method: method.to_owned(),
            attempted: failures.len(),
            failures,
        })
    }

    /// Runs every attempt against one endpoint, bounded by the call timeout.
    async fn try_endpoint(
        &self,
        slot: &EndpointSlot<T>,
        method: &str,
        params: &Value,
        token: Option<&CancellationToken>,
    ) -> Result<Value, RetryError<TransportError>> {
        let operation = || slot.transport.call(method, params);
        let attempts = async {
            match token {
                Some(token) => self.inner.retrier.retry_until_cancelled(operation, token).await,
                None => self.inner.retrier.retry(operation).await.map_err(RetryError::Exhausted),
            }
        };

        match self.inner.call_timeout {
            Some(call_timeout) => timeout(call_timeout, attempts)
                .await
                .unwrap_or_else(|elapsed| Err(RetryError::Exhausted(elapsed.into()))),
            None => attempts.await,
        }
    }

    /// Returns the first valid endpoint at or after the active index that this call has not
    /// `tried` yet, and makes it active.
    fn select_endpoint(&self, tried: &[bool]) -> Result<&EndpointSlot<T>, Error> {
        let start = self.inner.cursor.get();
        let Some(index) = find_valid(&self.inner.slots, start, tried) else {
            if !tried.contains(&true) {
                error!(endpoints = self.inner.slots.len(), "No valid endpoints available");
            }
            return Err(Error::NoValidEndpoints);
        };

        if index != start {
            debug!(from = start, to = index, "Skipping invalid endpoints");
            self.inner.cursor.move_from(start, index);
        }

        Ok(&self.inner.slots[index])
    }

    fn switch_to_next_endpoint(&self, from: usize) {
        let total = self.inner.slots.len();
        if total == 1 {
            warn!("Will not switch to next endpoint, no backup endpoint configured");
            return;
        }

        if self.inner.cursor.advance_from(from) {
            info!(from = from, to = (from + 1) % total, "Switched to next endpoint");
        } else {
            debug!(from = from, "Active endpoint already switched by a concurrent call");
        }
    }

    async fn ensure_network_agreed(&self) -> Result<(), Error> {
        if self.inner.agreed_network.read().is_some() {
            return Ok(());
        }
        debug!("Endpoints have not agreed on a network yet, running consensus check");
        self.detect_network_identity().await.map(|_| ())
    }

    fn check_target_network(&self, network: NetworkIdentity) -> Result<NetworkIdentity, Error> {
        match &self.inner.target_network {
            Some(target) if *target != network => {
                error!(
                    expected = %target,
                    actual = %network,
                    "Endpoints agree on a network other than the configured one"
                );
                Err(Error::NetworkMismatch { expected: target.clone(), actual: network })
            }
            _ => Ok(network),
        }
    }

    fallback_rpc!(
        /// Returns the chain id reported by the active endpoint (`eth_chainId`).
        fn get_chain_id() -> U64 = "eth_chainId"
    );

    fallback_rpc!(
        /// Returns the number of the most recent block (`eth_blockNumber`).
        fn get_block_number() -> U64 = "eth_blockNumber"
    );

    fallback_rpc!(
        /// Returns the current gas price in wei (`eth_gasPrice`).
        fn get_gas_price() -> U256 = "eth_gasPrice"
    );

    fallback_rpc!(
        /// Returns the balance of `address` at `block` (`eth_getBalance`).
        ///
        /// `block` may identify a block by hash as described in EIP-1898.
        fn get_balance(address: Address, block: BlockId) -> U256 = "eth_getBalance"
    );

    fallback_rpc!(
        /// Returns the number of transactions sent from `address` as of `block`
        /// (`eth_getTransactionCount`).
        fn get_transaction_count(address: Address, block: BlockId) -> U64 = "eth_getTransactionCount"
    );

    fallback_rpc!(
        /// Returns the code deployed at `address` as of `block` (`eth_getCode`).
        fn get_code_at(address: Address, block: BlockId) -> Bytes = "eth_getCode"
    );

    fallback_rpc!(
        /// Returns the value of storage `slot` of `address` as of `block` (`eth_getStorageAt`).
        fn get_storage_at(address: Address, slot: U256, block: BlockId) -> B256 = "eth_getStorageAt"
    );

    fallback_rpc!(
        /// Executes `tx` against the state at `block` without creating a transaction
        /// (`eth_call`).
        fn call(tx: &TransactionRequest, block: BlockId) -> Bytes = "eth_call"
    );
}
