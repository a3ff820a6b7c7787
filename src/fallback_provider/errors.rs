//! Error types for fallback provider operations.
//!
//! This module provides:
//! * [`TransportError`], the failure of a single request against a single endpoint
//! * [`enum@Error`], the failures surfaced to callers of [`super::FallbackProvider`]
//! * [`EndpointFailure`], the per-endpoint diagnostics carried by [`Error::AllEndpointsFailed`]
//!
//! Transport errors are transient by nature: they are retried with backoff and then absorbed by
//! failover. Only exhaustion-level and configuration-level failures reach the caller.

use std::{fmt, sync::Arc};

use alloy::transports::{RpcError, TransportErrorKind};
use thiserror::Error;
use tokio::time::error as TokioError;

use super::network::NetworkIdentity;

/// A single request against a single endpoint failed.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// The endpoint did not answer within the configured call timeout.
    #[error("Request timed out")]
    Timeout,

    /// The underlying JSON-RPC transport failed (connection, HTTP status, error response or a
    /// malformed payload).
    #[error("{0}")]
    Rpc(Arc<RpcError<TransportErrorKind>>),
}

impl TransportError {
    /// Creates a transport error from a free-form message.
    #[must_use]
    pub fn custom(message: impl AsRef<str>) -> Self {
        TransportError::Rpc(Arc::new(TransportErrorKind::custom_str(message.as_ref())))
    }
}

impl From<RpcError<TransportErrorKind>> for TransportError {
    fn from(err: RpcError<TransportErrorKind>) -> Self {
        TransportError::Rpc(Arc::new(err))
    }
}

impl From<TokioError::Elapsed> for TransportError {
    fn from(_: TokioError::Elapsed) -> Self {
        TransportError::Timeout
    }
}

/// The last error observed on one endpoint before the provider moved on.
#[derive(Debug, Clone)]
pub struct EndpointFailure {
    /// Ordinal index of the endpoint in the configured list.
    pub index: usize,
    /// URL of the endpoint.
    pub url: String,
    /// Error returned by the final retry against the endpoint.
    pub error: TransportError,
}

impl fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint #{} ({}): {}", self.index, self.url, self.error)
    }
}

/// Errors that can occur when using [`super::FallbackProvider`].
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The provider configuration was rejected before any network activity took place.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// No endpoint is currently marked valid.
    ///
    /// Either every endpoint failed its network identity query, or the configured endpoints
    /// need to be checked again with [`super::FallbackProvider::detect_network_identity`].
    #[error("No valid endpoints (all fallback endpoints unreachable)")]
    NoValidEndpoints,

    /// Two reachable endpoints (or an endpoint and the configured network) disagree on the
    /// network they serve.
    #[error("Endpoint networks mismatch: expected {expected}, got {actual}")]
    NetworkMismatch {
        /// The identity every endpoint was compared against.
        expected: NetworkIdentity,
        /// The first identity that differed from `expected`.
        actual: NetworkIdentity,
    },

    /// Every attempted endpoint exhausted its retries.
    #[error(
        "{method} failed on all {attempted} attempted endpoint(s); last error: {}",
        describe_last(.failures)
    )]
    AllEndpointsFailed {
        /// The JSON-RPC method that was performed.
        method: String,
        /// Number of failover attempts made.
        attempted: usize,
        /// The last error of each attempt, in the order they were made.
        failures: Vec<EndpointFailure>,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// An endpoint answered, but its result could not be decoded into the expected type.
    #[error("Invalid response to {method}: {source}")]
    InvalidResponse {
        /// The JSON-RPC method that was performed.
        method: String,
        /// The decoding failure.
        source: Arc<serde_json::Error>,
    },
}

impl Error {
    /// Returns the last underlying transport error, if this error carries any.
    #[must_use]
    pub fn last_transport_error(&self) -> Option<&TransportError> {
        match self {
            Error::AllEndpointsFailed { failures, .. } => failures.last().map(|f| &f.error),
            _ => None,
        }
    }
}

fn describe_last(failures: &[EndpointFailure]) -> String {
    failures.last().map_or_else(|| "none recorded".to_owned(), ToString::to_string)
}
