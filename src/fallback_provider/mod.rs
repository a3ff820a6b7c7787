//! Retrying, failing-over JSON-RPC provider over several node endpoints.
//!
//! This module exposes [`FallbackProvider`], which adds on top of a set of single-endpoint
//! [`Transport`]s:
//! * exponential backoff retries per endpoint ([`Retrier`])
//! * deterministic round-robin failover between endpoints
//! * a network consensus check that only trusts endpoints agreeing on the same
//!   [`NetworkIdentity`]
//!
//! Use [`FallbackProviderBuilder`] to construct a provider over HTTP endpoints, or
//! [`FallbackProviderBuilder::build_with_transports`] to supply custom transports.
//!
//! # How it works
//!
//! Before the first call every endpoint is asked for its network identity concurrently.
//! Endpoints that fail to answer are marked invalid; endpoints that answer must all agree.
//! Calls then go to the active valid endpoint and are retried with exponential backoff up to
//! `max_retries`. When the retries are exhausted the active index advances to the next valid
//! endpoint, wrapping around, until every endpoint has had one turn.

pub mod builder;
mod consensus;
pub mod endpoint;
pub mod errors;
pub mod network;
pub mod provider;
pub mod retrier;
mod state;
pub mod transport;

pub use builder::*;
pub use endpoint::{Connection, Endpoint};
pub use errors::{EndpointFailure, Error, TransportError};
pub use network::{NetworkIdentity, UNKNOWN_NETWORK_NAME};
pub use provider::FallbackProvider;
pub use retrier::{Retrier, RetryError};
pub use state::EndpointStatus;
pub use transport::{HttpTransport, Transport};
