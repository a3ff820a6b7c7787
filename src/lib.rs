//! Fallback JSON-RPC provider for EVM node endpoints.
//!
//! The main entry point is [`FallbackProvider`], built via [`FallbackProviderBuilder`] from one
//! or more node endpoints. Every call made through [`FallbackProvider::perform`] is retried with
//! exponential backoff against the active endpoint, and once those retries are exhausted the
//! provider fails over to the next valid endpoint in round-robin order.
//!
//! # Network consensus
//!
//! Endpoints are not trusted until they agree on the network they serve. Before the first call
//! (or whenever [`FallbackProvider::detect_network_identity`] is invoked) every endpoint is asked
//! for its [`NetworkIdentity`] concurrently. Unreachable endpoints are marked invalid and skipped
//! by failover; reachable endpoints that disagree abort with [`Error::NetworkMismatch`].
//!
//! # Example
//!
//! ```rust,no_run
//! use fallback_provider::{Endpoint, FallbackProviderBuilder};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), fallback_provider::Error> {
//! let provider = FallbackProviderBuilder::new()
//!     .endpoint("https://ethereum-rpc.publicnode.com")
//!     .endpoint(Endpoint::connection("https://eth.example.org").bearer_auth("secret"))
//!     .max_retries(2)
//!     .build()?;
//!
//! let network = provider.detect_network_identity().await?;
//! println!("connected to {network}");
//!
//! let block = provider.perform("eth_blockNumber", json!([])).await?;
//! println!("latest block: {block}");
//! # Ok(()) }
//! ```

#[macro_use]
mod macros;

pub mod fallback_provider;

pub use fallback_provider::*;
