//! Network identity reported by an endpoint.

use std::fmt;

use alloy::primitives::{Address, address};
use alloy_chains::{Chain, NamedChain};
use serde::{Deserialize, Serialize};

/// ENS registry deployment shared by every chain that hosts the canonical registry.
const ENS_REGISTRY: Address = address!("0x00000000000C2E074eC69A0dFb2997BA6C7d2e1e");

/// Name reported for chain ids that are not known to `alloy-chains`.
pub const UNKNOWN_NETWORK_NAME: &str = "unknown";

/// Identifies which blockchain network an endpoint serves.
///
/// Two identities are equal when their names and chain ids match and their registry addresses
/// are either equal or both absent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIdentity {
    /// Human readable network name, e.g. `mainnet`.
    pub name: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Address of the name registry deployed on this network, if any.
    #[serde(default, alias = "ensAddress")]
    pub registry: Option<Address>,
}

impl NetworkIdentity {
    /// Creates an identity from its parts.
    #[must_use]
    pub fn new(name: impl Into<String>, chain_id: u64, registry: Option<Address>) -> Self {
        Self { name: name.into(), chain_id, registry }
    }

    /// Builds the identity of a chain from its id alone.
    ///
    /// The name is resolved from the list of known chains and the registry address is filled
    /// in for chains with a canonical ENS deployment.
    #[must_use]
    pub fn from_chain_id(chain_id: u64) -> Self {
        let named = Chain::from_id(chain_id).named();
        let name = named.map_or_else(|| UNKNOWN_NETWORK_NAME.to_owned(), |n| n.to_string());
        let registry = named.and_then(ens_registry);
        Self { name, chain_id, registry }
    }
}

impl fmt::Display for NetworkIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (chain id {})", self.name, self.chain_id)?;
        if let Some(registry) = self.registry {
            write!(f, " registry {registry}")?;
        }
        Ok(())
    }
}

fn ens_registry(chain: NamedChain) -> Option<Address> {
    match chain {
        NamedChain::Mainnet | NamedChain::Goerli | NamedChain::Sepolia | NamedChain::Holesky => {
            Some(ENS_REGISTRY)
        }
        _ => None,
    }
}
