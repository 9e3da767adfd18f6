//! Identity to wallet-address resolution.
//!
//! The coordinator treats wallet provisioning as an opaque call: an
//! email-like identity resolves to an address, lazily created by the
//! provisioning service if needed.

use alloy::primitives::{Address, keccak256};
use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt::Debug;

/// Resolves party identities to wallet addresses.
#[async_trait]
pub trait WalletDirectory: Debug + Send + Sync {
    /// Resolves (or lazily provisions) the wallet address for an identity.
    async fn resolve_address(&self, identity: &str) -> eyre::Result<Address>;
}

/// [`WalletDirectory`] over a fixed registration map, with deterministic
/// lazy provisioning for unregistered identities.
///
/// Provisioned addresses are derived from the identity hash so repeated
/// resolution is stable across calls, mirroring how the real provisioning
/// service always hands the same wallet back to the same identity.
#[derive(Debug, Default)]
pub struct StaticWalletDirectory {
    registered: DashMap<String, Address>,
}

impl StaticWalletDirectory {
    /// Registers a known identity-address binding.
    pub fn register(&self, identity: impl Into<String>, address: Address) {
        self.registered.insert(identity.into(), address);
    }
}

#[async_trait]
impl WalletDirectory for StaticWalletDirectory {
    async fn resolve_address(&self, identity: &str) -> eyre::Result<Address> {
        if let Some(address) = self.registered.get(identity) {
            return Ok(*address);
        }
        let address = Address::from_slice(&keccak256(identity.as_bytes())[12..]);
        self.registered.insert(identity.to_string(), address);
        Ok(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolution_is_stable() {
        let directory = StaticWalletDirectory::default();
        let first = directory.resolve_address("alice@example.com").await.unwrap();
        let second = directory.resolve_address("alice@example.com").await.unwrap();
        assert_eq!(first, second);
        assert_ne!(first, directory.resolve_address("bob@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn registered_addresses_win() {
        let directory = StaticWalletDirectory::default();
        let wallet = Address::random();
        directory.register("alice@example.com", wallet);
        assert_eq!(directory.resolve_address("alice@example.com").await.unwrap(), wallet);
    }
}
