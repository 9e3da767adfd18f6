//! Deterministic vault and splitter address derivation.
//!
//! Funds are sent to the vault address before any code is deployed there, so
//! derivation is a pure CREATE2 formula over (salt, payer, recipient) and the
//! configured factory. Addresses are computed and persisted once at escrow
//! creation; recomputation is only used to audit for parameter drift.

use crate::{config::ContractsConfig, error::LifecycleError, types::Escrow};
use alloy::primitives::{Address, B256, keccak256};

/// Domain separator mixed into the splitter salt so the vault and splitter
/// never collide even with identical init code hashes.
const SPLITTER_DOMAIN: &[u8] = b"escrowd/splitter";

/// Addresses derived for one deal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivedAddresses {
    /// The per-deal vault holding escrowed funds.
    pub vault: Address,
    /// The contract dividing released funds between recipient and platform.
    pub splitter: Address,
}

/// Derives vault and splitter addresses for escrow deals.
#[derive(Debug, Clone)]
pub struct VaultDirectory {
    factory: Address,
    vault_code_hash: B256,
    splitter_code_hash: B256,
}

impl VaultDirectory {
    /// Creates a directory bound to the configured factory and contract
    /// version.
    pub fn new(contracts: &ContractsConfig) -> Self {
        Self {
            factory: contracts.factory,
            vault_code_hash: contracts.vault_code_hash,
            splitter_code_hash: contracts.splitter_code_hash,
        }
    }

    /// Derives the (vault, splitter) pair for a deal.
    ///
    /// Pure over its inputs: identical parameters always produce identical
    /// addresses, deployed or not. The salt always includes both party
    /// addresses; a salt-only formula is not supported.
    pub fn derive(&self, salt: B256, payer: Address, recipient: Address) -> DerivedAddresses {
        let mut buf = Vec::with_capacity(32 + 20 + 20);
        buf.extend_from_slice(salt.as_slice());
        buf.extend_from_slice(payer.as_slice());
        buf.extend_from_slice(recipient.as_slice());
        let vault_salt = keccak256(&buf);

        let mut splitter_buf = Vec::with_capacity(32 + SPLITTER_DOMAIN.len());
        splitter_buf.extend_from_slice(vault_salt.as_slice());
        splitter_buf.extend_from_slice(SPLITTER_DOMAIN);
        let splitter_salt = keccak256(&splitter_buf);

        DerivedAddresses {
            vault: self.factory.create2(vault_salt, self.vault_code_hash),
            splitter: self.factory.create2(splitter_salt, self.splitter_code_hash),
        }
    }

    /// Audits a stored escrow against the current derivation parameters.
    ///
    /// A mismatch means the derivation inputs drifted since creation; the
    /// stored address stays authoritative and the drift is surfaced instead
    /// of silently recomputed.
    pub fn verify(&self, escrow: &Escrow) -> Result<(), LifecycleError> {
        let derived = self.derive(escrow.salt, escrow.payer.address, escrow.recipient.address);
        if derived.vault != escrow.vault || derived.splitter != escrow.splitter {
            return Err(LifecycleError::StaleAddressDerivation {
                stored: escrow.vault,
                derived: derived.vault,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContractsConfig;

    fn directory() -> VaultDirectory {
        VaultDirectory::new(&ContractsConfig {
            factory: Address::repeat_byte(0x11),
            vault_code_hash: B256::repeat_byte(0x22),
            splitter_code_hash: B256::repeat_byte(0x33),
            version: "v1".into(),
        })
    }

    #[test]
    fn derivation_is_deterministic() {
        let dir = directory();
        let salt = B256::random();
        let payer = Address::random();
        let recipient = Address::random();

        let first = dir.derive(salt, payer, recipient);
        let second = dir.derive(salt, payer, recipient);
        assert_eq!(first, second);
        assert_ne!(first.vault, first.splitter);
    }

    #[test]
    fn derivation_depends_on_all_inputs() {
        let dir = directory();
        let salt = B256::random();
        let payer = Address::random();
        let recipient = Address::random();

        let base = dir.derive(salt, payer, recipient);
        assert_ne!(base, dir.derive(B256::random(), payer, recipient));
        assert_ne!(base, dir.derive(salt, recipient, payer));
    }

    #[test]
    fn verify_flags_parameter_drift() {
        let dir = directory();
        let drifted = VaultDirectory::new(&ContractsConfig {
            factory: Address::repeat_byte(0x99),
            vault_code_hash: B256::repeat_byte(0x22),
            splitter_code_hash: B256::repeat_byte(0x33),
            version: "v2".into(),
        });

        let salt = B256::random();
        let payer = Address::random();
        let recipient = Address::random();
        let addresses = dir.derive(salt, payer, recipient);

        let now = chrono::Utc::now();
        let escrow = Escrow {
            id: crate::types::EscrowId::compute(salt, payer, recipient),
            salt,
            chain_id: 8453,
            contract_version: "v1".into(),
            payer: crate::types::Party { identity: "p@x.com".into(), address: payer },
            recipient: crate::types::Party { identity: "r@x.com".into(), address: recipient },
            amount: 10_000,
            fee_bps: 199,
            vault: addresses.vault,
            splitter: addresses.splitter,
            status: crate::types::EscrowStatus::Initiated,
            payer_approved: false,
            recipient_approved: false,
            funded_amount: None,
            funded_at: None,
            release_tx: None,
            recipient_payout: None,
            platform_fee: None,
            refund_amount: None,
            active_proposal: None,
            created_at: now,
            updated_at: now,
        };

        assert!(dir.verify(&escrow).is_ok());
        assert!(matches!(
            drifted.verify(&escrow),
            Err(LifecycleError::StaleAddressDerivation { .. })
        ));
    }
}
