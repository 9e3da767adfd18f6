//! Chain access for the escrow coordinator.
//!
//! The coordinator talks to the chain only through the [`ChainService`]
//! trait: point-in-time balance reads, release submission, and explicit
//! confirmation waits. Balance reads give no read-your-writes guarantee after
//! a submitted transaction; confirmation must be awaited.

use crate::error::ChainError;
use alloy::primitives::{Address, TxHash, U256};
use async_trait::async_trait;
use std::fmt::Debug;

mod contracts;
pub use contracts::{IERC20, IEscrowVault};

mod gateway;
pub use gateway::ChainGateway;

/// A request to move escrowed funds out of a vault.
///
/// Amounts are token units; the conversion from minor units happens before
/// this struct is built, at [`minor_units_to_token`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInstruction {
    /// Vault holding the escrowed funds.
    pub vault: Address,
    /// Recipient of the released leg. Funds route through the fee splitter.
    pub recipient: Address,
    /// Gross token amount for the recipient leg.
    pub recipient_units: U256,
    /// Payer receiving the refunded leg.
    pub payer: Address,
    /// Token amount refunded to the payer.
    pub refund_units: U256,
}

/// Chain access used by the funding reconciler and release coordinator.
///
/// Holds no business state. Implementations bound every call with a timeout
/// so a stalled endpoint cannot hang a coordinating operation.
#[async_trait]
pub trait ChainService: Debug + Send + Sync {
    /// Point-in-time token balance of `holder`.
    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, ChainError>;

    /// Submits a release transaction and returns its hash without awaiting
    /// inclusion.
    async fn submit_release(&self, release: &ReleaseInstruction) -> Result<TxHash, ChainError>;

    /// Awaits confirmation of a submitted transaction.
    ///
    /// There is no cancellation of an in-flight transaction; the only
    /// recourse after submission is to await the receipt and branch on the
    /// outcome.
    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<(), ChainError>;
}

/// Converts a token-unit balance to integer minor units (cents), flooring.
///
/// Saturates instead of overflowing on absurdly large balances; anything past
/// `u64::MAX` cents is far beyond any legitimate escrow.
pub fn token_units_to_minor(units: U256, token_decimals: u8) -> u64 {
    let converted = if token_decimals >= 2 {
        units / U256::from(10u64).pow(U256::from(token_decimals - 2))
    } else {
        units * U256::from(10u64).pow(U256::from(2 - token_decimals))
    };
    converted.saturating_to::<u64>()
}

/// Converts integer minor units (cents) to token units.
pub fn minor_units_to_token(minor: u64, token_decimals: u8) -> U256 {
    if token_decimals >= 2 {
        U256::from(minor) * U256::from(10u64).pow(U256::from(token_decimals - 2))
    } else {
        U256::from(minor) / U256::from(10u64).pow(U256::from(2 - token_decimals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usdc_units_round_trip() {
        // 100 USDC with 6 decimals == 10_000 cents
        assert_eq!(token_units_to_minor(U256::from(100_000_000u64), 6), 10_000);
        assert_eq!(minor_units_to_token(10_000, 6), U256::from(100_000_000u64));
    }

    #[test]
    fn sub_cent_dust_floors() {
        // 99.999999 USDC floors to 9_999 cents, below a 10_000 cent target
        assert_eq!(token_units_to_minor(U256::from(99_999_999u64), 6), 9_999);
    }

    #[test]
    fn two_decimal_token_is_identity() {
        assert_eq!(token_units_to_minor(U256::from(12_345u64), 2), 12_345);
        assert_eq!(minor_units_to_token(12_345, 2), U256::from(12_345u64));
    }

    #[test]
    fn oversized_balance_saturates() {
        assert_eq!(token_units_to_minor(U256::MAX, 6), u64::MAX);
    }
}
