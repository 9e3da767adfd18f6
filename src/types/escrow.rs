//! Escrow aggregate and lifecycle types.
//!
//! The [`Escrow`] record is the single shared mutable resource per deal. Its
//! `status` field is owned exclusively by the state machine
//! ([`crate::lifecycle::StateMachine`]); every other component requests
//! transitions instead of writing status directly.

use alloy::primitives::{Address, B256, ChainId, TxHash, keccak256, wrap_fixed_bytes};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ProposalId;

wrap_fixed_bytes! {
    /// An identifier for an escrow deal.
    ///
    /// Computed as `keccak256(salt ‖ payer ‖ recipient)` so the same deal
    /// parameters always map to the same id. Clients should treat this as an
    /// opaque value.
    pub struct EscrowId<32>;
}

impl EscrowId {
    /// Computes the escrow id from the deal parameters.
    pub fn compute(salt: B256, payer: Address, recipient: Address) -> Self {
        let mut buf = [0u8; 32 + 20 + 20];
        buf[..32].copy_from_slice(salt.as_slice());
        buf[32..52].copy_from_slice(payer.as_slice());
        buf[52..].copy_from_slice(recipient.as_slice());
        Self(keccak256(buf))
    }
}

/// Status of an escrow deal.
///
/// The allowed edges form the lifecycle graph enforced by the state machine:
///
/// ```text
/// INITIATED -> ACCEPTED -> FUNDED -> PENDING_RELEASE -> RELEASED
///     |            |          |              |
///     v            v          v              v
/// DECLINED     DECLINED   REFUNDED    RELEASE_FAILED -> PENDING_RELEASE | FUNDED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    /// Escrow created by the payer, awaiting recipient acceptance.
    Initiated,
    /// Recipient accepted the terms, awaiting funding.
    Accepted,
    /// Vault balance crossed the funding threshold.
    Funded,
    /// Both approvals collected, release transaction in flight.
    PendingRelease,
    /// Release confirmed on-chain. Terminal.
    Released,
    /// Release transaction reverted or failed to confirm. Retryable.
    ReleaseFailed,
    /// A party declined before funding. Terminal.
    Declined,
    /// Funds returned to the payer in full. Terminal.
    Refunded,
}

impl EscrowStatus {
    /// Statuses this one is allowed to transition into.
    pub const fn successors(&self) -> &'static [EscrowStatus] {
        match self {
            Self::Initiated => &[Self::Accepted, Self::Declined],
            Self::Accepted => &[Self::Funded, Self::Declined],
            Self::Funded => &[Self::PendingRelease, Self::Refunded],
            Self::PendingRelease => &[Self::Released, Self::ReleaseFailed],
            Self::ReleaseFailed => &[Self::PendingRelease, Self::Funded],
            Self::Released | Self::Declined | Self::Refunded => &[],
        }
    }

    /// Whether `target` is a legal next status.
    pub fn allows(&self, target: EscrowStatus) -> bool {
        self.successors().contains(&target)
    }

    /// Whether this status admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Whether funding has already been observed for this status.
    ///
    /// Used by the reconciler to skip escrows whose FUNDED transition has
    /// already been applied.
    pub fn is_funded_or_beyond(&self) -> bool {
        !matches!(self, Self::Initiated | Self::Accepted | Self::Declined)
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Initiated => "INITIATED",
            Self::Accepted => "ACCEPTED",
            Self::Funded => "FUNDED",
            Self::PendingRelease => "PENDING_RELEASE",
            Self::Released => "RELEASED",
            Self::ReleaseFailed => "RELEASE_FAILED",
            Self::Declined => "DECLINED",
            Self::Refunded => "REFUNDED",
        };
        f.write_str(s)
    }
}

/// The role a caller plays in an escrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyRole {
    /// The party depositing funds.
    Payer,
    /// The party receiving funds on release.
    Recipient,
}

impl PartyRole {
    /// The other side of the deal.
    pub const fn counterparty(&self) -> Self {
        match self {
            Self::Payer => Self::Recipient,
            Self::Recipient => Self::Payer,
        }
    }
}

impl std::fmt::Display for PartyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Payer => f.write_str("payer"),
            Self::Recipient => f.write_str("recipient"),
        }
    }
}

/// One side of an escrow deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    /// Email-like identity the party signed up with.
    pub identity: String,
    /// Wallet address the identity resolved to at creation time.
    pub address: Address,
}

/// The escrow aggregate.
///
/// Amounts are integer minor units (cents). Token-unit conversion happens at
/// the chain gateway edge only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Escrow {
    /// Unique escrow id.
    pub id: EscrowId,
    /// Per-deal salt used for deterministic address derivation.
    pub salt: B256,
    /// Chain the vault lives on.
    pub chain_id: ChainId,
    /// Version of the factory/vault contracts the addresses were derived for.
    pub contract_version: String,
    /// The party depositing funds.
    pub payer: Party,
    /// The party receiving funds on release.
    pub recipient: Party,
    /// Total escrowed amount in minor units.
    pub amount: u64,
    /// Platform fee in basis points, applied to the recipient leg.
    pub fee_bps: u16,
    /// Predicted vault address. Derived once at creation, never recomputed.
    pub vault: Address,
    /// Predicted fee splitter address.
    pub splitter: Address,
    /// Current lifecycle status. Written only by the state machine.
    pub status: EscrowStatus,
    /// Whether the payer approved release.
    pub payer_approved: bool,
    /// Whether the recipient approved release.
    pub recipient_approved: bool,
    /// Observed vault balance at funding time, in minor units.
    pub funded_amount: Option<u64>,
    /// When the funding threshold was first crossed.
    pub funded_at: Option<DateTime<Utc>>,
    /// Hash of the confirmed release or refund transaction.
    pub release_tx: Option<TxHash>,
    /// Amount paid to the recipient at a terminal state, net of fee.
    pub recipient_payout: Option<u64>,
    /// Platform fee taken at a terminal state.
    pub platform_fee: Option<u64>,
    /// Amount returned to the payer at a terminal state.
    pub refund_amount: Option<u64>,
    /// The active (PENDING) settlement proposal, if any.
    pub active_proposal: Option<ProposalId>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl Escrow {
    /// Platform fee in minor units for a given gross amount.
    pub fn fee_for(&self, gross: u64) -> u64 {
        (gross as u128 * self.fee_bps as u128 / 10_000) as u64
    }

    /// Net amount payable to the recipient on a full release.
    pub fn net_payable(&self) -> u64 {
        self.amount - self.fee_for(self.amount)
    }

    /// Minimum vault balance in minor units considered funded.
    ///
    /// Tolerates under-funding up to `tolerance_bps` to absorb on-ramp fee
    /// slippage and rounding; exact-match comparison would false-negative on
    /// legitimate funding.
    pub fn funding_threshold(&self, tolerance_bps: u16) -> u64 {
        (self.amount as u128 * (10_000 - tolerance_bps as u128) / 10_000) as u64
    }

    /// Amount still unsettled, in minor units.
    ///
    /// Before any release this is the full funded amount; at a terminal state
    /// it is zero.
    pub fn remaining(&self) -> u64 {
        let funded = self.funded_amount.unwrap_or(self.amount);
        let settled = self.recipient_payout.unwrap_or(0)
            + self.platform_fee.unwrap_or(0)
            + self.refund_amount.unwrap_or(0);
        funded.saturating_sub(settled)
    }

    /// The party holding the given role.
    pub fn party(&self, role: PartyRole) -> &Party {
        match role {
            PartyRole::Payer => &self.payer,
            PartyRole::Recipient => &self.recipient,
        }
    }

    /// Whether the given role has approved release.
    pub fn approved(&self, role: PartyRole) -> bool {
        match role {
            PartyRole::Payer => self.payer_approved,
            PartyRole::Recipient => self.recipient_approved,
        }
    }

    /// Whether both parties have approved release.
    pub fn both_approved(&self) -> bool {
        self.payer_approved && self.recipient_approved
    }
}

/// An entry in the append-only transition log.
///
/// The log is written before the status field is updated, so a replayed or
/// half-applied transition can be detected during reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTransition {
    /// Escrow this transition belongs to.
    pub escrow_id: EscrowId,
    /// Status before the transition.
    pub from: EscrowStatus,
    /// Status after the transition.
    pub to: EscrowStatus,
    /// Free-form context recorded with the transition.
    pub metadata: serde_json::Value,
    /// When the transition was requested.
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escrow(amount: u64, fee_bps: u16) -> Escrow {
        let now = Utc::now();
        Escrow {
            id: EscrowId::random(),
            salt: B256::random(),
            chain_id: 8453,
            contract_version: "v1".into(),
            payer: Party { identity: "payer@example.com".into(), address: Address::random() },
            recipient: Party {
                identity: "recipient@example.com".into(),
                address: Address::random(),
            },
            amount,
            fee_bps,
            vault: Address::random(),
            splitter: Address::random(),
            status: EscrowStatus::Initiated,
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
        }
    }

    #[test]
    fn fee_math() {
        let e = escrow(10_000, 199);
        assert_eq!(e.fee_for(10_000), 199);
        assert_eq!(e.net_payable(), 9_801);
        assert_eq!(e.fee_for(6_000), 119);
    }

    #[test]
    fn funding_threshold_applies_tolerance() {
        let e = escrow(10_000, 199);
        assert_eq!(e.funding_threshold(100), 9_900);
        assert_eq!(e.funding_threshold(0), 10_000);
    }

    #[test]
    fn escrow_id_is_deterministic() {
        let salt = B256::random();
        let payer = Address::random();
        let recipient = Address::random();
        assert_eq!(
            EscrowId::compute(salt, payer, recipient),
            EscrowId::compute(salt, payer, recipient)
        );
        assert_ne!(
            EscrowId::compute(salt, payer, recipient),
            EscrowId::compute(salt, recipient, payer)
        );
    }

    #[test]
    fn terminal_states_have_no_successors() {
        for status in [EscrowStatus::Released, EscrowStatus::Declined, EscrowStatus::Refunded] {
            assert!(status.is_terminal());
            assert!(status.successors().is_empty());
        }
        assert!(!EscrowStatus::ReleaseFailed.is_terminal());
    }
}
