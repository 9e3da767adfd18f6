//! Settlement proposal types.

use alloy::primitives::wrap_fixed_bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EscrowId, PartyRole};

wrap_fixed_bytes! {
    /// An identifier for a settlement proposal.
    pub struct ProposalId<32>;
}

/// Status of a settlement proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    /// Awaiting the counterparty's response.
    Pending,
    /// Counterparty accepted; release with the proposed split was triggered.
    Accepted,
    /// Counterparty rejected; the escrow stays funded.
    Rejected,
    /// Superseded by a newer proposal, or expired.
    Cancelled,
}

impl ProposalStatus {
    /// Whether the proposal can still be responded to.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A party-initiated offer to split the remaining escrowed funds other than
/// the default 100%/0%.
///
/// At most one PENDING proposal exists per escrow; creating a new one cancels
/// the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementProposal {
    /// Unique proposal id.
    pub id: ProposalId,
    /// Escrow this proposal belongs to.
    pub escrow_id: EscrowId,
    /// Which party created the proposal.
    pub proposer: PartyRole,
    /// Gross amount the recipient would receive, in minor units.
    ///
    /// The platform fee is taken out of this leg at release time.
    pub recipient_amount: u64,
    /// Amount returned to the payer, in minor units.
    pub refund_amount: u64,
    /// Optional free-form reason given by the proposer.
    pub reason: Option<String>,
    /// Current status.
    pub status: ProposalStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Lazy expiry deadline; checked when the counterparty responds.
    pub expires_at: DateTime<Utc>,
    /// When the proposal reached a terminal status.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl SettlementProposal {
    /// Whether the proposal has passed its expiry deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_is_lazy_deadline_check() {
        let now = Utc::now();
        let proposal = SettlementProposal {
            id: ProposalId::random(),
            escrow_id: EscrowId::random(),
            proposer: PartyRole::Payer,
            recipient_amount: 6_000,
            refund_amount: 4_000,
            reason: None,
            status: ProposalStatus::Pending,
            created_at: now,
            expires_at: now + Duration::hours(72),
            resolved_at: None,
        };
        assert!(!proposal.is_expired(now + Duration::hours(71)));
        assert!(proposal.is_expired(now + Duration::hours(73)));
    }
}
