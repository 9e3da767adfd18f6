use super::invalid_params;
use crate::types::{EscrowStatus, ProposalId};
use thiserror::Error;

/// Errors related to settlement negotiation.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// The proposed recipient amount is outside the unsettled balance.
    #[error("invalid settlement amount {requested}, remaining balance is {remaining}")]
    InvalidAmount {
        /// Amount the proposer asked for.
        requested: u64,
        /// Unsettled balance available for splitting.
        remaining: u64,
    },
    /// A proposer attempted to accept their own proposal.
    #[error("cannot accept own settlement proposal")]
    CannotAcceptOwnProposal,
    /// There is no pending proposal to respond to.
    #[error("escrow has no pending settlement proposal")]
    NoActiveProposal,
    /// The pending proposal passed its expiry deadline before a response.
    #[error("settlement proposal {0} expired")]
    ProposalExpired(ProposalId),
    /// Settlements can only be negotiated on a funded escrow.
    #[error("settlement requires a funded escrow, current status is {status}")]
    EscrowNotOpen {
        /// Status the escrow is currently in.
        status: EscrowStatus,
    },
}

impl From<SettlementError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: SettlementError) -> Self {
        invalid_params(err.to_string())
    }
}
