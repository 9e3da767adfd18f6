use super::{internal_rpc, invalid_params};
use crate::types::{EscrowId, EscrowStatus};
use alloy::primitives::Address;
use thiserror::Error;

/// Errors related to the escrow lifecycle.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The escrow does not exist.
    #[error("unknown escrow {0}")]
    UnknownEscrow(EscrowId),
    /// The requested status change is not an edge of the lifecycle graph.
    ///
    /// Never auto-corrected; always surfaced to the caller.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition {
        /// Status the escrow is currently in.
        from: EscrowStatus,
        /// Status that was requested.
        to: EscrowStatus,
    },
    /// Escrow creation parameters were rejected.
    #[error("invalid escrow terms: {0}")]
    InvalidTerms(String),
    /// The caller could not be established as a party to the escrow.
    #[error("caller is not a party to this escrow")]
    Unauthorized,
    /// Approvals can only be recorded while the escrow is funded.
    #[error("approval requires a funded escrow, current status is {status}")]
    ApprovalRequiresFunding {
        /// Status the escrow is currently in.
        status: EscrowStatus,
    },
    /// A release retry was requested without approvals or an accepted
    /// settlement backing it.
    #[error("release is not authorized: dual approval or an accepted settlement is required")]
    ReleaseNotAuthorized,
    /// Recomputed vault address disagrees with the one stored at creation.
    ///
    /// Funding sent to a stale address is unrecoverable, so this is surfaced
    /// instead of trusting either value.
    #[error("stale address derivation: stored vault {stored}, derived {derived}")]
    StaleAddressDerivation {
        /// Vault address persisted at escrow creation.
        stored: Address,
        /// Vault address the current derivation parameters produce.
        derived: Address,
    },
}

impl From<LifecycleError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: LifecycleError) -> Self {
        match err {
            LifecycleError::UnknownEscrow(_)
            | LifecycleError::InvalidTransition { .. }
            | LifecycleError::InvalidTerms(_)
            | LifecycleError::Unauthorized
            | LifecycleError::ApprovalRequiresFunding { .. }
            | LifecycleError::ReleaseNotAuthorized => invalid_params(err.to_string()),
            LifecycleError::StaleAddressDerivation { .. } => internal_rpc(err.to_string()),
        }
    }
}
