use super::{internal_rpc, invalid_params};
use crate::types::{EscrowId, EscrowStatus};

/// Errors returned by [`EscrowStorage`](crate::storage::EscrowStorage).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// An escrow with this id already exists.
    #[error("escrow {0} already exists")]
    EscrowAlreadyExists(EscrowId),
    /// A conditional status update lost the race.
    ///
    /// The caller observed `expected` but the row now holds `actual`; the
    /// transition must be re-read and re-validated, never force-applied.
    #[error("status conflict on escrow {escrow_id}: expected {expected}, found {actual}")]
    StatusConflict {
        /// Escrow whose update conflicted.
        escrow_id: EscrowId,
        /// Status the caller based its update on.
        expected: EscrowStatus,
        /// Status the row actually holds.
        actual: EscrowStatus,
    },
    /// The escrow row is missing.
    #[error("escrow {0} not found")]
    EscrowNotFound(EscrowId),
    /// A deserialization error occurred.
    #[error("a deserialization error occurred")]
    SerdeError(#[from] serde_json::Error),
    /// An internal error occurred.
    #[error("an internal error occurred")]
    InternalError(#[from] eyre::Error),
}

impl From<StorageError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::EscrowAlreadyExists(..)
            | StorageError::StatusConflict { .. }
            | StorageError::EscrowNotFound(..) => invalid_params(err.to_string()),
            StorageError::SerdeError(..) | StorageError::InternalError(..) => {
                internal_rpc("an internal error occurred")
            }
        }
    }
}
