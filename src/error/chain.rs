use super::internal_rpc;
use alloy::primitives::TxHash;
use thiserror::Error;

/// Errors related to chain connectivity and release execution.
#[derive(Debug, Error)]
pub enum ChainError {
    /// All configured RPC endpoints failed. Retryable after backoff.
    #[error("all {attempted} rpc endpoints failed, last error: {last_error}")]
    Unavailable {
        /// Number of endpoints that were tried.
        attempted: usize,
        /// Error returned by the last endpoint.
        last_error: String,
    },
    /// The release or refund transaction reverted or failed to confirm.
    ///
    /// The escrow is moved to RELEASE_FAILED, a retryable state.
    #[error("release execution failed{}: {reason}", tx_hash.map(|h| format!(" (tx {h})")).unwrap_or_default())]
    ReleaseExecutionFailed {
        /// Hash of the failed transaction, if it was submitted.
        tx_hash: Option<TxHash>,
        /// Why the release failed.
        reason: String,
    },
    /// The transaction was submitted but no receipt arrived within the
    /// confirmation budget.
    #[error("transaction {0} not confirmed within the timeout")]
    ConfirmationTimeout(TxHash),
}

impl From<ChainError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: ChainError) -> Self {
        internal_rpc(err.to_string())
    }
}
