//! Escrow coordinator error types.
use core::fmt;
use jsonrpsee::core::RpcResult;
use thiserror::Error;

mod lifecycle;
pub use lifecycle::LifecycleError;

mod settlement;
pub use settlement::SettlementError;

mod chain;
pub use chain::ChainError;

mod storage;
pub use storage::StorageError;

/// The overarching error type returned by escrow operations.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// Errors related to lifecycle transitions and party authorization.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// Errors related to settlement negotiation.
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    /// Errors related to chain connectivity and release execution.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// Errors related to storage.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// An internal error occurred.
    #[error(transparent)]
    Internal(#[from] eyre::Error),
}

impl From<EscrowError> for jsonrpsee::types::error::ErrorObject<'static> {
    fn from(err: EscrowError) -> Self {
        match err {
            EscrowError::Lifecycle(inner) => inner.into(),
            EscrowError::Settlement(inner) => inner.into(),
            EscrowError::Chain(inner) => inner.into(),
            EscrowError::Storage(inner) => inner.into(),
            EscrowError::Internal(_) => internal_rpc(err),
        }
    }
}

/// A helper trait to provide an RPC error code.
pub trait ToRpcResult<Ok, Err>: Sized {
    /// Converts result to [`RpcResult`] by converting error variant to
    /// [`jsonrpsee::types::error::ErrorObject`]
    fn to_rpc_result(self) -> RpcResult<Ok>
    where
        Err: fmt::Display;
}

macro_rules! impl_error_helpers {
    ($err:ty) => {
        impl<Ok> ToRpcResult<Ok, $err> for Result<Ok, $err> {
            fn to_rpc_result(self) -> RpcResult<Ok> {
                self.map_err(|err| err.into())
            }
        }

        impl From<$err> for String {
            fn from(err: $err) -> Self {
                err.to_string()
            }
        }
    };
}

impl_error_helpers!(EscrowError);
impl_error_helpers!(LifecycleError);
impl_error_helpers!(SettlementError);
impl_error_helpers!(ChainError);
impl_error_helpers!(StorageError);

/// Constructs an invalid params JSON-RPC error.
fn invalid_params(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INVALID_PARAMS_CODE, msg)
}

/// Constructs an internal JSON-RPC error.
fn internal_rpc(msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    rpc_err(jsonrpsee::types::error::INTERNAL_ERROR_CODE, msg)
}

/// Constructs a JSON-RPC error with `code` and `message`.
fn rpc_err(code: i32, msg: impl Into<String>) -> jsonrpsee::types::error::ErrorObject<'static> {
    jsonrpsee::types::error::ErrorObject::owned(code, msg.into(), None::<()>)
}
