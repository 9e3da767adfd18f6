//! Escrow coordinator constants.

use std::time::Duration;

/// Default platform fee in basis points (1.99%).
pub const DEFAULT_FEE_BPS: u16 = 199;

/// Default under-funding tolerance in basis points (1%).
///
/// A vault balance within this band of the expected amount still counts as
/// funded, absorbing on-ramp fee slippage and rounding.
pub const DEFAULT_FUNDING_TOLERANCE_BPS: u16 = 100;

/// Default lifetime of a pending settlement proposal.
pub const DEFAULT_PROPOSAL_TTL: Duration = Duration::from_secs(72 * 60 * 60);

/// Default per-call timeout for a single RPC endpoint before failover.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(7);

/// Default budget for awaiting a release transaction receipt.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of confirmations required on a release transaction.
pub const DEFAULT_MIN_CONFIRMATIONS: u64 = 1;

/// Default number of decimals of the escrow token (USDC).
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

/// Default maximum number of concurrent RPC connections.
pub const DEFAULT_RPC_MAX_CONNECTIONS: u32 = 500;
