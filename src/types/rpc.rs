//! RPC request and response types for the `escrow_` namespace.
//!
//! Amounts cross this boundary as integer minor units (cents); token-unit
//! conversion never leaks past the chain gateway.

use alloy::primitives::TxHash;
use serde::{Deserialize, Serialize};

use crate::types::{Escrow, EscrowStatus, PartyRole, ProposalId, StatusTransition};

/// Request parameters for `escrow_create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEscrowParameters {
    /// Identity of the paying party.
    pub payer: String,
    /// Identity of the receiving party.
    pub recipient: String,
    /// Total escrow amount in minor units.
    pub amount: u64,
}

/// Response for `escrow_create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEscrowResponse {
    /// The created escrow record, including the predicted vault address the
    /// payer should fund.
    #[serde(flatten)]
    pub escrow: Escrow,
    /// Platform fee taken on full release, in minor units.
    pub platform_fee: u64,
    /// Net amount payable to the recipient on full release, in minor units.
    pub net_payable: u64,
}

/// Response for `escrow_checkFunding`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingStatusResponse {
    /// Whether the vault balance has crossed the funding threshold.
    pub funded: bool,
    /// Observed vault balance in minor units.
    pub balance: u64,
    /// Current escrow status.
    pub status: EscrowStatus,
    /// Human-readable summary of the funding state.
    pub message: String,
}

/// Response for `escrow_recordApproval` and `escrow_retryRelease`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    /// Whether the release transaction was confirmed as part of this call.
    pub released: bool,
    /// Whether the payer has approved.
    pub payer_approved: bool,
    /// Whether the recipient has approved.
    pub recipient_approved: bool,
    /// Current escrow status.
    pub status: EscrowStatus,
    /// Hash of the confirmed release transaction, if any.
    pub release_tx: Option<TxHash>,
}

/// Request parameters for `escrow_proposeSettlement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeSettlementParameters {
    /// Role of the proposing party.
    pub role: PartyRole,
    /// Gross amount the recipient would receive, in minor units.
    pub recipient_amount: u64,
    /// Optional reason shown to the counterparty.
    pub reason: Option<String>,
}

/// Response for `escrow_proposeSettlement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposeSettlementResponse {
    /// Id of the newly created proposal.
    pub proposal_id: ProposalId,
    /// Gross amount the recipient gets under this proposal.
    pub recipient_gets: u64,
    /// Amount the payer gets back under this proposal.
    pub payer_gets_back: u64,
    /// Unsettled amount the proposal was validated against.
    pub remaining: u64,
}

/// Request parameters for `escrow_respondSettlement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondSettlementParameters {
    /// Role of the responding party.
    pub role: PartyRole,
    /// Whether the proposal is accepted.
    pub accept: bool,
    /// Optional reason, recorded alongside a rejection.
    pub reason: Option<String>,
}

/// Response for `escrow_respondSettlement`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondSettlementResponse {
    /// Escrow status after the response was processed.
    pub status: EscrowStatus,
}

/// Response for `escrow_get`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscrowWithHistory {
    /// The escrow record.
    #[serde(flatten)]
    pub escrow: Escrow,
    /// Append-only transition history, oldest first.
    pub history: Vec<StatusTransition>,
}
