//! # Escrow RPC
//!
//! Implementation of the `escrow_` namespace:
//!
//! - `escrow_create`, `escrow_accept`, `escrow_decline` for the pre-funding
//!   lifecycle.
//! - `escrow_checkFunding` as the idempotent reconciliation tick.
//! - `escrow_recordApproval` and `escrow_retryRelease` for the dual-approval
//!   release path.
//! - `escrow_proposeSettlement` and `escrow_respondSettlement` for negotiated
//!   splits.
//! - `escrow_get` for the record plus its transition history.

use crate::{
    chain::ChainService,
    config::EscrowConfig,
    directory::VaultDirectory,
    error::{EscrowError, LifecycleError, ToRpcResult},
    funding::FundingReconciler,
    identity::WalletDirectory,
    lifecycle::StateMachine,
    metrics::EscrowMetrics,
    notify::{EscrowEvent, Notifier, notify_or_log},
    release::ApprovalCoordinator,
    settlement::SettlementNegotiator,
    storage::{EscrowStorage, StorageApi},
    types::{
        Escrow, EscrowId, EscrowStatus, Party, PartyRole,
        rpc::{
            ApprovalResponse, CreateEscrowParameters, CreateEscrowResponse, EscrowWithHistory,
            FundingStatusResponse, ProposeSettlementParameters, ProposeSettlementResponse,
            RespondSettlementParameters, RespondSettlementResponse,
        },
    },
};
use alloy::primitives::{B256, ChainId};
use chrono::Utc;
use jsonrpsee::{
    core::{RpcResult, async_trait},
    proc_macros::rpc,
};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// `escrow_` RPC namespace.
#[rpc(server, client, namespace = "escrow")]
pub trait EscrowApi {
    /// Creates an escrow between two parties, deriving and persisting the
    /// vault address the payer should fund.
    #[method(name = "create")]
    async fn create(&self, parameters: CreateEscrowParameters) -> RpcResult<CreateEscrowResponse>;

    /// Accepts the escrow terms. Recipient only.
    #[method(name = "accept")]
    async fn accept(&self, escrow_id: EscrowId, role: PartyRole) -> RpcResult<EscrowStatus>;

    /// Declines the escrow before funding.
    #[method(name = "decline")]
    async fn decline(
        &self,
        escrow_id: EscrowId,
        role: PartyRole,
        reason: Option<String>,
    ) -> RpcResult<EscrowStatus>;

    /// Reconciles the stored escrow against the live vault balance, applying
    /// the FUNDED transition exactly once. Idempotent; safe to invoke from
    /// any external trigger at any time.
    #[method(name = "checkFunding")]
    async fn check_funding(&self, escrow_id: EscrowId) -> RpcResult<FundingStatusResponse>;

    /// Records a party's release approval; executes the release when both
    /// approvals are in.
    #[method(name = "recordApproval")]
    async fn record_approval(
        &self,
        escrow_id: EscrowId,
        role: PartyRole,
    ) -> RpcResult<ApprovalResponse>;

    /// Retries a failed release without re-collecting approvals.
    #[method(name = "retryRelease")]
    async fn retry_release(&self, escrow_id: EscrowId) -> RpcResult<ApprovalResponse>;

    /// Proposes a settlement split of the remaining funds, superseding any
    /// pending proposal.
    #[method(name = "proposeSettlement")]
    async fn propose_settlement(
        &self,
        escrow_id: EscrowId,
        parameters: ProposeSettlementParameters,
    ) -> RpcResult<ProposeSettlementResponse>;

    /// Accepts or rejects the pending settlement proposal.
    #[method(name = "respondSettlement")]
    async fn respond_settlement(
        &self,
        escrow_id: EscrowId,
        parameters: RespondSettlementParameters,
    ) -> RpcResult<RespondSettlementResponse>;

    /// Returns the escrow record and its transition history.
    #[method(name = "get")]
    async fn get(&self, escrow_id: EscrowId) -> RpcResult<EscrowWithHistory>;
}

/// Implementation of the `escrow_` namespace.
#[derive(Debug, Clone)]
pub struct EscrowCoordinator {
    inner: Arc<CoordinatorInner>,
}

#[derive(Debug)]
struct CoordinatorInner {
    storage: EscrowStorage,
    machine: StateMachine,
    directory: VaultDirectory,
    wallets: Arc<dyn WalletDirectory>,
    notifier: Arc<dyn Notifier>,
    reconciler: FundingReconciler,
    coordinator: Arc<ApprovalCoordinator>,
    negotiator: SettlementNegotiator,
    metrics: Arc<EscrowMetrics>,
    chain_id: ChainId,
    fee_bps: u16,
    contract_version: String,
}

impl EscrowCoordinator {
    /// Wires the coordinator components over the given collaborators.
    pub fn new(
        config: &EscrowConfig,
        storage: EscrowStorage,
        chain: Arc<dyn ChainService>,
        wallets: Arc<dyn WalletDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let metrics = Arc::new(EscrowMetrics::default());
        let machine = StateMachine::new(storage.clone());
        let directory = VaultDirectory::new(&config.contracts);

        let reconciler = FundingReconciler::new(
            storage.clone(),
            chain.clone(),
            directory.clone(),
            machine.clone(),
            notifier.clone(),
            metrics.clone(),
            &config.chain,
            &config.funding,
        );
        let coordinator = Arc::new(ApprovalCoordinator::new(
            storage.clone(),
            chain,
            machine.clone(),
            notifier.clone(),
            metrics.clone(),
            config.chain.token_decimals,
        ));
        let negotiator = SettlementNegotiator::new(
            storage.clone(),
            coordinator.clone(),
            notifier.clone(),
            metrics.clone(),
            config.settlement.proposal_ttl,
        );

        Self {
            inner: Arc::new(CoordinatorInner {
                storage,
                machine,
                directory,
                wallets,
                notifier,
                reconciler,
                coordinator,
                negotiator,
                metrics,
                chain_id: config.chain.chain_id,
                fee_bps: config.fees.fee_bps,
                contract_version: config.contracts.version.clone(),
            }),
        }
    }

    /// Creates an escrow, deriving the vault and splitter addresses once and
    /// persisting them with the record.
    pub async fn create_escrow(
        &self,
        parameters: CreateEscrowParameters,
    ) -> Result<CreateEscrowResponse, EscrowError> {
        let inner = &self.inner;
        if parameters.amount == 0 {
            return Err(LifecycleError::InvalidTerms("amount must be positive".into()).into());
        }
        if parameters.payer == parameters.recipient {
            return Err(LifecycleError::InvalidTerms(
                "payer and recipient must be distinct".into(),
            )
            .into());
        }

        let payer_address = inner.wallets.resolve_address(&parameters.payer).await?;
        let recipient_address = inner.wallets.resolve_address(&parameters.recipient).await?;
        if payer_address == recipient_address {
            return Err(LifecycleError::InvalidTerms(
                "parties resolve to the same wallet".into(),
            )
            .into());
        }

        let salt = B256::random();
        let addresses = inner.directory.derive(salt, payer_address, recipient_address);
        let now = Utc::now();
        let escrow = Escrow {
            id: EscrowId::compute(salt, payer_address, recipient_address),
            salt,
            chain_id: inner.chain_id,
            contract_version: inner.contract_version.clone(),
            payer: Party { identity: parameters.payer, address: payer_address },
            recipient: Party { identity: parameters.recipient, address: recipient_address },
            amount: parameters.amount,
            fee_bps: inner.fee_bps,
            vault: addresses.vault,
            splitter: addresses.splitter,
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
        };
        inner.storage.create_escrow(&escrow).await?;
        inner.metrics.created.increment(1);
        info!(escrow = %escrow.id, vault = %escrow.vault, amount = escrow.amount, "escrow created");

        notify_or_log(&*inner.notifier, &escrow.payer.identity, &EscrowEvent::Created).await;
        notify_or_log(&*inner.notifier, &escrow.recipient.identity, &EscrowEvent::Created).await;

        let platform_fee = escrow.fee_for(escrow.amount);
        let net_payable = escrow.net_payable();
        Ok(CreateEscrowResponse { escrow, platform_fee, net_payable })
    }

    /// Accepts the escrow terms; only the recipient may accept.
    pub async fn accept_escrow(
        &self,
        id: EscrowId,
        role: PartyRole,
    ) -> Result<EscrowStatus, EscrowError> {
        if role != PartyRole::Recipient {
            return Err(LifecycleError::Unauthorized.into());
        }
        let inner = &self.inner;
        let mut escrow =
            inner.storage.read_escrow(id).await?.ok_or(LifecycleError::UnknownEscrow(id))?;
        inner
            .machine
            .transition(&mut escrow, EscrowStatus::Accepted, json!({ "role": role }))
            .await?;
        notify_or_log(&*inner.notifier, &escrow.payer.identity, &EscrowEvent::Accepted).await;
        Ok(escrow.status)
    }

    /// Declines the escrow before funding. Either party may decline.
    pub async fn decline_escrow(
        &self,
        id: EscrowId,
        role: PartyRole,
        reason: Option<String>,
    ) -> Result<EscrowStatus, EscrowError> {
        let inner = &self.inner;
        let mut escrow =
            inner.storage.read_escrow(id).await?.ok_or(LifecycleError::UnknownEscrow(id))?;
        inner
            .machine
            .transition(
                &mut escrow,
                EscrowStatus::Declined,
                json!({ "role": role, "reason": reason }),
            )
            .await?;
        notify_or_log(
            &*inner.notifier,
            &escrow.party(role.counterparty()).identity,
            &EscrowEvent::Declined,
        )
        .await;
        Ok(escrow.status)
    }

    /// Runs a funding reconciliation tick.
    pub async fn check_funding(
        &self,
        id: EscrowId,
    ) -> Result<FundingStatusResponse, EscrowError> {
        let outcome = self.inner.reconciler.check_funding(id).await?;
        Ok(FundingStatusResponse {
            funded: outcome.funded,
            balance: outcome.balance,
            status: outcome.status,
            message: outcome.message,
        })
    }

    /// Records an approval, releasing when both parties have approved.
    pub async fn record_approval(
        &self,
        id: EscrowId,
        role: PartyRole,
    ) -> Result<ApprovalResponse, EscrowError> {
        let outcome = self.inner.coordinator.record_approval(id, role).await?;
        Ok(approval_response(outcome.released, outcome.escrow))
    }

    /// Retries a failed release.
    pub async fn retry_release(&self, id: EscrowId) -> Result<ApprovalResponse, EscrowError> {
        let outcome = self.inner.coordinator.retry_release(id).await?;
        Ok(approval_response(outcome.released, outcome.escrow))
    }

    /// Proposes a settlement split.
    pub async fn propose_settlement(
        &self,
        id: EscrowId,
        parameters: ProposeSettlementParameters,
    ) -> Result<ProposeSettlementResponse, EscrowError> {
        let receipt = self
            .inner
            .negotiator
            .propose(id, parameters.role, parameters.recipient_amount, parameters.reason)
            .await?;
        Ok(ProposeSettlementResponse {
            proposal_id: receipt.proposal_id,
            recipient_gets: receipt.recipient_gets,
            payer_gets_back: receipt.payer_gets_back,
            remaining: receipt.remaining,
        })
    }

    /// Responds to the pending settlement proposal.
    pub async fn respond_settlement(
        &self,
        id: EscrowId,
        parameters: RespondSettlementParameters,
    ) -> Result<RespondSettlementResponse, EscrowError> {
        let status = self
            .inner
            .negotiator
            .respond(id, parameters.role, parameters.accept, parameters.reason)
            .await?;
        Ok(RespondSettlementResponse { status })
    }

    /// Reads the escrow and its transition history.
    pub async fn get_escrow(&self, id: EscrowId) -> Result<EscrowWithHistory, EscrowError> {
        let inner = &self.inner;
        let escrow =
            inner.storage.read_escrow(id).await?.ok_or(LifecycleError::UnknownEscrow(id))?;
        let history = inner.storage.read_transitions(id).await?;
        Ok(EscrowWithHistory { escrow, history })
    }
}

fn approval_response(released: bool, escrow: Escrow) -> ApprovalResponse {
    ApprovalResponse {
        released,
        payer_approved: escrow.payer_approved,
        recipient_approved: escrow.recipient_approved,
        status: escrow.status,
        release_tx: escrow.release_tx,
    }
}

#[async_trait]
impl EscrowApiServer for EscrowCoordinator {
    async fn create(&self, parameters: CreateEscrowParameters) -> RpcResult<CreateEscrowResponse> {
        self.create_escrow(parameters).await.to_rpc_result()
    }

    async fn accept(&self, escrow_id: EscrowId, role: PartyRole) -> RpcResult<EscrowStatus> {
        self.accept_escrow(escrow_id, role).await.to_rpc_result()
    }

    async fn decline(
        &self,
        escrow_id: EscrowId,
        role: PartyRole,
        reason: Option<String>,
    ) -> RpcResult<EscrowStatus> {
        self.decline_escrow(escrow_id, role, reason).await.to_rpc_result()
    }

    async fn check_funding(&self, escrow_id: EscrowId) -> RpcResult<FundingStatusResponse> {
        EscrowCoordinator::check_funding(self, escrow_id).await.to_rpc_result()
    }

    async fn record_approval(
        &self,
        escrow_id: EscrowId,
        role: PartyRole,
    ) -> RpcResult<ApprovalResponse> {
        EscrowCoordinator::record_approval(self, escrow_id, role).await.to_rpc_result()
    }

    async fn retry_release(&self, escrow_id: EscrowId) -> RpcResult<ApprovalResponse> {
        EscrowCoordinator::retry_release(self, escrow_id).await.to_rpc_result()
    }

    async fn propose_settlement(
        &self,
        escrow_id: EscrowId,
        parameters: ProposeSettlementParameters,
    ) -> RpcResult<ProposeSettlementResponse> {
        EscrowCoordinator::propose_settlement(self, escrow_id, parameters).await.to_rpc_result()
    }

    async fn respond_settlement(
        &self,
        escrow_id: EscrowId,
        parameters: RespondSettlementParameters,
    ) -> RpcResult<RespondSettlementResponse> {
        EscrowCoordinator::respond_settlement(self, escrow_id, parameters).await.to_rpc_result()
    }

    async fn get(&self, escrow_id: EscrowId) -> RpcResult<EscrowWithHistory> {
        self.get_escrow(escrow_id).await.to_rpc_result()
    }
}
