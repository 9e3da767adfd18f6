//! Settlement negotiation.
//!
//! Either party can propose a non-default split of the remaining funds; the
//! counterparty accepts, rejects, or lets the proposal lapse. At most one
//! PENDING proposal exists per escrow: a new proposal supersedes the previous
//! one. Acceptance triggers a release with the negotiated split.

use crate::{
    error::{EscrowError, LifecycleError, SettlementError},
    metrics::EscrowMetrics,
    notify::{EscrowEvent, Notifier, notify_or_log},
    release::ApprovalCoordinator,
    storage::{EscrowStorage, StorageApi},
    types::{EscrowId, EscrowStatus, PartyRole, ProposalId, ProposalStatus, SettlementProposal},
};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tracing::{info, instrument};

/// Receipt for a newly created proposal.
#[derive(Debug, Clone)]
pub struct ProposalReceipt {
    /// Id of the created proposal.
    pub proposal_id: ProposalId,
    /// Gross recipient leg, in minor units.
    pub recipient_gets: u64,
    /// Refund leg, in minor units.
    pub payer_gets_back: u64,
    /// Unsettled amount the proposal was validated against.
    pub remaining: u64,
}

/// Runs the settlement negotiation protocol for funded escrows.
#[derive(Debug)]
pub struct SettlementNegotiator {
    storage: EscrowStorage,
    coordinator: Arc<ApprovalCoordinator>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<EscrowMetrics>,
    proposal_ttl: Duration,
}

impl SettlementNegotiator {
    /// Creates a negotiator.
    pub fn new(
        storage: EscrowStorage,
        coordinator: Arc<ApprovalCoordinator>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<EscrowMetrics>,
        proposal_ttl: Duration,
    ) -> Self {
        Self { storage, coordinator, notifier, metrics, proposal_ttl }
    }

    /// Creates a PENDING proposal, superseding any existing one.
    #[instrument(skip(self, reason), fields(escrow = %id, %proposer))]
    pub async fn propose(
        &self,
        id: EscrowId,
        proposer: PartyRole,
        recipient_amount: u64,
        reason: Option<String>,
    ) -> Result<ProposalReceipt, EscrowError> {
        let mut escrow =
            self.storage.read_escrow(id).await?.ok_or(LifecycleError::UnknownEscrow(id))?;
        if escrow.status != EscrowStatus::Funded {
            return Err(SettlementError::EscrowNotOpen { status: escrow.status }.into());
        }

        let remaining = escrow.remaining();
        if recipient_amount > remaining {
            return Err(
                SettlementError::InvalidAmount { requested: recipient_amount, remaining }.into()
            );
        }

        // Supersession: cancel the previous PENDING proposal before linking
        // the new one.
        if let Some(previous_id) = escrow.active_proposal {
            if let Some(mut previous) = self.storage.read_proposal(previous_id).await? {
                if previous.status.is_pending() {
                    previous.status = ProposalStatus::Cancelled;
                    previous.resolved_at = Some(Utc::now());
                    self.storage.write_proposal(&previous).await?;
                    info!(escrow = %id, proposal = %previous_id, "superseded pending proposal");
                }
            }
        }

        let now = Utc::now();
        let proposal = SettlementProposal {
            id: ProposalId::random(),
            escrow_id: id,
            proposer,
            recipient_amount,
            refund_amount: remaining - recipient_amount,
            reason,
            status: ProposalStatus::Pending,
            created_at: now,
            expires_at: now
                + chrono::Duration::from_std(self.proposal_ttl)
                    .unwrap_or_else(|_| chrono::Duration::hours(72)),
            resolved_at: None,
        };
        self.storage.write_proposal(&proposal).await?;

        escrow.active_proposal = Some(proposal.id);
        escrow.updated_at = now;
        self.storage.update_escrow(&escrow, EscrowStatus::Funded).await?;

        self.metrics.proposals.increment(1);
        notify_or_log(
            &*self.notifier,
            &escrow.party(proposer.counterparty()).identity,
            &EscrowEvent::SettlementProposed { recipient_amount },
        )
        .await;

        Ok(ProposalReceipt {
            proposal_id: proposal.id,
            recipient_gets: recipient_amount,
            payer_gets_back: proposal.refund_amount,
            remaining,
        })
    }

    /// Responds to the escrow's pending proposal.
    ///
    /// Acceptance is restricted to the non-proposing party and triggers the
    /// release with the negotiated split; rejection clears the active
    /// proposal and leaves the escrow FUNDED.
    #[instrument(skip(self, reason), fields(escrow = %id, %responder, accept))]
    pub async fn respond(
        &self,
        id: EscrowId,
        responder: PartyRole,
        accept: bool,
        reason: Option<String>,
    ) -> Result<EscrowStatus, EscrowError> {
        let mut escrow =
            self.storage.read_escrow(id).await?.ok_or(LifecycleError::UnknownEscrow(id))?;
        // The escrow may have moved on since the proposal was created, e.g. a
        // dual-approval release that landed first. A stale proposal cannot be
        // responded to.
        if escrow.status != EscrowStatus::Funded {
            return Err(SettlementError::EscrowNotOpen { status: escrow.status }.into());
        }
        let proposal_id = escrow.active_proposal.ok_or(SettlementError::NoActiveProposal)?;
        let mut proposal = self
            .storage
            .read_proposal(proposal_id)
            .await?
            .ok_or(SettlementError::NoActiveProposal)?;
        if !proposal.status.is_pending() {
            return Err(SettlementError::NoActiveProposal.into());
        }

        let now = Utc::now();
        if proposal.is_expired(now) {
            proposal.status = ProposalStatus::Cancelled;
            proposal.resolved_at = Some(now);
            self.storage.write_proposal(&proposal).await?;
            escrow.active_proposal = None;
            escrow.updated_at = now;
            self.storage.update_escrow(&escrow, escrow.status).await?;
            return Err(SettlementError::ProposalExpired(proposal_id).into());
        }

        if responder == proposal.proposer {
            if accept {
                return Err(SettlementError::CannotAcceptOwnProposal.into());
            }
            // Proposer withdrawal happens by superseding, not by responding.
            return Err(LifecycleError::Unauthorized.into());
        }

        if !accept {
            proposal.status = ProposalStatus::Rejected;
            proposal.reason = reason.or(proposal.reason);
            proposal.resolved_at = Some(now);
            self.storage.write_proposal(&proposal).await?;

            escrow.active_proposal = None;
            escrow.updated_at = now;
            self.storage.update_escrow(&escrow, EscrowStatus::Funded).await?;

            self.metrics.proposals_rejected.increment(1);
            notify_or_log(
                &*self.notifier,
                &escrow.party(proposal.proposer).identity,
                &EscrowEvent::SettlementRejected,
            )
            .await;
            return Ok(EscrowStatus::Funded);
        }

        proposal.status = ProposalStatus::Accepted;
        proposal.resolved_at = Some(now);
        self.storage.write_proposal(&proposal).await?;
        self.metrics.proposals_accepted.increment(1);
        info!(escrow = %id, proposal = %proposal_id, "settlement accepted, executing split");

        // The proposal link stays in place so a failed release can be retried
        // with the accepted split.
        let outcome =
            self.coordinator.execute_settlement(escrow, proposal.recipient_amount).await?;
        Ok(outcome.escrow.status)
    }
}
