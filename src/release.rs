//! Approval collection and release execution.
//!
//! Both-approved detection is a pure function of the two flags; once both
//! off-chain approvals are set, the trusted executor submits the on-chain
//! release on behalf of the parties. A failed or unconfirmed release lands in
//! RELEASE_FAILED, a retryable state that keeps the recorded approvals.

use crate::{
    chain::{ChainService, ReleaseInstruction, minor_units_to_token},
    error::{ChainError, EscrowError, LifecycleError},
    lifecycle::StateMachine,
    metrics::EscrowMetrics,
    notify::{EscrowEvent, Notifier, notify_or_log},
    storage::{EscrowStorage, StorageApi},
    types::{Escrow, EscrowId, EscrowStatus, PartyRole, ProposalStatus},
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// How a release divides the funded amount.
///
/// Constructed so that `recipient_payout + platform_fee + refund` always
/// equals the funded amount: the fee is taken out of the recipient leg and
/// the refund is the exact complement of that leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseSplit {
    /// Gross recipient leg routed through the fee splitter, in minor units.
    pub recipient_gross: u64,
    /// Net recipient payout after the platform fee, in minor units.
    pub recipient_payout: u64,
    /// Platform fee, in minor units.
    pub platform_fee: u64,
    /// Amount returned to the payer, in minor units.
    pub refund: u64,
}

impl ReleaseSplit {
    /// The default full release: everything to the recipient leg.
    pub fn full(escrow: &Escrow) -> Self {
        Self::settlement(escrow, escrow.funded_amount.unwrap_or(escrow.amount))
    }

    /// A negotiated split: `recipient_gross` to the recipient leg, the rest
    /// refunded to the payer.
    pub fn settlement(escrow: &Escrow, recipient_gross: u64) -> Self {
        let funded = escrow.funded_amount.unwrap_or(escrow.amount);
        let platform_fee = escrow.fee_for(recipient_gross);
        Self {
            recipient_gross,
            recipient_payout: recipient_gross - platform_fee,
            platform_fee,
            refund: funded - recipient_gross,
        }
    }
}

/// Result of an approval or release attempt.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    /// Whether a release transaction confirmed as part of this call.
    pub released: bool,
    /// The escrow after the call.
    pub escrow: Escrow,
}

/// Records party approvals and executes releases.
#[derive(Debug)]
pub struct ApprovalCoordinator {
    storage: EscrowStorage,
    chain: Arc<dyn ChainService>,
    machine: StateMachine,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<EscrowMetrics>,
    token_decimals: u8,
}

impl ApprovalCoordinator {
    /// Creates a coordinator.
    pub fn new(
        storage: EscrowStorage,
        chain: Arc<dyn ChainService>,
        machine: StateMachine,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<EscrowMetrics>,
        token_decimals: u8,
    ) -> Self {
        Self { storage, chain, machine, notifier, metrics, token_decimals }
    }

    /// Records one party's release approval.
    ///
    /// Idempotent: re-approving is a no-op success. When the second approval
    /// lands, the full release is executed within this call.
    #[instrument(skip(self), fields(escrow = %id, %role))]
    pub async fn record_approval(
        &self,
        id: EscrowId,
        role: PartyRole,
    ) -> Result<ApprovalOutcome, EscrowError> {
        let escrow =
            self.storage.read_escrow(id).await?.ok_or(LifecycleError::UnknownEscrow(id))?;

        match escrow.status {
            EscrowStatus::Funded => {}
            // terminal or in-flight: approvals are no-op reads
            EscrowStatus::Released | EscrowStatus::Refunded => {
                return Ok(ApprovalOutcome {
                    released: escrow.status == EscrowStatus::Released,
                    escrow,
                });
            }
            EscrowStatus::PendingRelease => {
                return Ok(ApprovalOutcome { released: false, escrow });
            }
            EscrowStatus::ReleaseFailed => return self.retry_release(id).await,
            status => return Err(LifecycleError::ApprovalRequiresFunding { status }.into()),
        }

        let escrow = if escrow.approved(role) {
            escrow
        } else {
            let updated = self.storage.record_approval(id, role).await?;
            info!(escrow = %id, %role, "approval recorded");
            notify_or_log(
                &*self.notifier,
                &updated.party(role.counterparty()).identity,
                &EscrowEvent::ApprovalRecorded { role },
            )
            .await;
            updated
        };

        if escrow.both_approved() {
            self.execute_release(escrow, None).await
        } else {
            Ok(ApprovalOutcome { released: false, escrow })
        }
    }

    /// Retries a release out of RELEASE_FAILED (or a failed refund that left
    /// the escrow FUNDED) without re-collecting approvals.
    #[instrument(skip(self), fields(escrow = %id))]
    pub async fn retry_release(&self, id: EscrowId) -> Result<ApprovalOutcome, EscrowError> {
        let escrow =
            self.storage.read_escrow(id).await?.ok_or(LifecycleError::UnknownEscrow(id))?;

        if !matches!(escrow.status, EscrowStatus::ReleaseFailed | EscrowStatus::Funded) {
            return Err(LifecycleError::InvalidTransition {
                from: escrow.status,
                to: EscrowStatus::PendingRelease,
            }
            .into());
        }

        // An accepted settlement split wins over the default full release.
        if let Some(proposal_id) = escrow.active_proposal {
            if let Some(proposal) = self.storage.read_proposal(proposal_id).await? {
                if proposal.status == ProposalStatus::Accepted {
                    let recipient_gross = proposal.recipient_amount;
                    return self.execute_release(escrow, Some(recipient_gross)).await;
                }
            }
        }

        if !escrow.both_approved() {
            return Err(LifecycleError::ReleaseNotAuthorized.into());
        }
        self.execute_release(escrow, None).await
    }

    /// Executes a release with a negotiated recipient leg. Called by the
    /// settlement protocol on proposal acceptance.
    pub(crate) async fn execute_settlement(
        &self,
        escrow: Escrow,
        recipient_gross: u64,
    ) -> Result<ApprovalOutcome, EscrowError> {
        self.execute_release(escrow, Some(recipient_gross)).await
    }

    /// Submits the release transaction and drives the escrow to its terminal
    /// state based on the outcome.
    ///
    /// `recipient_gross: None` means the default full release. A
    /// zero-recipient settlement is a pure refund: it executes out of FUNDED
    /// and lands in REFUNDED, since PENDING_RELEASE models the dual-approval
    /// path only.
    async fn execute_release(
        &self,
        mut escrow: Escrow,
        recipient_gross: Option<u64>,
    ) -> Result<ApprovalOutcome, EscrowError> {
        let split = match recipient_gross {
            Some(gross) => ReleaseSplit::settlement(&escrow, gross),
            None => ReleaseSplit::full(&escrow),
        };
        let is_refund = split.recipient_gross == 0;

        if !is_refund && escrow.status != EscrowStatus::PendingRelease {
            self.machine
                .transition(
                    &mut escrow,
                    EscrowStatus::PendingRelease,
                    json!({ "recipientGross": split.recipient_gross, "refund": split.refund }),
                )
                .await?;
        } else if is_refund {
            // Refunds terminate FUNDED -> REFUNDED with no intermediate
            // state, so claim the row with the same conditional write before
            // any chain call. A caller holding a stale read fails here
            // instead of submitting a transaction from a terminal escrow.
            if !escrow.status.allows(EscrowStatus::Refunded) {
                return Err(LifecycleError::InvalidTransition {
                    from: escrow.status,
                    to: EscrowStatus::Refunded,
                }
                .into());
            }
            self.storage.update_escrow(&escrow, EscrowStatus::Funded).await?;
        }

        let instruction = ReleaseInstruction {
            vault: escrow.vault,
            recipient: escrow.recipient.address,
            recipient_units: minor_units_to_token(split.recipient_gross, self.token_decimals),
            payer: escrow.payer.address,
            refund_units: minor_units_to_token(split.refund, self.token_decimals),
        };

        let started = Instant::now();
        let result = async {
            let tx_hash = self.chain.submit_release(&instruction).await?;
            self.chain.wait_for_confirmation(tx_hash).await?;
            Ok::<_, ChainError>(tx_hash)
        }
        .await;

        match result {
            Ok(tx_hash) => {
                escrow.release_tx = Some(tx_hash);
                escrow.recipient_payout = Some(split.recipient_payout);
                escrow.platform_fee = Some(split.platform_fee);
                escrow.refund_amount = Some(split.refund);

                let terminal =
                    if is_refund { EscrowStatus::Refunded } else { EscrowStatus::Released };
                self.machine
                    .transition(&mut escrow, terminal, json!({ "tx": tx_hash }))
                    .await?;

                self.metrics.released.increment(1);
                self.metrics
                    .release_confirmation_time
                    .record(started.elapsed().as_millis() as f64);

                let event = EscrowEvent::Released {
                    payout: split.recipient_payout,
                    refund: split.refund,
                };
                notify_or_log(&*self.notifier, &escrow.payer.identity, &event).await;
                notify_or_log(&*self.notifier, &escrow.recipient.identity, &event).await;

                Ok(ApprovalOutcome { released: true, escrow })
            }
            Err(err) => {
                warn!(escrow = %escrow.id, %err, "release execution failed");
                self.metrics.release_failures.increment(1);

                // A failed refund leaves the escrow FUNDED; a failed release
                // moves PENDING_RELEASE to the retryable failure state.
                if escrow.status == EscrowStatus::PendingRelease {
                    self.machine
                        .transition(
                            &mut escrow,
                            EscrowStatus::ReleaseFailed,
                            json!({ "error": err.to_string() }),
                        )
                        .await?;
                }

                let event = EscrowEvent::ReleaseFailed;
                notify_or_log(&*self.notifier, &escrow.payer.identity, &event).await;
                notify_or_log(&*self.notifier, &escrow.recipient.identity, &event).await;

                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chain::ReleaseInstruction,
        error::StorageError,
        notify::LogNotifier,
        types::Party,
    };
    use alloy::primitives::{Address, B256, TxHash, U256};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn funded_escrow(amount: u64) -> Escrow {
        let now = Utc::now();
        Escrow {
            id: EscrowId::random(),
            salt: B256::random(),
            chain_id: 8453,
            contract_version: "v1".into(),
            payer: Party { identity: "p@x.com".into(), address: Address::random() },
            recipient: Party { identity: "r@x.com".into(), address: Address::random() },
            amount,
            fee_bps: 199,
            vault: Address::random(),
            splitter: Address::random(),
            status: EscrowStatus::Funded,
            payer_approved: false,
            recipient_approved: false,
            funded_amount: Some(amount),
            funded_at: Some(now),
            release_tx: None,
            recipient_payout: None,
            platform_fee: None,
            refund_amount: None,
            active_proposal: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn full_split_matches_fee_schedule() {
        let escrow = funded_escrow(10_000);
        let split = ReleaseSplit::full(&escrow);
        assert_eq!(split.recipient_payout, 9_801);
        assert_eq!(split.platform_fee, 199);
        assert_eq!(split.refund, 0);
    }

    #[test]
    fn settlement_split_conserves_funds() {
        let escrow = funded_escrow(10_000);
        for gross in [0, 1, 4_999, 6_000, 10_000] {
            let split = ReleaseSplit::settlement(&escrow, gross);
            assert_eq!(
                split.recipient_payout + split.platform_fee + split.refund,
                10_000,
                "conservation violated for gross {gross}"
            );
        }
    }

    #[test]
    fn settlement_split_fee_applies_to_recipient_leg() {
        let escrow = funded_escrow(10_000);
        let split = ReleaseSplit::settlement(&escrow, 6_000);
        assert_eq!(split.recipient_payout, 5_881);
        assert_eq!(split.platform_fee, 119);
        assert_eq!(split.refund, 4_000);
    }

    #[derive(Debug, Default)]
    struct CountingChain {
        submissions: AtomicU32,
    }

    #[async_trait]
    impl ChainService for CountingChain {
        async fn token_balance(&self, _: Address, _: Address) -> Result<U256, ChainError> {
            unimplemented!("the coordinator never reads balances")
        }

        async fn submit_release(&self, _: &ReleaseInstruction) -> Result<TxHash, ChainError> {
            self.submissions.fetch_add(1, Ordering::SeqCst);
            Ok(TxHash::random())
        }

        async fn wait_for_confirmation(&self, _: TxHash) -> Result<(), ChainError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn stale_refund_never_reaches_the_chain() {
        let storage = EscrowStorage::in_memory();
        let machine = StateMachine::new(storage.clone());
        let chain = Arc::new(CountingChain::default());
        let coordinator = ApprovalCoordinator::new(
            storage.clone(),
            chain.clone(),
            machine,
            Arc::new(LogNotifier),
            Arc::new(EscrowMetrics::default()),
            6,
        );

        // the stored row already released while this caller still holds a
        // FUNDED read
        let stale = funded_escrow(10_000);
        let mut released = stale.clone();
        released.status = EscrowStatus::Released;
        storage.create_escrow(&released).await.unwrap();

        let err = coordinator.execute_settlement(stale, 0).await.unwrap_err();
        assert!(matches!(err, EscrowError::Storage(StorageError::StatusConflict { .. })));
        assert_eq!(chain.submissions.load(Ordering::SeqCst), 0);
    }
}
