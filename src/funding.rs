//! Funding reconciliation.
//!
//! The reconciler is invoked as an idempotent tick by whatever external
//! trigger exists (polling loop, on-ramp webhook, manual retry); it compares
//! the on-chain vault balance against the expected amount and drives the
//! FUNDED transition exactly once. It never touches approval flags or
//! settlement state.

use crate::{
    chain::{ChainService, token_units_to_minor},
    config::{ChainConfig, FundingConfig},
    directory::VaultDirectory,
    error::{EscrowError, LifecycleError, StorageError},
    lifecycle::StateMachine,
    metrics::EscrowMetrics,
    notify::{EscrowEvent, Notifier, notify_or_log},
    storage::{EscrowStorage, StorageApi},
    types::{Escrow, EscrowId, EscrowStatus},
};
use alloy::primitives::Address;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Result of one reconciliation tick.
#[derive(Debug, Clone)]
pub struct FundingOutcome {
    /// Whether the vault balance has crossed the funding threshold.
    pub funded: bool,
    /// Observed vault balance in minor units.
    pub balance: u64,
    /// Escrow status after the tick.
    pub status: EscrowStatus,
    /// Human-readable summary; partial funding is an expected state, not an
    /// error.
    pub message: String,
}

/// Reconciles stored escrow state against on-chain vault balances.
#[derive(Debug)]
pub struct FundingReconciler {
    storage: EscrowStorage,
    chain: Arc<dyn ChainService>,
    directory: VaultDirectory,
    machine: StateMachine,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<EscrowMetrics>,
    token: Address,
    token_decimals: u8,
    tolerance_bps: u16,
}

impl FundingReconciler {
    /// Creates a reconciler.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: EscrowStorage,
        chain: Arc<dyn ChainService>,
        directory: VaultDirectory,
        machine: StateMachine,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<EscrowMetrics>,
        chain_config: &ChainConfig,
        funding: &FundingConfig,
    ) -> Self {
        Self {
            storage,
            chain,
            directory,
            machine,
            notifier,
            metrics,
            token: chain_config.token,
            token_decimals: chain_config.token_decimals,
            tolerance_bps: funding.tolerance_bps,
        }
    }

    /// Checks whether the vault is funded, transitioning to FUNDED exactly
    /// once when the threshold is first crossed.
    #[instrument(skip(self), fields(escrow = %id))]
    pub async fn check_funding(&self, id: EscrowId) -> Result<FundingOutcome, EscrowError> {
        let mut escrow = self
            .storage
            .read_escrow(id)
            .await?
            .ok_or(LifecycleError::UnknownEscrow(id))?;

        // Exactly-once guard: skip entirely if funding was already observed.
        if escrow.status.is_funded_or_beyond() {
            return Ok(already_funded(&escrow));
        }
        if escrow.status == EscrowStatus::Declined {
            return Ok(FundingOutcome {
                funded: false,
                balance: 0,
                status: escrow.status,
                message: "escrow was declined before funding".into(),
            });
        }

        // Audit the persisted addresses before trusting them; funding checked
        // against a drifted derivation would be checked at the wrong address.
        self.directory.verify(&escrow)?;

        let units = self.chain.token_balance(self.token, escrow.vault).await?;
        let balance = token_units_to_minor(units, self.token_decimals);
        let threshold = escrow.funding_threshold(self.tolerance_bps);
        debug!(balance, threshold, vault = %escrow.vault, "vault balance read");

        if balance < threshold {
            return Ok(FundingOutcome {
                funded: false,
                balance,
                status: escrow.status,
                message: format!(
                    "vault holds {balance} of {} minor units, waiting for funding",
                    escrow.amount
                ),
            });
        }

        if escrow.status == EscrowStatus::Initiated {
            // Funds arrived before the recipient accepted; FUNDED is not a
            // legal successor of INITIATED, so keep reporting until then.
            return Ok(FundingOutcome {
                funded: false,
                balance,
                status: escrow.status,
                message: "vault is funded but the escrow is awaiting recipient acceptance".into(),
            });
        }

        escrow.funded_amount = Some(balance);
        escrow.funded_at = Some(Utc::now());
        match self
            .machine
            .transition(&mut escrow, EscrowStatus::Funded, json!({ "balance": balance }))
            .await
        {
            Ok(()) => {
                self.metrics.funded.increment(1);
                let event = EscrowEvent::Funded { amount: balance };
                notify_or_log(&*self.notifier, &escrow.payer.identity, &event).await;
                notify_or_log(&*self.notifier, &escrow.recipient.identity, &event).await;
                Ok(already_funded(&escrow))
            }
            // A concurrent funding signal won the race; the transition was
            // applied exactly once, report the current state.
            Err(EscrowError::Storage(StorageError::StatusConflict { .. })) => {
                let refreshed = self
                    .storage
                    .read_escrow(id)
                    .await?
                    .ok_or(LifecycleError::UnknownEscrow(id))?;
                Ok(already_funded(&refreshed))
            }
            Err(err) => Err(err),
        }
    }
}

fn already_funded(escrow: &Escrow) -> FundingOutcome {
    FundingOutcome {
        funded: true,
        balance: escrow.funded_amount.unwrap_or(escrow.amount),
        status: escrow.status,
        message: format!("escrow is {}", escrow.status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chain::ReleaseInstruction,
        config::ContractsConfig,
        error::ChainError,
        notify::LogNotifier,
        types::{EscrowId, Party},
    };
    use alloy::primitives::{B256, TxHash, U256};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct MockChain {
        balance: Mutex<U256>,
    }

    #[async_trait]
    impl ChainService for MockChain {
        async fn token_balance(&self, _: Address, _: Address) -> Result<U256, ChainError> {
            Ok(*self.balance.lock().unwrap())
        }

        async fn submit_release(&self, _: &ReleaseInstruction) -> Result<TxHash, ChainError> {
            unimplemented!("reconciler never submits transactions")
        }

        async fn wait_for_confirmation(&self, _: TxHash) -> Result<(), ChainError> {
            unimplemented!("reconciler never submits transactions")
        }
    }

    fn fixture(balance_units: u64) -> (FundingReconciler, EscrowStorage, Escrow) {
        let storage = EscrowStorage::in_memory();
        let machine = StateMachine::new(storage.clone());
        let contracts = ContractsConfig {
            factory: Address::repeat_byte(0x11),
            vault_code_hash: B256::repeat_byte(0x22),
            splitter_code_hash: B256::repeat_byte(0x33),
            version: "v1".into(),
        };
        let directory = VaultDirectory::new(&contracts);
        let chain_config = ChainConfig {
            chain_id: 8453,
            endpoints: vec![],
            token: Address::repeat_byte(0xaa),
            token_decimals: 6,
        };

        let salt = B256::random();
        let payer = Party { identity: "p@x.com".into(), address: Address::random() };
        let recipient = Party { identity: "r@x.com".into(), address: Address::random() };
        let addresses = directory.derive(salt, payer.address, recipient.address);
        let now = Utc::now();
        let escrow = Escrow {
            id: EscrowId::compute(salt, payer.address, recipient.address),
            salt,
            chain_id: 8453,
            contract_version: "v1".into(),
            payer,
            recipient,
            amount: 10_000,
            fee_bps: 199,
            vault: addresses.vault,
            splitter: addresses.splitter,
            status: EscrowStatus::Accepted,
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

        let chain = Arc::new(MockChain { balance: Mutex::new(U256::from(balance_units)) });
        let reconciler = FundingReconciler::new(
            storage.clone(),
            chain,
            directory,
            machine,
            Arc::new(LogNotifier),
            Arc::new(EscrowMetrics::default()),
            &chain_config,
            &FundingConfig::default(),
        );
        (reconciler, storage, escrow)
    }

    #[tokio::test]
    async fn partial_funding_reports_balance_without_transition() {
        // 50 USDC against an expected 100
        let (reconciler, storage, escrow) = fixture(50_000_000);
        storage.create_escrow(&escrow).await.unwrap();

        let outcome = reconciler.check_funding(escrow.id).await.unwrap();
        assert!(!outcome.funded);
        assert_eq!(outcome.balance, 5_000);
        assert_eq!(outcome.status, EscrowStatus::Accepted);
        assert_eq!(
            storage.read_escrow(escrow.id).await.unwrap().unwrap().status,
            EscrowStatus::Accepted
        );
    }

    #[tokio::test]
    async fn threshold_crossing_funds_exactly_once() {
        let (reconciler, storage, escrow) = fixture(100_000_000);
        storage.create_escrow(&escrow).await.unwrap();

        let first = reconciler.check_funding(escrow.id).await.unwrap();
        assert!(first.funded);
        assert_eq!(first.status, EscrowStatus::Funded);

        // repeated ticks stay funded and append no further transitions
        for _ in 0..3 {
            let again = reconciler.check_funding(escrow.id).await.unwrap();
            assert!(again.funded);
        }
        let log = storage.read_transitions(escrow.id).await.unwrap();
        assert_eq!(log.iter().filter(|t| t.to == EscrowStatus::Funded).count(), 1);
    }

    #[tokio::test]
    async fn tolerance_band_accepts_slippage() {
        // 99 USDC against an expected 100 is within the 1% band
        let (reconciler, storage, escrow) = fixture(99_000_000);
        storage.create_escrow(&escrow).await.unwrap();

        let outcome = reconciler.check_funding(escrow.id).await.unwrap();
        assert!(outcome.funded);
        assert_eq!(
            storage.read_escrow(escrow.id).await.unwrap().unwrap().funded_amount,
            Some(9_900)
        );
    }

    #[tokio::test]
    async fn funding_before_acceptance_is_reported_not_applied() {
        let (reconciler, storage, mut escrow) = fixture(100_000_000);
        escrow.status = EscrowStatus::Initiated;
        storage.create_escrow(&escrow).await.unwrap();

        let outcome = reconciler.check_funding(escrow.id).await.unwrap();
        assert!(!outcome.funded);
        assert_eq!(outcome.balance, 10_000);
        assert_eq!(outcome.status, EscrowStatus::Initiated);
    }
}
