//! The escrow state machine.
//!
//! Single owner of the `status` field: the reconciler, release coordinator,
//! and settlement protocol all mutate status through [`StateMachine::transition`].

use crate::{
    error::{EscrowError, LifecycleError},
    storage::{EscrowStorage, StorageApi},
    types::{Escrow, EscrowStatus, StatusTransition},
};
use chrono::Utc;
use tracing::info;

/// Authoritative lifecycle controller.
#[derive(Debug, Clone)]
pub struct StateMachine {
    storage: EscrowStorage,
}

impl StateMachine {
    /// Creates a state machine over the given storage.
    pub fn new(storage: EscrowStorage) -> Self {
        Self { storage }
    }

    /// Applies a status transition to the escrow.
    ///
    /// Validates the edge against the allow-list (never coerces), appends to
    /// the transition log, then updates the status field conditioned on the
    /// status the caller read. Log-then-update ordering makes replays
    /// detectable: the log can confirm a transition happened even if the
    /// status write failed to persist, so callers can retry the idempotent
    /// parts.
    ///
    /// Transitions for one escrow linearize on the conditional status update;
    /// a lost race surfaces as a status conflict rather than a double-apply.
    pub async fn transition(
        &self,
        escrow: &mut Escrow,
        target: EscrowStatus,
        metadata: serde_json::Value,
    ) -> Result<(), EscrowError> {
        let from = escrow.status;
        if !from.allows(target) {
            return Err(LifecycleError::InvalidTransition { from, to: target }.into());
        }

        let record =
            StatusTransition { escrow_id: escrow.id, from, to: target, metadata, at: Utc::now() };
        self.storage.append_transition(&record).await?;

        escrow.status = target;
        escrow.updated_at = record.at;
        self.storage.update_escrow(escrow, from).await?;

        info!(escrow = %escrow.id, %from, to = %target, "escrow transitioned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StorageError,
        types::{EscrowId, Party, PartyRole},
    };
    use alloy::primitives::{Address, B256};
    use serde_json::json;

    fn escrow() -> Escrow {
        let now = Utc::now();
        Escrow {
            id: EscrowId::random(),
            salt: B256::random(),
            chain_id: 8453,
            contract_version: "v1".into(),
            payer: Party { identity: "p@x.com".into(), address: Address::random() },
            recipient: Party { identity: "r@x.com".into(), address: Address::random() },
            amount: 10_000,
            fee_bps: 199,
            vault: Address::random(),
            splitter: Address::random(),
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
        }
    }

    #[tokio::test]
    async fn walks_the_happy_path() {
        let storage = EscrowStorage::in_memory();
        let machine = StateMachine::new(storage.clone());
        let mut e = escrow();
        storage.create_escrow(&e).await.unwrap();

        for target in [
            EscrowStatus::Accepted,
            EscrowStatus::Funded,
            EscrowStatus::PendingRelease,
            EscrowStatus::Released,
        ] {
            machine.transition(&mut e, target, json!({})).await.unwrap();
        }

        let log = storage.read_transitions(e.id).await.unwrap();
        assert_eq!(log.len(), 4);
        // every logged edge is in the allow-list
        for entry in &log {
            assert!(entry.from.allows(entry.to));
        }
        // the log forms a contiguous path
        for pair in log.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }
    }

    #[tokio::test]
    async fn rejects_edges_outside_the_graph() {
        let storage = EscrowStorage::in_memory();
        let machine = StateMachine::new(storage.clone());
        let mut e = escrow();
        storage.create_escrow(&e).await.unwrap();

        let err = machine.transition(&mut e, EscrowStatus::Released, json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            EscrowError::Lifecycle(LifecycleError::InvalidTransition {
                from: EscrowStatus::Initiated,
                to: EscrowStatus::Released,
            })
        ));
        // no state mutation on validation failure
        assert_eq!(storage.read_escrow(e.id).await.unwrap().unwrap().status, EscrowStatus::Initiated);
        assert_eq!(e.status, EscrowStatus::Initiated);
    }

    #[tokio::test]
    async fn racing_transitions_serialize_per_escrow() {
        let storage = EscrowStorage::in_memory();
        let machine = StateMachine::new(storage.clone());
        let mut e = escrow();
        storage.create_escrow(&e).await.unwrap();
        machine.transition(&mut e, EscrowStatus::Accepted, json!({})).await.unwrap();

        // two funding signals race: both read ACCEPTED, only one may apply
        let mut first = storage.read_escrow(e.id).await.unwrap().unwrap();
        let mut second = first.clone();

        machine.transition(&mut first, EscrowStatus::Funded, json!({})).await.unwrap();
        let err =
            machine.transition(&mut second, EscrowStatus::Funded, json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            EscrowError::Storage(StorageError::StatusConflict { .. })
        ));
        assert_eq!(storage.read_escrow(e.id).await.unwrap().unwrap().status, EscrowStatus::Funded);
    }

    #[tokio::test]
    async fn release_failure_is_recoverable() {
        let storage = EscrowStorage::in_memory();
        let machine = StateMachine::new(storage.clone());
        let mut e = escrow();
        e.status = EscrowStatus::PendingRelease;
        storage.create_escrow(&e).await.unwrap();

        machine
            .transition(&mut e, EscrowStatus::ReleaseFailed, json!({"role": PartyRole::Payer}))
            .await
            .unwrap();
        machine.transition(&mut e, EscrowStatus::PendingRelease, json!({})).await.unwrap();
        machine.transition(&mut e, EscrowStatus::Released, json!({})).await.unwrap();
        assert!(e.status.is_terminal());
    }
}
