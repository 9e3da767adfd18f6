//! Escrow storage implementation in-memory.

use super::{StorageApi, api::Result};
use crate::{
    error::StorageError,
    types::{
        Escrow, EscrowId, EscrowStatus, PartyRole, ProposalId, SettlementProposal,
        StatusTransition,
    },
};
use async_trait::async_trait;
use dashmap::DashMap;

/// [`StorageApi`] implementation in-memory. Used for testing and single-node
/// deployments.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    escrows: DashMap<EscrowId, Escrow>,
    transitions: DashMap<EscrowId, Vec<StatusTransition>>,
    proposals: DashMap<ProposalId, SettlementProposal>,
}

#[async_trait]
impl StorageApi for InMemoryStorage {
    async fn create_escrow(&self, escrow: &Escrow) -> Result<()> {
        match self.escrows.entry(escrow.id) {
            dashmap::Entry::Occupied(_) => Err(StorageError::EscrowAlreadyExists(escrow.id)),
            dashmap::Entry::Vacant(entry) => {
                entry.insert(escrow.clone());
                Ok(())
            }
        }
    }

    async fn read_escrow(&self, id: EscrowId) -> Result<Option<Escrow>> {
        Ok(self.escrows.get(&id).map(|e| e.clone()))
    }

    async fn update_escrow(&self, escrow: &Escrow, expected: EscrowStatus) -> Result<()> {
        // The map shard lock makes check-then-write atomic, mirroring a
        // conditional `UPDATE ... WHERE status = $expected`.
        let mut row = self
            .escrows
            .get_mut(&escrow.id)
            .ok_or(StorageError::EscrowNotFound(escrow.id))?;
        if row.status != expected {
            return Err(StorageError::StatusConflict {
                escrow_id: escrow.id,
                expected,
                actual: row.status,
            });
        }
        *row = escrow.clone();
        Ok(())
    }

    async fn record_approval(&self, id: EscrowId, role: PartyRole) -> Result<Escrow> {
        let mut row = self.escrows.get_mut(&id).ok_or(StorageError::EscrowNotFound(id))?;
        match role {
            PartyRole::Payer => row.payer_approved = true,
            PartyRole::Recipient => row.recipient_approved = true,
        }
        row.updated_at = chrono::Utc::now();
        Ok(row.clone())
    }

    async fn append_transition(&self, transition: &StatusTransition) -> Result<()> {
        self.transitions.entry(transition.escrow_id).or_default().push(transition.clone());
        Ok(())
    }

    async fn read_transitions(&self, id: EscrowId) -> Result<Vec<StatusTransition>> {
        Ok(self.transitions.get(&id).map(|log| log.clone()).unwrap_or_default())
    }

    async fn write_proposal(&self, proposal: &SettlementProposal) -> Result<()> {
        self.proposals.insert(proposal.id, proposal.clone());
        Ok(())
    }

    async fn read_proposal(&self, id: ProposalId) -> Result<Option<SettlementProposal>> {
        Ok(self.proposals.get(&id).map(|p| p.clone()))
    }
}
