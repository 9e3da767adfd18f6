//! Escrow storage

mod api;
pub use api::StorageApi;
mod memory;
pub use memory::InMemoryStorage;

use crate::types::{
    Escrow, EscrowId, EscrowStatus, PartyRole, ProposalId, SettlementProposal, StatusTransition,
};
use async_trait::async_trait;
use std::sync::Arc;

/// Escrow storage interface.
#[derive(Debug, Clone)]
pub struct EscrowStorage {
    inner: Arc<dyn StorageApi>,
}

impl EscrowStorage {
    /// Create [`EscrowStorage`] with a custom backend.
    pub fn new(inner: Arc<dyn StorageApi>) -> Self {
        Self { inner }
    }

    /// Create [`EscrowStorage`] with an in-memory backend.
    pub fn in_memory() -> Self {
        Self { inner: Arc::new(InMemoryStorage::default()) }
    }
}

#[async_trait]
impl StorageApi for EscrowStorage {
    async fn create_escrow(&self, escrow: &Escrow) -> api::Result<()> {
        self.inner.create_escrow(escrow).await
    }

    async fn read_escrow(&self, id: EscrowId) -> api::Result<Option<Escrow>> {
        self.inner.read_escrow(id).await
    }

    async fn update_escrow(&self, escrow: &Escrow, expected: EscrowStatus) -> api::Result<()> {
        self.inner.update_escrow(escrow, expected).await
    }

    async fn record_approval(&self, id: EscrowId, role: PartyRole) -> api::Result<Escrow> {
        self.inner.record_approval(id, role).await
    }

    async fn append_transition(&self, transition: &StatusTransition) -> api::Result<()> {
        self.inner.append_transition(transition).await
    }

    async fn read_transitions(&self, id: EscrowId) -> api::Result<Vec<StatusTransition>> {
        self.inner.read_transitions(id).await
    }

    async fn write_proposal(&self, proposal: &SettlementProposal) -> api::Result<()> {
        self.inner.write_proposal(proposal).await
    }

    async fn read_proposal(&self, id: ProposalId) -> api::Result<Option<SettlementProposal>> {
        self.inner.read_proposal(id).await
    }
}
