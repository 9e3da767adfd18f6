//! Escrow storage api.

use crate::{
    error::StorageError,
    types::{Escrow, EscrowId, EscrowStatus, PartyRole, ProposalId, SettlementProposal, StatusTransition},
};
use async_trait::async_trait;
use std::fmt::Debug;

/// Type alias for `Result<T, StorageError>`
pub type Result<T> = core::result::Result<T, StorageError>;

/// Storage API.
///
/// Backends must provide per-row optimistic concurrency: [`Self::update_escrow`]
/// is a conditional write on the expected current status, and
/// [`Self::record_approval`] sets one approval flag atomically. The transition
/// log is append-only.
#[async_trait]
pub trait StorageApi: Debug + Send + Sync {
    /// Inserts a new [`Escrow`]. Fails if the id is already taken.
    async fn create_escrow(&self, escrow: &Escrow) -> Result<()>;

    /// Reads an [`Escrow`] from storage.
    async fn read_escrow(&self, id: EscrowId) -> Result<Option<Escrow>>;

    /// Writes the full escrow row, conditioned on the stored status still
    /// being `expected`.
    ///
    /// A lost race surfaces as [`StorageError::StatusConflict`]; the caller
    /// re-reads and re-validates instead of force-applying.
    async fn update_escrow(&self, escrow: &Escrow, expected: EscrowStatus) -> Result<()>;

    /// Atomically sets one party's approval flag and returns the updated row.
    async fn record_approval(&self, id: EscrowId, role: PartyRole) -> Result<Escrow>;

    /// Appends an entry to the transition log.
    async fn append_transition(&self, transition: &StatusTransition) -> Result<()>;

    /// Reads the transition log for an escrow, oldest first.
    async fn read_transitions(&self, id: EscrowId) -> Result<Vec<StatusTransition>>;

    /// Inserts or replaces a settlement proposal.
    async fn write_proposal(&self, proposal: &SettlementProposal) -> Result<()>;

    /// Reads a settlement proposal from storage.
    async fn read_proposal(&self, id: ProposalId) -> Result<Option<SettlementProposal>>;
}
