//! Core escrow types.

mod escrow;
pub use escrow::{Escrow, EscrowId, EscrowStatus, Party, PartyRole, StatusTransition};

mod settlement;
pub use settlement::{ProposalId, ProposalStatus, SettlementProposal};

pub mod rpc;
