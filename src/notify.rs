//! Party notifications.
//!
//! Notifications are fire-and-forget: a failed delivery is logged and
//! swallowed, never blocking or rolling back a state transition.

use crate::types::PartyRole;
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::{info, warn};

/// An event a party should be told about.
#[derive(Debug, Clone)]
pub enum EscrowEvent {
    /// An escrow naming the party was created.
    Created,
    /// The recipient accepted the escrow terms.
    Accepted,
    /// A party declined the escrow before funding.
    Declined,
    /// The vault crossed the funding threshold.
    Funded {
        /// Observed balance in minor units.
        amount: u64,
    },
    /// One party approved release.
    ApprovalRecorded {
        /// The approving party.
        role: PartyRole,
    },
    /// The release confirmed on-chain.
    Released {
        /// Net recipient payout in minor units.
        payout: u64,
        /// Amount refunded to the payer in minor units.
        refund: u64,
    },
    /// The release transaction failed; a retry is possible.
    ReleaseFailed,
    /// The counterparty proposed a settlement split.
    SettlementProposed {
        /// Gross recipient amount in minor units.
        recipient_amount: u64,
    },
    /// A pending settlement proposal was rejected.
    SettlementRejected,
}

/// Fire-and-forget notification delivery.
#[async_trait]
pub trait Notifier: Debug + Send + Sync {
    /// Notifies the identity that the event occurred.
    async fn notify(&self, identity: &str, event: &EscrowEvent) -> eyre::Result<()>;
}

/// [`Notifier`] that only logs. Used for testing and as a safe default.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, identity: &str, event: &EscrowEvent) -> eyre::Result<()> {
        info!(identity, ?event, "notify");
        Ok(())
    }
}

/// Delivers a notification, logging and swallowing any failure.
pub async fn notify_or_log(notifier: &dyn Notifier, identity: &str, event: &EscrowEvent) {
    if let Err(err) = notifier.notify(identity, event).await {
        warn!(identity, ?event, %err, "notification delivery failed");
    }
}
