//! Alloy-backed [`ChainService`] with ordered endpoint failover.

use super::{ChainService, IERC20, IEscrowVault, ReleaseInstruction};
use crate::{config::TransactionConfig, error::ChainError, metrics::GatewayMetrics};
use alloy::{
    network::EthereumWallet,
    primitives::{Address, TxHash, U256},
    providers::{DynProvider, PendingTransactionConfig, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;
use std::{future::Future, time::Duration};
use tracing::{debug, warn};
use url::Url;

/// Chain gateway over an ordered list of RPC endpoints.
///
/// Every call is tried against the endpoints in order under a fixed timeout;
/// [`ChainError::Unavailable`] surfaces only once all endpoints are
/// exhausted. The wallet holds the trusted-executor key, the single service
/// capability authorized to submit release transactions after off-chain
/// approvals are collected.
#[derive(Debug)]
pub struct ChainGateway {
    providers: Vec<DynProvider>,
    call_timeout: Duration,
    confirmation_timeout: Duration,
    min_confirmations: u64,
    metrics: GatewayMetrics,
}

impl ChainGateway {
    /// Connects a provider per endpoint, all sharing the executor wallet.
    pub fn connect(endpoints: &[Url], executor: PrivateKeySigner, config: &TransactionConfig) -> Self {
        let wallet = EthereumWallet::from(executor);
        let providers = endpoints
            .iter()
            .map(|url| {
                ProviderBuilder::new().wallet(wallet.clone()).connect_http(url.clone()).erased()
            })
            .collect();

        Self {
            providers,
            call_timeout: config.call_timeout,
            confirmation_timeout: config.confirmation_timeout,
            min_confirmations: config.min_confirmations,
            metrics: GatewayMetrics::default(),
        }
    }

    /// Runs `f` against each endpoint in order until one succeeds within the
    /// call timeout.
    async fn try_endpoints<T, E, F, Fut>(&self, op: &'static str, f: F) -> Result<T, ChainError>
    where
        F: Fn(DynProvider) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut last_error = String::from("no rpc endpoints configured");
        for (endpoint, provider) in self.providers.iter().enumerate() {
            if endpoint > 0 {
                self.metrics.failovers.increment(1);
            }
            match tokio::time::timeout(self.call_timeout, f(provider.clone())).await {
                Ok(Ok(value)) => {
                    debug!(op, endpoint, "rpc call succeeded");
                    return Ok(value);
                }
                Ok(Err(err)) => {
                    warn!(op, endpoint, %err, "rpc call failed, advancing to next endpoint");
                    last_error = err.to_string();
                }
                Err(_) => {
                    warn!(op, endpoint, timeout = ?self.call_timeout, "rpc call timed out");
                    last_error = format!("timed out after {:?}", self.call_timeout);
                }
            }
        }

        Err(ChainError::Unavailable { attempted: self.providers.len(), last_error })
    }
}

#[async_trait]
impl ChainService for ChainGateway {
    async fn token_balance(&self, token: Address, holder: Address) -> Result<U256, ChainError> {
        self.try_endpoints("token_balance", |provider| async move {
            IERC20::new(token, provider).balanceOf(holder).call().await
        })
        .await
    }

    async fn submit_release(&self, release: &ReleaseInstruction) -> Result<TxHash, ChainError> {
        self.try_endpoints("submit_release", |provider| {
            let release = release.clone();
            async move {
                IEscrowVault::new(release.vault, provider)
                    .release(
                        release.recipient,
                        release.recipient_units,
                        release.payer,
                        release.refund_units,
                    )
                    .send()
                    .await
                    .map(|pending| *pending.tx_hash())
            }
        })
        .await
    }

    async fn wait_for_confirmation(&self, tx_hash: TxHash) -> Result<(), ChainError> {
        let config = PendingTransactionConfig::new(tx_hash)
            .with_required_confirmations(self.min_confirmations)
            .with_timeout(Some(self.confirmation_timeout));

        // Failover applies to registering the watcher; once a watcher is
        // established the outcome is final for this attempt.
        let mut last_error = String::from("no rpc endpoints configured");
        for (endpoint, provider) in self.providers.iter().enumerate() {
            let watcher = match provider.watch_pending_transaction(config.clone()).await {
                Ok(watcher) => watcher,
                Err(err) => {
                    warn!(endpoint, %err, "failed to register transaction watcher");
                    last_error = err.to_string();
                    continue;
                }
            };

            if watcher.await.is_err() {
                return Err(ChainError::ConfirmationTimeout(tx_hash));
            }

            return match provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) if receipt.status() => {
                    self.metrics.confirmations.increment(1);
                    Ok(())
                }
                Ok(Some(_)) => Err(ChainError::ReleaseExecutionFailed {
                    tx_hash: Some(tx_hash),
                    reason: "transaction reverted".into(),
                }),
                Ok(None) => Err(ChainError::ConfirmationTimeout(tx_hash)),
                Err(err) => Err(ChainError::Unavailable {
                    attempted: endpoint + 1,
                    last_error: err.to_string(),
                }),
            };
        }

        Err(ChainError::Unavailable { attempted: self.providers.len(), last_error })
    }
}
