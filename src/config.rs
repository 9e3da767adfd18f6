//! Escrow coordinator configuration.

use crate::constants::{
    DEFAULT_CALL_TIMEOUT, DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_FEE_BPS,
    DEFAULT_FUNDING_TOLERANCE_BPS, DEFAULT_MIN_CONFIRMATIONS, DEFAULT_PROPOSAL_TTL,
    DEFAULT_RPC_MAX_CONNECTIONS, DEFAULT_TOKEN_DECIMALS,
};
use alloy::primitives::{Address, B256, ChainId};
use eyre::Context;
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr},
    path::Path,
    time::Duration,
};
use url::Url;

/// Escrow coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Chain connectivity configuration.
    pub chain: ChainConfig,
    /// Vault system contract addresses and hashes.
    pub contracts: ContractsConfig,
    /// Fee configuration.
    #[serde(default)]
    pub fees: FeeConfig,
    /// Funding reconciliation configuration.
    #[serde(default)]
    pub funding: FundingConfig,
    /// Settlement negotiation configuration.
    #[serde(default)]
    pub settlement: SettlementConfig,
    /// Transaction submission and confirmation configuration.
    #[serde(default)]
    pub transactions: TransactionConfig,
    /// Secrets.
    #[serde(skip_serializing, default)]
    pub secrets: SecretsConfig,
}

impl EscrowConfig {
    /// Loads the configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> eyre::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to open config file: {}", path.display()))?;
        serde_yaml::from_reader(&file)
            .wrap_err_with(|| format!("failed to parse config file: {}", path.display()))
    }
}

/// RPC server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address to serve the RPC on.
    pub address: IpAddr,
    /// The port to serve the RPC on.
    pub port: u16,
    /// The port to serve Prometheus metrics on.
    pub metrics_port: u16,
    /// The maximum number of concurrent connections.
    pub max_connections: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9229,
            metrics_port: 9000,
            max_connections: DEFAULT_RPC_MAX_CONNECTIONS,
        }
    }
}

/// Chain connectivity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Chain the vaults live on.
    pub chain_id: ChainId,
    /// Ordered RPC endpoints; earlier entries are preferred, later ones are
    /// failover.
    pub endpoints: Vec<Url>,
    /// Address of the escrow token (USDC).
    pub token: Address,
    /// Decimals of the escrow token.
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,
}

fn default_token_decimals() -> u8 {
    DEFAULT_TOKEN_DECIMALS
}

/// Vault system contract parameters used for address derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// CREATE2 factory deploying vaults and splitters.
    pub factory: Address,
    /// Init code hash of the vault contract.
    pub vault_code_hash: B256,
    /// Init code hash of the fee splitter contract.
    pub splitter_code_hash: B256,
    /// Contract version the hashes correspond to. Persisted on every escrow
    /// so derivation drift is attributable.
    pub version: String,
}

/// Fee configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Platform fee in basis points, applied to the recipient leg.
    pub fee_bps: u16,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self { fee_bps: DEFAULT_FEE_BPS }
    }
}

/// Funding reconciliation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Allowed under-funding margin in basis points still treated as funded.
    pub tolerance_bps: u16,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self { tolerance_bps: DEFAULT_FUNDING_TOLERANCE_BPS }
    }
}

/// Settlement negotiation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Lifetime of a pending proposal, checked lazily when the counterparty
    /// responds.
    #[serde(with = "crate::serde::duration")]
    pub proposal_ttl: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { proposal_ttl: DEFAULT_PROPOSAL_TTL }
    }
}

/// Transaction submission and confirmation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Per-call timeout for a single endpoint before advancing to the next.
    #[serde(with = "crate::serde::duration")]
    pub call_timeout: Duration,
    /// Budget for awaiting a release transaction receipt.
    #[serde(with = "crate::serde::duration")]
    pub confirmation_timeout: Duration,
    /// Confirmations required before a release counts as executed.
    pub min_confirmations: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            min_confirmations: DEFAULT_MIN_CONFIRMATIONS,
        }
    }
}

/// Secrets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Hex-encoded private key of the trusted executor, usually injected via
    /// the `ESCROWD_EXECUTOR_KEY` environment variable.
    pub executor_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_config() {
        let yaml = r#"
chain:
  chain_id: 8453
  endpoints:
    - "https://mainnet.base.org"
    - "https://base.llamarpc.com"
  token: "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
contracts:
  factory: "0x4e59b44847b379578588920cA78FbF26c0B4956C"
  vault_code_hash: "0x1111111111111111111111111111111111111111111111111111111111111111"
  splitter_code_hash: "0x2222222222222222222222222222222222222222222222222222222222222222"
  version: "v1"
"#;
        let config: EscrowConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.chain.endpoints.len(), 2);
        assert_eq!(config.chain.token_decimals, 6);
        assert_eq!(config.fees.fee_bps, 199);
        assert_eq!(config.funding.tolerance_bps, 100);
        assert_eq!(config.settlement.proposal_ttl, Duration::from_secs(72 * 60 * 60));
    }

    #[test]
    fn config_round_trips_through_yaml() {
        let yaml = r#"
chain:
  chain_id: 84532
  endpoints: ["https://sepolia.base.org"]
  token: "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
  token_decimals: 6
contracts:
  factory: "0x4e59b44847b379578588920cA78FbF26c0B4956C"
  vault_code_hash: "0x1111111111111111111111111111111111111111111111111111111111111111"
  splitter_code_hash: "0x2222222222222222222222222222222222222222222222222222222222222222"
  version: "v1"
settlement:
  proposal_ttl: 3600
"#;
        let config: EscrowConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.settlement.proposal_ttl, Duration::from_secs(3600));
        let out = serde_yaml::to_string(&config).unwrap();
        let back: EscrowConfig = serde_yaml::from_str(&out).unwrap();
        assert_eq!(back.chain.chain_id, 84532);
    }
}
