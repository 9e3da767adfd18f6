//! # Escrowd CLI
use crate::{config::EscrowConfig, spawn::try_spawn_with_args};
use clap::Parser;
use std::{
    net::{IpAddr, Ipv4Addr},
    path::PathBuf,
};

/// The escrowd service coordinates two-party USDC escrows.
#[derive(Debug, Parser)]
#[command(author, about = "Escrowd", long_about = None)]
pub struct Args {
    /// The configuration file.
    #[arg(long, value_name = "CONFIG", env = "ESCROWD_CONFIG", default_value = "escrowd.yaml")]
    pub config: PathBuf,
    /// The address to serve the RPC on.
    #[arg(long = "http.addr", value_name = "ADDR", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub address: IpAddr,
    /// The port to serve the RPC on.
    #[arg(long = "http.port", value_name = "PORT", default_value_t = 9229)]
    pub port: u16,
    /// The port to serve the metrics on.
    #[arg(long = "http.metrics-port", value_name = "PORT", default_value_t = 9000)]
    pub metrics_port: u16,
    /// The hex-encoded private key of the trusted executor used to submit
    /// release transactions.
    #[arg(long = "executor-key", value_name = "SECRET_KEY", env = "ESCROWD_EXECUTOR_KEY")]
    pub executor_key: Option<String>,
}

impl Args {
    /// Run the escrow coordinator.
    pub async fn run(self) -> eyre::Result<()> {
        let config_path = self.config.clone();
        try_spawn_with_args(self, &config_path).await?.server.stopped().await;

        Ok(())
    }

    /// Merges [`Args`] values into an existing [`EscrowConfig`] instance.
    pub fn merge_escrow_config(self, mut config: EscrowConfig) -> EscrowConfig {
        config.server.address = self.address;
        config.server.port = self.port;
        config.server.metrics_port = self.metrics_port;
        if self.executor_key.is_some() {
            config.secrets.executor_key = self.executor_key;
        }
        config
    }
}
