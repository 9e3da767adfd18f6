//! Coordinator spawn utilities.
use crate::{
    chain::ChainGateway,
    cli::Args,
    config::EscrowConfig,
    identity::StaticWalletDirectory,
    metrics,
    notify::LogNotifier,
    rpc::{EscrowApiServer, EscrowCoordinator},
    storage::EscrowStorage,
};
use alloy::signers::local::PrivateKeySigner;
use eyre::{OptionExt, WrapErr};
use http::header;
use jsonrpsee::server::{Server, ServerConfig, ServerHandle};
use metrics_exporter_prometheus::PrometheusHandle;
use std::{net::SocketAddr, path::Path, sync::Arc};
use tower::ServiceBuilder;
use tower_http::cors::{AllowMethods, AllowOrigin, CorsLayer};
use tracing::info;

/// Context returned once the coordinator is launched.
#[derive(Debug)]
pub struct EscrowHandle {
    /// The socket address to which the server is bound.
    pub local_addr: SocketAddr,
    /// Handle to RPC server.
    pub server: ServerHandle,
    /// Storage of the coordinator.
    pub storage: EscrowStorage,
    /// Metrics collector handle.
    pub metrics: PrometheusHandle,
}

impl EscrowHandle {
    /// Returns the url to the http server.
    pub fn http_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }
}

/// Attempts to spawn the coordinator using CLI arguments and a configuration
/// file.
pub async fn try_spawn_with_args<P: AsRef<Path>>(
    args: Args,
    config_path: P,
) -> eyre::Result<EscrowHandle> {
    let config = args.merge_escrow_config(EscrowConfig::load_from_file(config_path)?);
    try_spawn(config).await
}

/// Spawns the coordinator using the provided [`EscrowConfig`].
pub async fn try_spawn(config: EscrowConfig) -> eyre::Result<EscrowHandle> {
    // setup metrics exporter
    let metrics = metrics::setup_exporter((config.server.address, config.server.metrics_port));

    // construct the executor-backed chain gateway
    let executor: PrivateKeySigner = config
        .secrets
        .executor_key
        .as_deref()
        .ok_or_eyre("no executor key configured")?
        .parse()
        .wrap_err("invalid executor key")?;
    info!("Executor address: {}", executor.address());
    let gateway =
        Arc::new(ChainGateway::connect(&config.chain.endpoints, executor, &config.transactions));

    info!("Using in-memory storage.");
    let storage = EscrowStorage::in_memory();

    // construct rpc module
    let coordinator = EscrowCoordinator::new(
        &config,
        storage.clone(),
        gateway,
        Arc::new(StaticWalletDirectory::default()),
        Arc::new(LogNotifier),
    );
    let rpc = coordinator.into_rpc();

    // http layers
    let cors = CorsLayer::new()
        .allow_methods(AllowMethods::any())
        .allow_origin(AllowOrigin::any())
        .allow_headers([header::CONTENT_TYPE]);

    // start server
    let server_config = ServerConfig::builder()
        .http_only()
        .max_connections(config.server.max_connections)
        .build();
    let server = Server::builder()
        .set_config(server_config)
        .set_http_middleware(ServiceBuilder::new().layer(cors))
        .build((config.server.address, config.server.port))
        .await?;
    let addr = server.local_addr()?;
    info!(%addr, "Started escrow coordinator");

    Ok(EscrowHandle { local_addr: addr, server: server.start(rpc), storage, metrics })
}
