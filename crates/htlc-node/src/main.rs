//! # HTLC Swap Node
//!
//! Devnet runtime for the swap orchestrator.
//!
//! ## Startup Sequence
//!
//! 1. Initialise telemetry from `SWAP_*` variables
//! 2. Load `swap-node.toml` (or `SWAP_NODE_CONFIG`), apply env overrides
//! 3. Create both simulated chains and fund every configured party
//! 4. Build the orchestrator, resume stored swaps, queue `[[orders]]`
//! 5. Serve `/health` and `/metrics`
//! 6. On Ctrl-C: stop intake, drain drivers, stop the HTTP server

mod config;
mod devnet;
mod http;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::oneshot;
use tracing::{error, info};

use htlc_orchestrator::{
    Clock, InMemorySwapStore, JsonDirSwapStore, OrderSource, Orchestrator, StaticOrderSource,
    SwapStore, SystemClock,
};
use htlc_telemetry::{init_telemetry, TelemetryConfig};

use crate::config::{config_path, NodeConfig};
use crate::devnet::Devnet;
use crate::http::AppState;

fn open_store(config: &NodeConfig) -> Result<Arc<dyn SwapStore>> {
    match &config.devnet.data_dir {
        Some(dir) => {
            let store = JsonDirSwapStore::open(dir)
                .with_context(|| format!("failed to open swap store at {}", dir.display()))?;
            info!(dir = %dir.display(), "persisting swaps to disk");
            Ok(Arc::new(store))
        }
        None => {
            info!("persisting swaps in memory only");
            Ok(Arc::new(InMemorySwapStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = TelemetryConfig::from_env();
    let metrics_port = telemetry.metrics_port;
    let _telemetry = init_telemetry(telemetry)
        .await
        .context("failed to initialise telemetry")?;

    let lookup = |key: &str| std::env::var(key).ok();
    let config = NodeConfig::load(&config_path(lookup))?.apply_env(lookup)?;

    info!("===========================================");
    info!("  HTLC Swap Node v{}", env!("CARGO_PKG_VERSION"));
    info!("  EVM chain:     {}", config.orchestrator.evm.name);
    info!("  Non-EVM chain: {}", config.orchestrator.non_evm.name);
    info!("===========================================");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut devnet = Devnet::new(&config.orchestrator, Arc::clone(&clock));
    devnet.fund_parties(
        &config.orchestrator,
        &config.orders,
        config.devnet.initial_balance,
    );
    let (evm, non_evm) = devnet.adapters(&config.orchestrator);

    let store = open_store(&config)?;
    let orchestrator = Arc::new(
        Orchestrator::new(config.orchestrator.clone(), evm, non_evm, clock, store)
            .context("failed to build orchestrator")?,
    );

    let resumed = orchestrator
        .resume()
        .context("failed to resume stored swaps")?;
    let orders: Arc<dyn OrderSource> = Arc::new(StaticOrderSource::new(config.orders.clone()));
    orchestrator.start(Some(orders));
    info!(resumed, queued = config.orders.len(), "swaps scheduled");

    let addr = config.http.addr(metrics_port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(addr = %addr, "serving /health and /metrics");

    let app = http::router(AppState {
        orchestrator: Arc::clone(&orchestrator),
    });
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!("Initiating graceful shutdown...");
    orchestrator.shutdown().await;
    let _ = stop_tx.send(());
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "HTTP server failed"),
        Err(e) => error!(error = %e, "HTTP server task panicked"),
    }

    info!("Shutdown complete");
    Ok(())
}
