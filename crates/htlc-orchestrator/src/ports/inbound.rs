//! # Inbound Ports
//!
//! API trait defining what the orchestrator offers operational tooling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{ChainFamily, RecoveryBundle, SwapError, SwapId, SwapRequest, SwapSnapshot};

/// Connectivity of one chain as last observed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHealth {
    /// Chain name.
    pub chain: String,
    /// Chain family.
    pub family: ChainFamily,
    /// Last RPC call succeeded.
    pub connected: bool,
    /// Last block height seen.
    pub last_block: Option<u64>,
    /// Last RPC error.
    pub last_error: Option<String>,
}

/// Scrape-friendly health summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Swaps not yet terminal.
    pub active_swaps: u64,
    /// Swaps started since boot.
    pub started: u64,
    /// Swaps completed.
    pub completed: u64,
    /// Swaps cancelled.
    pub cancelled: u64,
    /// Swaps failed.
    pub failed: u64,
    /// completed / terminal, 1.0 before any terminal swap.
    pub success_rate: f64,
    /// Mean creation-to-completion time over the rolling window.
    pub avg_completion_secs: Option<f64>,
    /// Transient errors absorbed by retries.
    pub retries: u64,
    /// Per-chain connectivity.
    pub chains: Vec<ChainHealth>,
}

/// Swap orchestrator API - inbound port.
#[async_trait]
pub trait SwapOrchestratorApi: Send + Sync {
    /// Validate and start a swap. Validation errors return before any chain action.
    async fn create_swap(&self, request: SwapRequest) -> Result<SwapId, SwapError>;

    /// Current snapshot (active or historical).
    fn get_swap_status(&self, id: &SwapId) -> Result<SwapSnapshot, SwapError>;

    /// Snapshots of every active swap.
    fn list_active_swaps(&self) -> Vec<SwapSnapshot>;

    /// Request early cancellation. Honoured at the next suspension point and
    /// still subject to on-chain timelocks.
    async fn cancel_swap(&self, id: &SwapId) -> Result<(), SwapError>;

    /// Manual recovery data including the secret.
    fn recovery_bundle(&self, id: &SwapId) -> Result<RecoveryBundle, SwapError>;

    /// Health and metrics summary.
    fn health(&self) -> HealthSnapshot;

    /// Wait until the swap is terminal or `timeout` passes.
    async fn wait_for_terminal(
        &self,
        id: &SwapId,
        timeout: Duration,
    ) -> Result<SwapSnapshot, SwapError>;
}
