//! # HTLC Swap Orchestrator
//!
//! Off-chain resolver core driving hashed-timelock swaps between an
//! EVM-style chain and a TVM-style chain.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! For each swap the orchestrator generates a secret, schedules both
//! escrows' timelocks, creates and funds the escrows, waits for finality,
//! reveals the secret on the destination chain and completes the source
//! withdrawal. Anything that goes wrong before the reveal is refunded
//! through the cancellation windows.
//!
//! ## Safety Properties
//!
//! | Property | Enforced by |
//! |----------|-------------|
//! | Destination window closes before source cancellation | `TimelockPolicy` at creation |
//! | Secret never revealed before both legs are final | `SwapDriver` ordering |
//! | Secret never logged or printed | `SecureSecret` |
//! | No cancellation after the reveal | `SwapStatus::is_cancellable` |
//! | Timelocks judged on chain time | `ChainAdapter::chain_time` |
//!
//! ## Module Structure
//!
//! ```text
//! htlc-orchestrator/
//! ├── domain/          # Swap aggregate, state machine, timelocks, errors
//! ├── algorithms/      # Secrets, timelock policy, order hash, retry
//! ├── ports/           # SwapOrchestratorApi, ChainAdapter, ChainClient, ...
//! ├── adapters/        # EVM/TVM adapters, codecs, simulated chain, stores
//! ├── service/         # Orchestrator, drivers, registry, watcher, health
//! ├── config.rs        # OrchestratorConfig
//! └── metrics.rs       # Prometheus metrics (feature = "metrics")
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    EvmAdapter, InMemorySwapStore, JsonDirSwapStore, LocalSigner, SimulatedChain,
    SimulatedChainConfig, StaticOrderSource, SystemClock, TokioClock, TvmAdapter,
};
pub use algorithms::{
    compute_order_hash, escrow_salt, generate_random_secret, retry_transient, verify_secret,
    RetryPolicy, SecretManager, TimelockPolicy,
};
pub use config::{ChainConfig, ConfigError, OrchestratorConfig, TimelockPolicyConfig};
pub use domain::{
    Address, ChainFamily, ContractRejectionKind, EscrowRef, EscrowState, FailureReason,
    HashAlgorithm, Hashlock, HashlockPair, Leg, LegTerms, LegTimelocks, OrderHash,
    RecoveryBundle, SecureSecret, Swap, SwapDirection, SwapError, SwapId, SwapRequest,
    SwapSnapshot, SwapStatus, TimelockDelays, Timelocks, TokenRef, TxKind, ValidationError,
};
pub use ports::{
    ChainAdapter, ChainClient, ChainHealth, Clock, HealthSnapshot, OrderSource, SignerProvider,
    SwapOrchestratorApi, SwapStore,
};
pub use service::{MetricsCollector, Orchestrator, SwapRegistry};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
