//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound ports: per-family chain adapters over a generic
//! `ChainClient`, the wire codecs they share with the simulated chain, key
//! custody, clocks, order intake and swap persistence.

pub mod codec;
mod clock;
mod escrow_rpc;
mod evm;
pub mod local_signer;
mod order_source;
pub mod simulated;
mod store;
mod submit;
mod tvm;

pub use clock::{SystemClock, TokioClock};
pub use evm::EvmAdapter;
pub use local_signer::LocalSigner;
pub use order_source::StaticOrderSource;
pub use simulated::{SimulatedChain, SimulatedChainConfig};
pub use store::{InMemorySwapStore, JsonDirSwapStore};
pub use submit::TxSubmitter;
pub use tvm::TvmAdapter;
