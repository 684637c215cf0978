//! # Service Layer
//!
//! The orchestrator, its per-swap drivers, the swap registry, the chain
//! watcher and the health collector.

mod collector;
mod driver;
mod orchestrator;
pub(crate) mod registry;
mod watcher;

pub use collector::{MetricsCollector, LATENCY_WINDOW};
pub use orchestrator::Orchestrator;
pub use registry::{SwapHandle, SwapRegistry};
