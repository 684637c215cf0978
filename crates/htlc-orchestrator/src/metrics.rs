//! # Swap Metrics
//!
//! Prometheus metrics for swap throughput, outcomes and chain health.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! htlc-orchestrator = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `htlc_swaps_started_total` - Swaps accepted
//! - `htlc_swaps_finished_total` - Terminal swaps (by outcome)
//! - `htlc_swaps_active` - Swaps not yet terminal
//! - `htlc_swap_duration_seconds` - Creation-to-completion time
//! - `htlc_transient_retries_total` - Transient errors absorbed (by chain)
//! - `htlc_contract_rejections_total` - Contract rejections (by chain and kind)
//! - `htlc_failures_total` - Failed swaps (by reason)
//! - `htlc_chain_up` - Last RPC call to a chain succeeded (0/1)
//! - `htlc_chain_block_height` - Last observed block height

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_counter_vec,
    register_int_gauge, GaugeVec, Histogram, IntCounter, IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Swaps accepted
    pub static ref SWAPS_STARTED: IntCounter = register_int_counter!(
        "htlc_swaps_started_total",
        "Total number of swaps accepted"
    )
    .expect("Failed to create SWAPS_STARTED metric");

    /// Terminal swaps, labeled by outcome
    pub static ref SWAPS_FINISHED: IntCounterVec = register_int_counter_vec!(
        "htlc_swaps_finished_total",
        "Total number of swaps reaching a terminal state",
        &["outcome"]
    )
    .expect("Failed to create SWAPS_FINISHED metric");

    /// Swaps not yet terminal
    pub static ref SWAPS_ACTIVE: IntGauge = register_int_gauge!(
        "htlc_swaps_active",
        "Number of swaps being driven"
    )
    .expect("Failed to create SWAPS_ACTIVE metric");

    /// Creation-to-completion time
    pub static ref SWAP_DURATION: Histogram = register_histogram!(
        "htlc_swap_duration_seconds",
        "Time from swap creation to completion",
        vec![60.0, 300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0]
    )
    .expect("Failed to create SWAP_DURATION metric");

    /// Transient errors absorbed by retries, labeled by chain
    pub static ref TRANSIENT_RETRIES: IntCounterVec = register_int_counter_vec!(
        "htlc_transient_retries_total",
        "Total number of transient chain errors retried",
        &["chain"]
    )
    .expect("Failed to create TRANSIENT_RETRIES metric");

    /// Contract rejections, labeled by chain and kind
    pub static ref CONTRACT_REJECTIONS: IntCounterVec = register_int_counter_vec!(
        "htlc_contract_rejections_total",
        "Total number of escrow contract rejections",
        &["chain", "kind"]
    )
    .expect("Failed to create CONTRACT_REJECTIONS metric");

    /// Failed swaps, labeled by reason
    pub static ref FAILURES: IntCounterVec = register_int_counter_vec!(
        "htlc_failures_total",
        "Total number of swaps escalated to failed",
        &["reason"]
    )
    .expect("Failed to create FAILURES metric");

    /// Chain reachability
    pub static ref CHAIN_UP: GaugeVec = register_gauge_vec!(
        "htlc_chain_up",
        "Whether the last RPC call to the chain succeeded (0=no, 1=yes)",
        &["chain"]
    )
    .expect("Failed to create CHAIN_UP metric");

    /// Last observed block height
    pub static ref CHAIN_BLOCK_HEIGHT: GaugeVec = register_gauge_vec!(
        "htlc_chain_block_height",
        "Last observed block height",
        &["chain"]
    )
    .expect("Failed to create CHAIN_BLOCK_HEIGHT metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

/// Record a swap accepted
#[cfg(feature = "metrics")]
pub fn record_swap_started() {
    SWAPS_STARTED.inc();
    SWAPS_ACTIVE.inc();
}

/// Record a terminal swap
#[cfg(feature = "metrics")]
pub fn record_swap_finished(outcome: &str, duration_secs: Option<u64>) {
    SWAPS_FINISHED.with_label_values(&[outcome]).inc();
    SWAPS_ACTIVE.dec();
    if let Some(secs) = duration_secs {
        SWAP_DURATION.observe(secs as f64);
    }
}

/// Record a transient error absorbed by a retry
#[cfg(feature = "metrics")]
pub fn record_retry(chain: &str) {
    TRANSIENT_RETRIES.with_label_values(&[chain]).inc();
}

/// Record a contract rejection
#[cfg(feature = "metrics")]
pub fn record_rejection(chain: &str, kind: &str) {
    CONTRACT_REJECTIONS.with_label_values(&[chain, kind]).inc();
}

/// Record a swap escalated to failed
#[cfg(feature = "metrics")]
pub fn record_failure(reason: &str) {
    FAILURES.with_label_values(&[reason]).inc();
}

/// Update chain reachability and height
#[cfg(feature = "metrics")]
pub fn set_chain_health(chain: &str, up: bool, height: Option<u64>) {
    CHAIN_UP
        .with_label_values(&[chain])
        .set(if up { 1.0 } else { 0.0 });
    if let Some(h) = height {
        CHAIN_BLOCK_HEIGHT.with_label_values(&[chain]).set(h as f64);
    }
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_swap_started() {}

#[cfg(not(feature = "metrics"))]
pub fn record_swap_finished(_outcome: &str, _duration_secs: Option<u64>) {}

#[cfg(not(feature = "metrics"))]
pub fn record_retry(_chain: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_rejection(_chain: &str, _kind: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_failure(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn set_chain_health(_chain: &str, _up: bool, _height: Option<u64>) {}
