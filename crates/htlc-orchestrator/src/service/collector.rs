//! # Metrics Collector
//!
//! In-process counters behind `health()`. Mirrors every update into the
//! Prometheus registry when the `metrics` feature is on. Nothing here feeds
//! back into swap decisions.

use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::{ChainFamily, ContractRejectionKind, FailureReason, SwapStatus};
use crate::metrics;
use crate::ports::{ChainHealth, HealthSnapshot};

/// Completion latencies kept for the rolling average.
pub const LATENCY_WINDOW: usize = 256;

/// Swap outcome counters, rolling latency and chain connectivity.
pub struct MetricsCollector {
    started: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    latencies: Mutex<VecDeque<u64>>,
    chains: RwLock<Vec<ChainHealth>>,
}

impl MetricsCollector {
    /// Collector tracking the given chains.
    pub fn new(chains: &[(String, ChainFamily)]) -> Self {
        Self {
            started: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            latencies: Mutex::new(VecDeque::with_capacity(LATENCY_WINDOW)),
            chains: RwLock::new(
                chains
                    .iter()
                    .map(|(name, family)| ChainHealth {
                        chain: name.clone(),
                        family: *family,
                        connected: false,
                        last_block: None,
                        last_error: None,
                    })
                    .collect(),
            ),
        }
    }

    /// A swap began (or resumed) being driven.
    pub fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
        metrics::record_swap_started();
    }

    /// A swap reached `status`. `duration_secs` is creation-to-finish time.
    pub fn record_terminal(&self, status: SwapStatus, duration_secs: u64, failure: Option<&FailureReason>) {
        match status {
            SwapStatus::Completed => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                let mut latencies = self.latencies.lock();
                if latencies.len() == LATENCY_WINDOW {
                    latencies.pop_front();
                }
                latencies.push_back(duration_secs);
                metrics::record_swap_finished(status.as_str(), Some(duration_secs));
            }
            SwapStatus::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
                metrics::record_swap_finished(status.as_str(), None);
            }
            SwapStatus::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                if let Some(reason) = failure {
                    metrics::record_failure(reason.label());
                }
                metrics::record_swap_finished(status.as_str(), None);
            }
            _ => {}
        }
    }

    /// A transient error was absorbed on `chain`.
    pub fn record_retry(&self, chain: &str) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        metrics::record_retry(chain);
    }

    /// A contract on `chain` rejected a call.
    pub fn record_rejection(&self, chain: &str, kind: &ContractRejectionKind) {
        metrics::record_rejection(chain, kind.label());
    }

    /// Result of the latest RPC probe of `chain`.
    pub fn update_chain(&self, chain: &str, probe: Result<u64, String>) {
        let mut chains = self.chains.write();
        let Some(health) = chains.iter_mut().find(|c| c.chain == chain) else {
            return;
        };
        match probe {
            Ok(height) => {
                health.connected = true;
                health.last_block = Some(height);
                health.last_error = None;
                metrics::set_chain_health(chain, true, Some(height));
            }
            Err(error) => {
                health.connected = false;
                health.last_error = Some(error);
                metrics::set_chain_health(chain, false, None);
            }
        }
    }

    /// Health summary with `active` swaps in flight.
    pub fn snapshot(&self, active: usize) -> HealthSnapshot {
        let completed = self.completed.load(Ordering::Relaxed);
        let cancelled = self.cancelled.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let terminal = completed + cancelled + failed;
        let success_rate = if terminal == 0 {
            1.0
        } else {
            completed as f64 / terminal as f64
        };
        let avg_completion_secs = {
            let latencies = self.latencies.lock();
            if latencies.is_empty() {
                None
            } else {
                Some(latencies.iter().sum::<u64>() as f64 / latencies.len() as f64)
            }
        };
        HealthSnapshot {
            active_swaps: active as u64,
            started: self.started.load(Ordering::Relaxed),
            completed,
            cancelled,
            failed,
            success_rate,
            avg_completion_secs,
            retries: self.retries.load(Ordering::Relaxed),
            chains: self.chains.read().clone(),
        }
    }
}
