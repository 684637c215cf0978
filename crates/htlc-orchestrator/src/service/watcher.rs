//! Background chain watcher.
//!
//! Each tick probes both chains for the health snapshot and scans escrows of
//! funded-but-unrevealed swaps for a published preimage. A hit is handed to
//! the swap's driver through its handle; the driver decides what it means.

use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::orchestrator::Inner;
use super::registry::SwapHandle;
use crate::domain::{Leg, SwapStatus};

pub(crate) async fn run_watcher(inner: Arc<Inner>) {
    let mut shutdown = inner.shutdown.subscribe();
    let mut ticker = tokio::time::interval(inner.config.watcher_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        probe_chains(&inner).await;
        for handle in inner.registry.active() {
            scan_reveals(&inner, &handle).await;
        }
    }
    debug!("chain watcher stopped");
}

async fn probe_chains(inner: &Inner) {
    for adapter in inner.adapters() {
        let probe = adapter.block_number().await.map_err(|e| e.to_string());
        if let Err(error) = &probe {
            warn!(chain = %adapter.chain_name(), %error, "chain probe failed");
        }
        inner.metrics.update_chain(adapter.chain_name(), probe);
    }
}

/// Statuses in which a published secret is news to the driver.
fn watched(status: SwapStatus) -> bool {
    matches!(
        status,
        SwapStatus::EscrowsCreated | SwapStatus::SourceFunded | SwapStatus::BothFunded
    )
}

async fn scan_reveals(inner: &Inner, handle: &SwapHandle) {
    if !watched(handle.status()) || handle.observed_secret().is_some() {
        return;
    }
    if find_published_secret(inner, handle).await {
        handle.wake();
    }
}

/// Look for a matching preimage on the swap's escrows and record it on the
/// handle. Returns true when a new secret was recorded.
pub(crate) async fn find_published_secret(inner: &Inner, handle: &SwapHandle) -> bool {
    for leg in [Leg::Destination, Leg::Source] {
        let Some(escrow) = handle.read(|s| s.escrow(leg).cloned()) else {
            continue;
        };
        let adapter = inner.adapter(escrow.chain);
        let secret = match adapter.find_revealed_secret(&escrow).await {
            Ok(Some(secret)) => secret,
            Ok(None) => continue,
            Err(err) => {
                debug!(swap_id = %handle.id(), %leg, error = %err, "reveal scan failed");
                continue;
            }
        };
        let hashlock = handle.read(|s| *s.hashlocks.for_leg(leg));
        if !hashlock.matches(secret.as_bytes()) {
            warn!(swap_id = %handle.id(), %leg, "published preimage does not match hashlock");
            continue;
        }
        let recorded = handle.observe_secret(leg, secret);
        if recorded {
            info!(swap_id = %handle.id(), %leg, status = %handle.status(), "secret observed on chain");
        }
        return recorded;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watched_statuses() {
        assert!(!watched(SwapStatus::Created));
        assert!(watched(SwapStatus::SourceFunded));
        assert!(watched(SwapStatus::BothFunded));
        assert!(!watched(SwapStatus::DestinationWithdrawn));
        assert!(!watched(SwapStatus::Cancelled));
    }
}
