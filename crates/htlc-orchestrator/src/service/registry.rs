//! # Swap Registry
//!
//! Active and historical swaps keyed by id. The map lock only guards
//! insert, lookup and archive; each swap carries its own lock, so drivers
//! mutate their swap without contending on the map.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, MutexGuard, Notify};

use crate::domain::{
    Leg, OrderHash, SecureSecret, Swap, SwapId, SwapSnapshot, SwapStatus, ValidationError,
};

/// Shared state of one swap.
pub struct SwapHandle {
    id: SwapId,
    order_hash: OrderHash,
    swap: RwLock<Swap>,
    /// Held by the driver for the whole run; serialises chain actions per swap.
    step: tokio::sync::Mutex<()>,
    status_tx: watch::Sender<SwapStatus>,
    abort: AtomicBool,
    wake: Notify,
    observed: Mutex<Option<(Leg, SecureSecret)>>,
}

impl SwapHandle {
    /// Wrap `swap`.
    pub fn new(swap: Swap) -> Arc<Self> {
        let (status_tx, _) = watch::channel(swap.status());
        Arc::new(Self {
            id: swap.id,
            order_hash: swap.order_hash,
            swap: RwLock::new(swap),
            step: tokio::sync::Mutex::new(()),
            status_tx,
            abort: AtomicBool::new(false),
            wake: Notify::new(),
            observed: Mutex::new(None),
        })
    }

    /// Swap id.
    pub fn id(&self) -> SwapId {
        self.id
    }

    /// Order digest.
    pub fn order_hash(&self) -> OrderHash {
        self.order_hash
    }

    /// Current status.
    pub fn status(&self) -> SwapStatus {
        self.swap.read().status()
    }

    /// Read the swap.
    pub fn read<R>(&self, f: impl FnOnce(&Swap) -> R) -> R {
        f(&self.swap.read())
    }

    /// Mutate the swap and publish the resulting status.
    pub fn update<R>(&self, f: impl FnOnce(&mut Swap) -> R) -> R {
        let (out, status) = {
            let mut swap = self.swap.write();
            let out = f(&mut swap);
            (out, swap.status())
        };
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        out
    }

    /// Copy of the swap for persistence.
    pub fn cloned(&self) -> Swap {
        self.swap.read().clone()
    }

    /// Operator view.
    pub fn snapshot(&self) -> SwapSnapshot {
        self.swap.read().snapshot()
    }

    /// Status updates.
    pub fn subscribe(&self) -> watch::Receiver<SwapStatus> {
        self.status_tx.subscribe()
    }

    /// Exclusive right to drive this swap.
    pub async fn lock_step(&self) -> MutexGuard<'_, ()> {
        self.step.lock().await
    }

    /// Whether a driver currently holds the step lock.
    pub fn is_driven(&self) -> bool {
        self.step.try_lock().is_err()
    }

    /// Ask the driver to stop and refund.
    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Abort requested.
    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Wake the driver from its current pause.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Resolves on the next `wake`.
    pub async fn woken(&self) {
        self.wake.notified().await
    }

    /// Record a secret seen on chain. Returns false if one was already recorded.
    pub fn observe_secret(&self, leg: Leg, secret: SecureSecret) -> bool {
        let mut observed = self.observed.lock();
        if observed.is_some() {
            return false;
        }
        *observed = Some((leg, secret));
        true
    }

    /// Leg and secret of the first reveal seen on chain.
    pub fn observed_secret(&self) -> Option<(Leg, SecureSecret)> {
        self.observed.lock().clone()
    }
}

#[derive(Default)]
struct RegistryState {
    active: HashMap<SwapId, Arc<SwapHandle>>,
    history: HashMap<SwapId, Arc<SwapHandle>>,
    by_order: HashMap<OrderHash, SwapId>,
}

/// Registry of swap handles.
#[derive(Default)]
pub struct SwapRegistry {
    state: RwLock<RegistryState>,
}

impl SwapRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an active swap. One active swap per order.
    pub fn insert(&self, handle: Arc<SwapHandle>) -> Result<(), ValidationError> {
        let mut state = self.state.write();
        if state.by_order.contains_key(&handle.order_hash()) {
            return Err(ValidationError::DuplicateOrder(handle.order_hash().to_string()));
        }
        state.by_order.insert(handle.order_hash(), handle.id());
        state.active.insert(handle.id(), handle);
        Ok(())
    }

    /// Active or archived swap.
    pub fn get(&self, id: &SwapId) -> Option<Arc<SwapHandle>> {
        let state = self.state.read();
        state
            .active
            .get(id)
            .or_else(|| state.history.get(id))
            .cloned()
    }

    /// Whether `id` is known at all.
    pub fn contains(&self, id: &SwapId) -> bool {
        let state = self.state.read();
        state.active.contains_key(id) || state.history.contains_key(id)
    }

    /// Move a swap to history and free its order for reuse.
    pub fn archive(&self, id: &SwapId) -> bool {
        let mut state = self.state.write();
        match state.active.remove(id) {
            Some(handle) => {
                state.by_order.remove(&handle.order_hash());
                state.history.insert(*id, handle);
                true
            }
            None => false,
        }
    }

    /// Active handles.
    pub fn active(&self) -> Vec<Arc<SwapHandle>> {
        self.state.read().active.values().cloned().collect()
    }

    /// Number of active swaps.
    pub fn active_count(&self) -> usize {
        self.state.read().active.len()
    }

    /// Number of archived swaps.
    pub fn history_count(&self) -> usize {
        self.state.read().history.len()
    }
}
