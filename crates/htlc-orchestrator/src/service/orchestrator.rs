//! # Swap Orchestrator Service
//!
//! Validates requests, owns the registry and spawns one driver task per
//! swap. Concurrency is bounded by a semaphore; swaps beyond the bound are
//! accepted and wait for a permit.
//!
//! ## Lifecycle
//!
//! ```text
//! new() -> resume() -> start(orders) -> ... -> shutdown()
//! ```
//!
//! `shutdown()` stops intake, signals every driver and waits up to
//! `shutdown_drain_secs`. Swaps left mid-flight stay in the store and are
//! picked up by the next `resume()`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::collector::MetricsCollector;
use super::driver::drive;
use super::registry::{SwapHandle, SwapRegistry};
use super::watcher::run_watcher;
use crate::algorithms::{compute_order_hash, SecretManager, TimelockPolicy};
use crate::config::{ConfigError, OrchestratorConfig};
use crate::domain::{
    Address, ChainFamily, Leg, LegAmounts, LegParties, NewSwap, RecoveryBundle, Swap,
    SwapAmounts, SwapDirection, SwapError, SwapId, SwapParties, SwapRequest, SwapSnapshot,
    SwapStatus, TokenRef, TxKind, ValidationError,
};
use crate::ports::{
    ChainAdapter, Clock, HealthSnapshot, OrderSource, SwapOrchestratorApi, SwapStore,
};

/// State shared by the service, drivers and background loops.
pub(crate) struct Inner {
    pub(crate) config: OrchestratorConfig,
    evm: Arc<dyn ChainAdapter>,
    non_evm: Arc<dyn ChainAdapter>,
    pub(crate) clock: Arc<dyn Clock>,
    store: Arc<dyn SwapStore>,
    pub(crate) registry: SwapRegistry,
    pub(crate) metrics: MetricsCollector,
    timelocks: TimelockPolicy,
    permits: Arc<Semaphore>,
    pub(crate) shutdown: watch::Sender<bool>,
    accepting: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Inner {
    pub(crate) fn adapter(&self, family: ChainFamily) -> &Arc<dyn ChainAdapter> {
        match family {
            ChainFamily::Evm => &self.evm,
            ChainFamily::NonEvm => &self.non_evm,
        }
    }

    pub(crate) fn adapters(&self) -> [&Arc<dyn ChainAdapter>; 2] {
        [&self.evm, &self.non_evm]
    }

    /// Save the swap. Store failures are logged; the driver keeps going.
    pub(crate) fn persist(&self, handle: &SwapHandle) {
        if let Err(err) = self.store.save(&handle.cloned()) {
            warn!(swap_id = %handle.id(), error = %err, "failed to persist swap");
        }
    }

    /// Validate `request`, register the swap and spawn its driver.
    pub(crate) fn submit(self: &Arc<Self>, request: SwapRequest) -> Result<SwapId, SwapError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(SwapError::ShuttingDown);
        }
        let swap = Swap::new(self.prepare(&request)?);
        let id = swap.id;
        let handle = SwapHandle::new(swap);
        self.registry.insert(handle.clone())?;
        self.persist(&handle);
        self.metrics.record_started();
        handle.read(|s| {
            info!(
                swap_id = %id,
                order_hash = %s.order_hash,
                direction = %s.direction,
                src_amount = s.amounts.source.amount,
                dst_amount = s.amounts.destination.amount,
                src_cancellation = s.timelocks.source.cancellation,
                dst_cancellation = s.timelocks.destination.cancellation,
                "swap created"
            )
        });
        self.spawn_driver(handle);
        Ok(id)
    }

    /// Everything a new swap needs, or the first validation error.
    fn prepare(&self, request: &SwapRequest) -> Result<NewSwap, SwapError> {
        let direction =
            SwapDirection::from_families(request.source_chain, request.destination_chain)
                .ok_or_else(|| {
                    ValidationError::UnsupportedDirection(format!(
                        "{} -> {}",
                        request.source_chain, request.destination_chain
                    ))
                })?;

        for leg in [Leg::Source, Leg::Destination] {
            let family = direction.family(leg);
            let adapter = self.adapter(family);
            let terms = request.leg(leg);
            let [maker_field, taker_field, token_field] = match leg {
                Leg::Source => ["source.maker", "source.taker", "source.token"],
                Leg::Destination => ["destination.maker", "destination.taker", "destination.token"],
            };
            let check = |field: &'static str, address: &Address| {
                if adapter.validate_address(address) {
                    Ok(())
                } else {
                    Err(ValidationError::InvalidAddress {
                        chain: family.to_string(),
                        field,
                        address: address.to_string(),
                    })
                }
            };
            check(maker_field, &terms.maker)?;
            check(taker_field, &terms.taker)?;
            if let TokenRef::Contract(token) = &terms.token {
                check(token_field, token)?;
            }
            if terms.amount == 0 {
                return Err(ValidationError::ZeroAmount { leg: leg.as_str() }.into());
            }
            let min = self.config.chain(family).min_safety_deposit;
            if terms.safety_deposit < min {
                return Err(ValidationError::SafetyDepositTooLow {
                    leg: leg.as_str(),
                    got: terms.safety_deposit,
                    min,
                }
                .into());
            }
        }

        let delays = request
            .timelocks
            .unwrap_or_else(|| self.timelocks.default_delays());
        let now = self.clock.now();
        let timelocks = self.timelocks.compute(now, direction, &delays)?;

        let secrets = SecretManager::new(
            self.adapter(direction.family(Leg::Source)).hash_algorithm(),
            self.adapter(direction.family(Leg::Destination)).hash_algorithm(),
        );
        let (secret, hashlocks) = secrets.generate()?;

        let parties = |leg: Leg| {
            let terms = request.leg(leg);
            LegParties {
                maker: terms.maker.clone(),
                taker: terms.taker.clone(),
            }
        };
        let amounts = |leg: Leg| {
            let terms = request.leg(leg);
            LegAmounts {
                token: terms.token.clone(),
                amount: terms.amount,
                safety_deposit: terms.safety_deposit,
            }
        };
        Ok(NewSwap {
            id: SwapId::new(),
            order_hash: compute_order_hash(request),
            direction,
            parties: SwapParties {
                source: parties(Leg::Source),
                destination: parties(Leg::Destination),
            },
            amounts: SwapAmounts {
                source: amounts(Leg::Source),
                destination: amounts(Leg::Destination),
            },
            secret,
            hashlocks,
            timelocks,
            created_at: now,
        })
    }

    /// Spawn a driver that starts once a concurrency permit is free.
    pub(crate) fn spawn_driver(self: &Arc<Self>, handle: Arc<SwapHandle>) {
        let inner = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut shutdown = inner.shutdown.subscribe();
            let permit = tokio::select! {
                permit = inner.permits.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
                _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => return,
            };
            drive(Arc::clone(&inner), handle).await;
            drop(permit);
        });
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn handle(&self, id: &SwapId) -> Result<Arc<SwapHandle>, SwapError> {
        self.registry
            .get(id)
            .ok_or_else(|| SwapError::SwapNotFound(id.to_string()))
    }
}

/// Pull orders from `orders` until shutdown.
async fn run_intake(inner: Arc<Inner>, orders: Arc<dyn OrderSource>) {
    let mut shutdown = inner.shutdown.subscribe();
    let mut ticker = tokio::time::interval(inner.config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        while let Some(request) = orders.next_order().await {
            let nonce = request.nonce;
            match inner.submit(request) {
                Ok(id) => debug!(swap_id = %id, nonce, "order accepted"),
                Err(err) => warn!(nonce, error = %err, "order rejected"),
            }
        }
    }
    debug!("order intake stopped");
}

/// HTLC swap orchestrator.
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Orchestrator over one adapter per chain family.
    pub fn new(
        config: OrchestratorConfig,
        evm: Arc<dyn ChainAdapter>,
        non_evm: Arc<dyn ChainAdapter>,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SwapStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        for (adapter, expected) in [(&evm, ChainFamily::Evm), (&non_evm, ChainFamily::NonEvm)] {
            if adapter.family() != expected {
                return Err(ConfigError::Invalid(format!(
                    "adapter {} is {} but was passed as {}",
                    adapter.chain_name(),
                    adapter.family(),
                    expected
                )));
            }
        }
        let metrics = MetricsCollector::new(&[
            (evm.chain_name().to_string(), ChainFamily::Evm),
            (non_evm.chain_name().to_string(), ChainFamily::NonEvm),
        ]);
        let timelocks = TimelockPolicy::new(
            config.timelocks.clone(),
            config.evm.safety_margin_secs,
            config.non_evm.safety_margin_secs,
        );
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(config.max_concurrent_swaps)),
                config,
                evm,
                non_evm,
                clock,
                store,
                registry: SwapRegistry::new(),
                metrics,
                timelocks,
                shutdown,
                accepting: AtomicBool::new(true),
                tasks: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Configuration in use.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    /// Spawn the chain watcher and, if given, the order intake loop.
    pub fn start(&self, orders: Option<Arc<dyn OrderSource>>) {
        let mut tasks = vec![tokio::spawn(run_watcher(Arc::clone(&self.inner)))];
        if let Some(orders) = orders {
            tasks.push(tokio::spawn(run_intake(Arc::clone(&self.inner), orders)));
        }
        self.inner.tasks.lock().extend(tasks);
        info!(
            evm = %self.inner.evm.chain_name(),
            non_evm = %self.inner.non_evm.chain_name(),
            max_concurrent = self.inner.config.max_concurrent_swaps,
            "orchestrator started"
        );
    }

    /// Re-drive every non-terminal swap in the store. Returns how many.
    ///
    /// Swaps with a recorded abort request resume on the cancellation path.
    pub fn resume(&self) -> Result<usize, SwapError> {
        let mut resumed = 0;
        for swap in self.inner.store.load_active()? {
            if self.inner.registry.contains(&swap.id) {
                continue;
            }
            let aborted = swap.transaction_log().contains(TxKind::AbortRequested);
            let handle = SwapHandle::new(swap);
            if let Err(err) = self.inner.registry.insert(handle.clone()) {
                warn!(swap_id = %handle.id(), error = %err, "skipping stored swap");
                continue;
            }
            if aborted {
                handle.request_abort();
            }
            info!(swap_id = %handle.id(), status = %handle.status(), aborted, "resuming swap");
            self.inner.metrics.record_started();
            self.inner.spawn_driver(handle);
            resumed += 1;
        }
        Ok(resumed)
    }

    /// Stop intake, signal drivers and wait for them to park.
    pub async fn shutdown(&self) {
        self.inner.accepting.store(false, Ordering::SeqCst);
        self.inner.shutdown.send_replace(true);
        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        let deadline = Instant::now() + Duration::from_secs(self.inner.config.shutdown_drain_secs);
        let mut aborted = 0;
        for mut task in tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                task.abort();
                aborted += 1;
            }
        }
        for handle in self.inner.registry.active() {
            self.inner.persist(&handle);
        }
        info!(
            active = self.inner.registry.active_count(),
            aborted, "orchestrator stopped"
        );
    }

    /// Status updates for a swap.
    pub fn subscribe_status(&self, id: &SwapId) -> Result<watch::Receiver<SwapStatus>, SwapError> {
        Ok(self.inner.handle(id)?.subscribe())
    }
}

#[async_trait]
impl SwapOrchestratorApi for Orchestrator {
    async fn create_swap(&self, request: SwapRequest) -> Result<SwapId, SwapError> {
        self.inner.submit(request)
    }

    fn get_swap_status(&self, id: &SwapId) -> Result<SwapSnapshot, SwapError> {
        Ok(self.inner.handle(id)?.snapshot())
    }

    fn list_active_swaps(&self) -> Vec<SwapSnapshot> {
        self.inner
            .registry
            .active()
            .iter()
            .map(|h| h.snapshot())
            .collect()
    }

    async fn cancel_swap(&self, id: &SwapId) -> Result<(), SwapError> {
        let handle = self.inner.handle(id)?;
        if handle.is_aborted() {
            return Ok(());
        }
        let now = self.inner.clock.now();
        handle.update(|s| {
            let status = s.status();
            if !status.is_cancellable() {
                return Err(SwapError::CannotCancel { status });
            }
            s.record(
                TxKind::AbortRequested,
                Leg::Source,
                None,
                now,
                Some("operator request".into()),
            );
            Ok(())
        })?;
        self.inner.persist(&handle);
        handle.request_abort();
        info!(swap_id = %id, status = %handle.status(), "abort requested");
        Ok(())
    }

    fn recovery_bundle(&self, id: &SwapId) -> Result<RecoveryBundle, SwapError> {
        let bundle = self.inner.handle(id)?.read(|s| s.recovery_bundle());
        warn!(swap_id = %id, status = %bundle.status, "recovery bundle exported");
        Ok(bundle)
    }

    fn health(&self) -> HealthSnapshot {
        self.inner
            .metrics
            .snapshot(self.inner.registry.active_count())
    }

    async fn wait_for_terminal(
        &self,
        id: &SwapId,
        timeout: Duration,
    ) -> Result<SwapSnapshot, SwapError> {
        let handle = self.inner.handle(id)?;
        let mut rx = handle.subscribe();
        let reached = tokio::time::timeout(timeout, async move {
            rx.wait_for(|status| status.is_terminal()).await.is_ok()
        })
        .await;
        match reached {
            Ok(_) => Ok(handle.snapshot()),
            Err(_) => Err(SwapError::SuspensionTimeout {
                what: format!("swap {} to finish", id),
            }),
        }
    }
}
