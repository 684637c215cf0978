//! Shared harness: two simulated chains on one paused tokio clock, dev keys
//! for makers and resolvers, and an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use htlc_orchestrator::adapters::local_signer::derive_dev_key;
use htlc_orchestrator::domain::{LegTerms, SwapSnapshot, SwapStatus};
use htlc_orchestrator::{
    Address, ChainAdapter, ChainFamily, Clock, EvmAdapter, InMemorySwapStore, LocalSigner,
    Orchestrator, OrchestratorConfig, SimulatedChain, SimulatedChainConfig, SwapId,
    SwapOrchestratorApi, SwapRequest, TokenRef, TokioClock, TvmAdapter,
};

pub const T0: u64 = 1_700_000_000;
pub const FUNDS: u128 = 1_000_000_000;
pub const SRC_AMOUNT: u128 = 1_000;
pub const DST_AMOUNT: u128 = 500;
pub const DEPOSIT: u128 = 1_000;

/// Generous bound for a whole swap in paused time.
pub const SWAP_TIMEOUT: Duration = Duration::from_secs(4 * 3_600);

pub struct Harness {
    pub config: OrchestratorConfig,
    pub clock: Arc<TokioClock>,
    pub evm_chain: Arc<SimulatedChain>,
    pub tvm_chain: Arc<SimulatedChain>,
    pub evm: Arc<dyn ChainAdapter>,
    pub tvm: Arc<dyn ChainAdapter>,
    pub signer: Arc<LocalSigner>,
    pub store: Arc<InMemorySwapStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(OrchestratorConfig::for_testing())
    }

    pub fn with_config(config: OrchestratorConfig) -> Self {
        Self::with_chains(config, |_| {})
    }

    /// Like `with_config`, with the simulated chain parameters passed
    /// through `tweak` first.
    pub fn with_chains(config: OrchestratorConfig, tweak: impl Fn(&mut SimulatedChainConfig)) -> Self {
        let clock = Arc::new(TokioClock::starting_at(T0));
        let mut evm_sim = SimulatedChainConfig::from_chain_config(&config.evm);
        tweak(&mut evm_sim);
        let mut tvm_sim = SimulatedChainConfig::from_chain_config(&config.non_evm);
        tweak(&mut tvm_sim);
        let evm_chain = Arc::new(SimulatedChain::new(evm_sim, clock.clone()));
        let tvm_chain = Arc::new(SimulatedChain::new(tvm_sim, clock.clone()));
        let signer = Arc::new(LocalSigner::new());

        let harness_clock: Arc<dyn Clock> = clock.clone();
        let evm: Arc<dyn ChainAdapter> = Arc::new(EvmAdapter::new(
            config.evm.clone(),
            evm_chain.clone(),
            signer.clone(),
            harness_clock.clone(),
        ));
        let tvm: Arc<dyn ChainAdapter> = Arc::new(TvmAdapter::new(
            config.non_evm.clone(),
            tvm_chain.clone(),
            signer.clone(),
            harness_clock,
        ));

        let harness = Self {
            config,
            clock,
            evm_chain,
            tvm_chain,
            evm,
            tvm,
            signer,
            store: Arc::new(InMemorySwapStore::new()),
        };
        for family in [ChainFamily::Evm, ChainFamily::NonEvm] {
            harness.fund_account(family, &maker(family));
            harness.fund_account(family, &harness.resolver(family));
        }
        harness
    }

    /// Register `address` with a dev key and native funds on `family`.
    pub fn fund_account(&self, family: ChainFamily, address: &Address) {
        let chain = self.chain(family);
        let key = derive_dev_key(chain.name(), address);
        chain.add_account(address.clone(), key, FUNDS);
        self.signer.insert_key(chain.name(), address.clone(), key);
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.config.clone(),
            self.evm.clone(),
            self.tvm.clone(),
            self.clock.clone(),
            self.store.clone(),
        )
        .unwrap()
    }

    /// Orchestrator with the watcher running and stored swaps resumed.
    pub fn started(&self) -> Orchestrator {
        let orchestrator = self.orchestrator();
        orchestrator.start(None);
        orchestrator.resume().unwrap();
        orchestrator
    }

    pub fn chain(&self, family: ChainFamily) -> &Arc<SimulatedChain> {
        match family {
            ChainFamily::Evm => &self.evm_chain,
            ChainFamily::NonEvm => &self.tvm_chain,
        }
    }

    pub fn adapter(&self, family: ChainFamily) -> &Arc<dyn ChainAdapter> {
        match family {
            ChainFamily::Evm => &self.evm,
            ChainFamily::NonEvm => &self.tvm,
        }
    }

    pub fn resolver(&self, family: ChainFamily) -> Address {
        Address::new(self.config.chain(family).resolver_address.clone())
    }

    /// Native-token swap from `source` to the other family.
    pub fn request(&self, source: ChainFamily, nonce: u64) -> SwapRequest {
        let destination = other(source);
        SwapRequest {
            source_chain: source,
            destination_chain: destination,
            source: LegTerms {
                maker: maker(source),
                taker: self.resolver(source),
                token: TokenRef::Native,
                amount: SRC_AMOUNT,
                safety_deposit: DEPOSIT,
            },
            destination: LegTerms {
                maker: maker(destination),
                taker: self.resolver(destination),
                token: TokenRef::Native,
                amount: DST_AMOUNT,
                safety_deposit: DEPOSIT,
            },
            timelocks: None,
            nonce,
        }
    }
}

pub fn other(family: ChainFamily) -> ChainFamily {
    match family {
        ChainFamily::Evm => ChainFamily::NonEvm,
        ChainFamily::NonEvm => ChainFamily::Evm,
    }
}

pub fn maker(family: ChainFamily) -> Address {
    match family {
        ChainFamily::Evm => Address::new(format!("0x{}", "a1".repeat(20))),
        ChainFamily::NonEvm => Address::new(format!("0:{}", "a2".repeat(32))),
    }
}

fn progress(status: SwapStatus) -> u8 {
    match status {
        SwapStatus::Created => 0,
        SwapStatus::EscrowsCreated => 1,
        SwapStatus::SourceFunded => 2,
        SwapStatus::BothFunded => 3,
        SwapStatus::DestinationWithdrawn => 4,
        SwapStatus::Completed | SwapStatus::Cancelled | SwapStatus::Failed => 5,
    }
}

/// Wait until the swap reaches `status` or a later one.
///
/// Simulated calls complete without yielding, so a driver can pass through
/// several statuses before a waiter runs.
pub async fn wait_for_status(orchestrator: &Orchestrator, id: &SwapId, status: SwapStatus) {
    let mut rx = orchestrator.subscribe_status(id).unwrap();
    let target = progress(status);
    let reached = tokio::time::timeout(SWAP_TIMEOUT, async move {
        let _ = rx.wait_for(|s| progress(*s) >= target).await;
    })
    .await;
    assert!(reached.is_ok(), "swap never reached {}", status);
}

pub async fn finish(orchestrator: &Orchestrator, id: &SwapId) -> SwapSnapshot {
    orchestrator
        .wait_for_terminal(id, SWAP_TIMEOUT)
        .await
        .unwrap()
}
