//! Two simulated chains with dev keys for every party the node knows about.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;

use htlc_orchestrator::adapters::local_signer::derive_dev_key;
use htlc_orchestrator::{
    Address, ChainAdapter, ChainFamily, Clock, EvmAdapter, LocalSigner, OrchestratorConfig,
    SimulatedChain, SimulatedChainConfig, SwapRequest, TokenRef, TvmAdapter,
};

/// Simulated EVM and TVM chains sharing one signer.
pub struct Devnet {
    clock: Arc<dyn Clock>,
    evm_chain: Arc<SimulatedChain>,
    tvm_chain: Arc<SimulatedChain>,
    signer: Arc<LocalSigner>,
    funded: HashSet<(ChainFamily, Address)>,
}

impl Devnet {
    /// Chains matching the orchestrator's chain settings.
    pub fn new(config: &OrchestratorConfig, clock: Arc<dyn Clock>) -> Self {
        let evm_chain = Arc::new(SimulatedChain::new(
            SimulatedChainConfig::from_chain_config(&config.evm),
            Arc::clone(&clock),
        ));
        let tvm_chain = Arc::new(SimulatedChain::new(
            SimulatedChainConfig::from_chain_config(&config.non_evm),
            Arc::clone(&clock),
        ));
        Self {
            clock,
            evm_chain,
            tvm_chain,
            signer: Arc::new(LocalSigner::new()),
            funded: HashSet::new(),
        }
    }

    /// Chain for `family`.
    pub fn chain(&self, family: ChainFamily) -> &Arc<SimulatedChain> {
        match family {
            ChainFamily::Evm => &self.evm_chain,
            ChainFamily::NonEvm => &self.tvm_chain,
        }
    }

    /// Register a dev key and credit `balance`. Returns false if the account
    /// already exists.
    pub fn fund(&mut self, family: ChainFamily, address: &Address, balance: u128) -> bool {
        if !self.funded.insert((family, address.clone())) {
            return false;
        }
        let chain = self.chain(family);
        let key = derive_dev_key(chain.name(), address);
        chain.add_account(address.clone(), key, balance);
        self.signer.insert_key(chain.name(), address.clone(), key);
        true
    }

    /// Fund both resolvers and every party of `orders`, minting tokens for
    /// the depositor of each token leg. Returns the number of new accounts.
    pub fn fund_parties(
        &mut self,
        config: &OrchestratorConfig,
        orders: &[SwapRequest],
        balance: u128,
    ) -> usize {
        let mut created = 0;
        for family in [ChainFamily::Evm, ChainFamily::NonEvm] {
            let resolver = Address::new(config.chain(family).resolver_address.clone());
            created += usize::from(self.fund(family, &resolver, balance));
        }
        for order in orders {
            let legs = [
                (order.source_chain, &order.source, &order.source.maker),
                (order.destination_chain, &order.destination, &order.destination.taker),
            ];
            for (family, terms, depositor) in legs {
                created += usize::from(self.fund(family, &terms.maker, balance));
                created += usize::from(self.fund(family, &terms.taker, balance));
                if let TokenRef::Contract(token) = &terms.token {
                    self.chain(family).mint_token(token, depositor, balance);
                }
            }
        }
        info!(accounts = created, orders = orders.len(), "devnet accounts funded");
        created
    }

    /// One adapter per family over the simulated chains.
    pub fn adapters(
        &self,
        config: &OrchestratorConfig,
    ) -> (Arc<dyn ChainAdapter>, Arc<dyn ChainAdapter>) {
        let evm: Arc<dyn ChainAdapter> = Arc::new(EvmAdapter::new(
            config.evm.clone(),
            self.evm_chain.clone(),
            self.signer.clone(),
            Arc::clone(&self.clock),
        ));
        let tvm: Arc<dyn ChainAdapter> = Arc::new(TvmAdapter::new(
            config.non_evm.clone(),
            self.tvm_chain.clone(),
            self.signer.clone(),
            Arc::clone(&self.clock),
        ));
        (evm, tvm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use htlc_orchestrator::{LegTerms, SystemClock};

    fn order(config: &OrchestratorConfig) -> SwapRequest {
        SwapRequest {
            source_chain: ChainFamily::Evm,
            destination_chain: ChainFamily::NonEvm,
            source: LegTerms {
                maker: Address::new(format!("0x{}", "a1".repeat(20))),
                taker: Address::new(config.evm.resolver_address.clone()),
                token: TokenRef::Native,
                amount: 1_000,
                safety_deposit: 1_000,
            },
            destination: LegTerms {
                maker: Address::new(format!("0:{}", "a2".repeat(32))),
                taker: Address::new(config.non_evm.resolver_address.clone()),
                token: TokenRef::Contract(Address::new(format!("0:{}", "b1".repeat(32)))),
                amount: 500,
                safety_deposit: 1_000,
            },
            timelocks: None,
            nonce: 1,
        }
    }

    #[test]
    fn test_parties_funded_once() {
        let config = OrchestratorConfig::default();
        let mut devnet = Devnet::new(&config, Arc::new(SystemClock));
        let orders = vec![order(&config), order(&config)];

        // Two resolvers plus one maker per chain.
        assert_eq!(devnet.fund_parties(&config, &orders, 10_000), 4);
        assert_eq!(devnet.fund_parties(&config, &orders, 10_000), 0);

        let maker = &orders[0].source.maker;
        assert_eq!(devnet.chain(ChainFamily::Evm).native_balance(maker), 10_000);

        // Token legs are minted to the depositor on every pass.
        let TokenRef::Contract(token) = &orders[0].destination.token else {
            unreachable!()
        };
        let resolver = &orders[0].destination.taker;
        assert_eq!(
            devnet.chain(ChainFamily::NonEvm).token_balance(token, resolver),
            40_000
        );
    }

    #[test]
    fn test_adapters_match_families() {
        let config = OrchestratorConfig::default();
        let devnet = Devnet::new(&config, Arc::new(SystemClock));
        let (evm, tvm) = devnet.adapters(&config);
        assert_eq!(evm.family(), ChainFamily::Evm);
        assert_eq!(tvm.family(), ChainFamily::NonEvm);
    }
}
