//! TVM chain adapter.
//!
//! Messages are processed asynchronously, so receipts carry no escrow events:
//! the escrow reference always comes from the indexed `escrow_created` event,
//! polled with doubling backoff. Jetton principal moves with a single
//! transfer-notify message sent to the jetton wallet, carrying the safety
//! deposit as attached value.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::codec::EscrowCall;
use super::escrow_rpc::EscrowRpc;
use super::evm::create_args;
use crate::config::ChainConfig;
use crate::domain::{
    Address, ChainFamily, EscrowRef, EscrowState, Hash, HashAlgorithm, Leg, SecureSecret,
    SwapError, TokenRef, TxResult,
};
use crate::ports::{ChainAdapter, ChainClient, Clock, EscrowParams, Funding, SignerProvider};

/// Adapter for the TVM chain.
pub struct TvmAdapter {
    rpc: EscrowRpc,
}

impl TvmAdapter {
    /// Adapter over `client`, signing through `signer`.
    pub fn new(
        config: ChainConfig,
        client: Arc<dyn ChainClient>,
        signer: Arc<dyn SignerProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            rpc: EscrowRpc::new(config, client, signer, clock),
        }
    }
}

#[async_trait]
impl ChainAdapter for TvmAdapter {
    fn family(&self) -> ChainFamily {
        ChainFamily::NonEvm
    }

    fn chain_name(&self) -> &str {
        self.rpc.chain()
    }

    fn hash_algorithm(&self) -> HashAlgorithm {
        self.rpc.config.hash_algorithm
    }

    fn required_confirmations(&self) -> u64 {
        self.rpc.config.required_confirmations
    }

    async fn create_escrow(&self, params: &EscrowParams) -> Result<EscrowRef, SwapError> {
        let call = EscrowCall::CreateEscrow(create_args(params));
        let escrow = self
            .rpc
            .create_escrow(params.leg, &params.salt, &call, false)
            .await?;
        info!(
            chain = %self.rpc.chain(),
            swap_id = %params.swap_id,
            leg = %params.leg,
            escrow = %escrow.address,
            "escrow deployed"
        );
        Ok(escrow)
    }

    async fn find_escrow(&self, leg: Leg, salt: &Hash) -> Result<Option<EscrowRef>, SwapError> {
        self.rpc.find_escrow(leg, salt).await
    }

    async fn fund_escrow(
        &self,
        escrow: &EscrowRef,
        funding: &Funding,
    ) -> Result<TxResult, SwapError> {
        if let Some(done) = self.rpc.already_funded(escrow).await? {
            return Ok(done);
        }
        match &funding.token {
            TokenRef::Native => {
                self.rpc
                    .fund(
                        escrow,
                        &funding.depositor,
                        &escrow.address,
                        &EscrowCall::Fund,
                        funding.amount + funding.safety_deposit,
                    )
                    .await
            }
            TokenRef::Contract(jetton) => {
                let call = EscrowCall::TransferNotify {
                    escrow: escrow.address.clone(),
                    amount: funding.amount,
                };
                self.rpc
                    .fund(
                        escrow,
                        &funding.depositor,
                        jetton,
                        &call,
                        funding.safety_deposit,
                    )
                    .await
            }
        }
    }

    async fn withdraw(
        &self,
        escrow: &EscrowRef,
        secret: &SecureSecret,
        caller: &Address,
    ) -> Result<TxResult, SwapError> {
        self.rpc.withdraw(escrow, secret, caller).await
    }

    async fn cancel(&self, escrow: &EscrowRef, caller: &Address) -> Result<TxResult, SwapError> {
        self.rpc.cancel(escrow, caller).await
    }

    async fn wait_for_finality(
        &self,
        escrow: &EscrowRef,
        required: u64,
        deadline: u64,
    ) -> Result<u64, SwapError> {
        self.rpc.wait_for_finality(escrow, required, deadline).await
    }

    async fn read_escrow_state(&self, escrow: &EscrowRef) -> Result<EscrowState, SwapError> {
        self.rpc.read_state(escrow).await
    }

    async fn find_revealed_secret(
        &self,
        escrow: &EscrowRef,
    ) -> Result<Option<SecureSecret>, SwapError> {
        self.rpc.find_revealed_secret(escrow).await
    }

    async fn chain_time(&self) -> Result<u64, SwapError> {
        self.rpc.chain_time().await
    }

    async fn block_number(&self) -> Result<u64, SwapError> {
        self.rpc.block_number().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local_signer::{derive_dev_key, LocalSigner};
    use crate::adapters::simulated::{SimulatedChain, SimulatedChainConfig};
    use crate::adapters::TokioClock;
    use crate::domain::{Hashlock, LegTimelocks, SwapId};
    use std::time::Duration;

    const T0: u64 = 1_700_000_000;

    fn addr(byte: &str) -> Address {
        Address::new(format!("0:{}", byte.repeat(32)))
    }

    fn setup() -> (Arc<SimulatedChain>, TvmAdapter) {
        let config = ChainConfig::non_evm_default();
        let clock = Arc::new(TokioClock::starting_at(T0));
        let chain = Arc::new(SimulatedChain::new(
            SimulatedChainConfig::from_chain_config(&config),
            clock.clone(),
        ));
        let signer = Arc::new(LocalSigner::new());
        let resolver = Address::new(config.resolver_address.clone());
        for who in [addr("11"), addr("22"), resolver] {
            let key = derive_dev_key("tvm", &who);
            chain.add_account(who.clone(), key, 1_000_000);
            signer.insert_key("tvm", who, key);
        }
        let adapter = TvmAdapter::new(config, chain.clone(), signer, clock);
        (chain, adapter)
    }

    fn params(token: TokenRef) -> EscrowParams {
        EscrowParams {
            swap_id: SwapId::new(),
            leg: Leg::Destination,
            salt: [4; 32],
            maker: addr("11"),
            taker: addr("22"),
            token,
            amount: 2_000,
            safety_deposit: 500,
            hashlock: Hashlock::of(HashAlgorithm::Sha256, &[3; 32]),
            timelocks: LegTimelocks {
                withdrawal: T0 + 30,
                public_withdrawal: T0 + 300,
                cancellation: T0 + 1_800,
                public_cancellation: None,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_waits_for_indexer() {
        let (chain, adapter) = setup();
        let escrow = adapter.create_escrow(&params(TokenRef::Native)).await.unwrap();
        assert!(escrow.address.as_str().starts_with("0:"));
        assert!(escrow.creation_tx.is_some());
        assert!(chain.escrow_state(&escrow.address).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_jetton_transfer_notify_funds_escrow() {
        let (chain, adapter) = setup();
        let jetton = addr("77");
        chain.mint_token(&jetton, &addr("22"), 2_000);
        let escrow = adapter
            .create_escrow(&params(TokenRef::Contract(jetton.clone())))
            .await
            .unwrap();
        let funding = Funding {
            depositor: addr("22"),
            token: TokenRef::Contract(jetton.clone()),
            amount: 2_000,
            safety_deposit: 500,
        };
        adapter.fund_escrow(&escrow, &funding).await.unwrap();
        assert_eq!(chain.executed_count("transfer_notify"), 1);
        assert_eq!(chain.token_balance(&jetton, &addr("22")), 0);
        assert!(chain.escrow_state(&escrow.address).unwrap().funded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_withdraw_pays_maker_on_destination() {
        let (chain, adapter) = setup();
        let escrow = adapter.create_escrow(&params(TokenRef::Native)).await.unwrap();
        let funding = Funding {
            depositor: addr("22"),
            token: TokenRef::Native,
            amount: 2_000,
            safety_deposit: 500,
        };
        adapter.fund_escrow(&escrow, &funding).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        let secret = SecureSecret::new([3; 32]);
        adapter.withdraw(&escrow, &secret, &addr("22")).await.unwrap();
        assert_eq!(chain.native_balance(&addr("11")), 1_002_000);
        // Taker gets the safety deposit back as the caller.
        assert_eq!(chain.native_balance(&addr("22")), 997_500 + 500);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(adapter.find_revealed_secret(&escrow).await.unwrap(), Some(secret));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_refunds_depositor_once() {
        let (chain, adapter) = setup();
        let escrow = adapter.create_escrow(&params(TokenRef::Native)).await.unwrap();
        let funding = Funding {
            depositor: addr("22"),
            token: TokenRef::Native,
            amount: 2_000,
            safety_deposit: 500,
        };
        adapter.fund_escrow(&escrow, &funding).await.unwrap();

        let early = adapter.cancel(&escrow, &addr("22")).await.unwrap_err();
        assert_eq!(
            early.rejection(),
            Some(&crate::domain::ContractRejectionKind::CancellationWindowNotOpen)
        );

        tokio::time::sleep(Duration::from_secs(1_800)).await;
        let first = adapter.cancel(&escrow, &addr("22")).await.unwrap();
        assert!(!first.already_applied);
        let second = adapter.cancel(&escrow, &addr("22")).await.unwrap();
        assert!(second.already_applied);
        assert_eq!(chain.native_balance(&addr("22")), 1_000_000);
    }
}
