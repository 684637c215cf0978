//! EVM chain adapter.
//!
//! Escrows come from a CREATE2-style factory; ERC-20 principal is pulled by
//! the escrow after an `approve`, the safety deposit always travels as native
//! value. The escrow reference is read from the creation receipt's logs and
//! falls back to the event index when the node returns the receipt early.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::codec::{CreateEscrowArgs, EscrowCall, EscrowView};
use super::escrow_rpc::EscrowRpc;
use crate::config::ChainConfig;
use crate::domain::{
    Address, ChainFamily, EscrowRef, EscrowState, Hash, HashAlgorithm, Leg, SecureSecret,
    SwapError, TokenRef, TxResult,
};
use crate::ports::{ChainAdapter, ChainClient, Clock, EscrowParams, Funding, SignerProvider};

/// Factory `createEscrow` arguments for `params`.
pub(crate) fn create_args(params: &EscrowParams) -> CreateEscrowArgs {
    CreateEscrowArgs {
        salt: params.salt,
        maker: params.maker.clone(),
        taker: params.taker.clone(),
        token: params.token.clone(),
        amount: params.amount,
        safety_deposit: params.safety_deposit,
        hashlock: params.hashlock.digest,
        timelocks: params.timelocks,
        is_source: params.leg == Leg::Source,
    }
}

/// Adapter for the EVM chain.
pub struct EvmAdapter {
    rpc: EscrowRpc,
}

impl EvmAdapter {
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

    async fn ensure_allowance(
        &self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        amount: u128,
    ) -> Result<(), SwapError> {
        let bytes = self
            .rpc
            .view(
                token,
                &EscrowView::Allowance {
                    owner: owner.clone(),
                    spender: spender.clone(),
                },
            )
            .await?;
        let current = self
            .rpc
            .codec
            .decode_amount(&bytes)
            .map_err(|e| SwapError::Codec {
                chain: self.rpc.chain().to_string(),
                message: e.0,
            })?;
        if current >= amount {
            return Ok(());
        }
        let approve = EscrowCall::Approve {
            spender: spender.clone(),
            amount,
        };
        self.rpc.send(owner, token, &approve, 0).await?;
        Ok(())
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
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
            .create_escrow(params.leg, &params.salt, &call, true)
            .await?;
        info!(
            chain = %self.rpc.chain(),
            swap_id = %params.swap_id,
            leg = %params.leg,
            escrow = %escrow.address,
            "escrow created"
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
        let value = match &funding.token {
            TokenRef::Native => funding.amount + funding.safety_deposit,
            TokenRef::Contract(token) => {
                self.ensure_allowance(token, &funding.depositor, &escrow.address, funding.amount)
                    .await?;
                funding.safety_deposit
            }
        };
        self.rpc
            .fund(
                escrow,
                &funding.depositor,
                &escrow.address,
                &EscrowCall::Fund,
                value,
            )
            .await
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
