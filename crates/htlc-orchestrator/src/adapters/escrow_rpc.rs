//! Escrow plumbing common to both chain families: views, submission,
//! reference extraction, finality polling, idempotent withdraw and cancel.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::codec::{codec_for, CodecError, EscrowCall, EscrowCodec, EscrowEvent, EscrowView, EventKind};
use super::submit::TxSubmitter;
use crate::config::ChainConfig;
use crate::domain::{
    Address, ContractRejectionKind, EscrowRef, EscrowState, Hash, Leg, SecureSecret, SwapError,
    TxHash, TxResult,
};
use crate::ports::{ChainClient, ChainEvent, Clock, Receipt, SignerProvider};

/// Consecutive read failures tolerated while polling for finality.
const MAX_FINALITY_READ_ERRORS: u32 = 3;

pub(crate) struct EscrowRpc {
    pub(crate) config: ChainConfig,
    pub(crate) client: Arc<dyn ChainClient>,
    pub(crate) codec: Arc<dyn EscrowCodec>,
    pub(crate) factory: Address,
    pub(crate) resolver: Address,
    submitter: TxSubmitter,
    clock: Arc<dyn Clock>,
}

impl EscrowRpc {
    pub(crate) fn new(
        config: ChainConfig,
        client: Arc<dyn ChainClient>,
        signer: Arc<dyn SignerProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec: codec_for(config.family),
            factory: Address::new(config.factory_address.clone()),
            resolver: Address::new(config.resolver_address.clone()),
            submitter: TxSubmitter::new(config.name.clone(), client.clone(), signer),
            client,
            clock,
            config,
        }
    }

    pub(crate) fn chain(&self) -> &str {
        &self.config.name
    }

    fn codec_error(&self, e: CodecError) -> SwapError {
        SwapError::Codec {
            chain: self.config.name.clone(),
            message: e.0,
        }
    }

    fn rejection(&self, kind: ContractRejectionKind) -> SwapError {
        SwapError::ContractRejection {
            chain: self.config.name.clone(),
            kind,
        }
    }

    pub(crate) async fn view(&self, contract: &Address, view: &EscrowView) -> Result<Vec<u8>, SwapError> {
        let (method, args) = self.codec.encode_view(view);
        self.client
            .call(contract, &method, &args)
            .await
            .map_err(|e| e.into_swap_error(&self.config.name))
    }

    pub(crate) async fn send(
        &self,
        from: &Address,
        to: &Address,
        call: &EscrowCall,
        value: u128,
    ) -> Result<Receipt, SwapError> {
        let (method, payload) = self.codec.encode_call(call);
        self.submitter.submit(from, to, method, payload, value).await
    }

    pub(crate) async fn block_number(&self) -> Result<u64, SwapError> {
        self.client
            .get_block_number()
            .await
            .map_err(|e| e.into_swap_error(&self.config.name))
    }

    pub(crate) async fn chain_time(&self) -> Result<u64, SwapError> {
        self.client
            .get_block_timestamp()
            .await
            .map_err(|e| e.into_swap_error(&self.config.name))
    }

    pub(crate) async fn read_state(&self, escrow: &EscrowRef) -> Result<EscrowState, SwapError> {
        let bytes = self.view(&escrow.address, &EscrowView::State).await?;
        self.codec
            .decode_state(&bytes)
            .map_err(|e| self.codec_error(e))?
            .ok_or_else(|| {
                SwapError::IrrecoverableState(format!(
                    "{} escrow {} not found on {}",
                    escrow.leg, escrow.address, self.config.name
                ))
            })
    }

    pub(crate) async fn find_escrow(&self, leg: Leg, salt: &Hash) -> Result<Option<EscrowRef>, SwapError> {
        let bytes = self
            .view(&self.factory, &EscrowView::EscrowOf { salt: *salt })
            .await?;
        let location = self
            .codec
            .decode_location(&bytes)
            .map_err(|e| self.codec_error(e))?;
        Ok(location.map(|l| EscrowRef {
            chain: self.config.family,
            leg,
            address: l.address,
            salt: *salt,
            created_block: l.created_block,
            creation_tx: None,
        }))
    }

    fn reference_from_events(
        &self,
        events: &[ChainEvent],
        leg: Leg,
        salt: &Hash,
    ) -> Option<EscrowRef> {
        let name = self.codec.event_name(EventKind::Created);
        events
            .iter()
            .filter(|e| e.name == name && e.contract == self.factory)
            .find_map(|e| match self.codec.decode_event(&e.name, &e.data) {
                Ok(EscrowEvent::Created { escrow, salt: s }) if s == *salt => Some(EscrowRef {
                    chain: self.config.family,
                    leg,
                    address: escrow,
                    salt: *salt,
                    created_block: e.block_number,
                    creation_tx: Some(e.tx_hash.clone()),
                }),
                _ => None,
            })
    }

    /// Create an escrow, reusing one already created with the same salt.
    ///
    /// With `receipt_logs` the reference is taken from the receipt first;
    /// otherwise (or when the receipt has no log) the event index is polled
    /// with doubling backoff.
    pub(crate) async fn create_escrow(
        &self,
        leg: Leg,
        salt: &Hash,
        call: &EscrowCall,
        receipt_logs: bool,
    ) -> Result<EscrowRef, SwapError> {
        if let Some(existing) = self.find_escrow(leg, salt).await? {
            info!(chain = %self.config.name, %leg, escrow = %existing.address, "escrow already exists, reusing");
            return Ok(existing);
        }
        let receipt = match self.send(&self.resolver, &self.factory, call, 0).await {
            Ok(r) => r,
            Err(e) if e.rejection() == Some(&ContractRejectionKind::AlreadyExists) => {
                return self.find_escrow(leg, salt).await?.ok_or_else(|| {
                    SwapError::IrrecoverableState(format!(
                        "factory on {} reports an existing escrow it cannot locate",
                        self.config.name
                    ))
                });
            }
            Err(e) => return Err(e),
        };
        if receipt_logs {
            if let Some(found) = self.reference_from_events(&receipt.logs, leg, salt) {
                return Ok(found);
            }
            warn!(chain = %self.config.name, tx = %receipt.tx_hash, "creation receipt has no escrow log");
        }
        self.extract_reference(leg, salt, receipt.block_number, &receipt.tx_hash)
            .await
    }

    async fn extract_reference(
        &self,
        leg: Leg,
        salt: &Hash,
        from_block: u64,
        tx_hash: &TxHash,
    ) -> Result<EscrowRef, SwapError> {
        let attempts = self.config.reference_extraction_attempts.max(1);
        let name = self.codec.event_name(EventKind::Created);
        let mut delay = Duration::from_millis(self.config.reference_extraction_backoff_ms);
        for attempt in 1..=attempts {
            match self.client.poll_events(&self.factory, name, from_block).await {
                Ok(events) => {
                    if let Some(found) = self.reference_from_events(&events, leg, salt) {
                        debug!(chain = %self.config.name, attempt, escrow = %found.address, "escrow reference extracted");
                        return Ok(found);
                    }
                }
                Err(e) => {
                    debug!(chain = %self.config.name, attempt, error = %e, "event poll failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
        }
        warn!(chain = %self.config.name, tx = %tx_hash, attempts, "escrow creation event never indexed");
        Err(SwapError::ReferenceExtractionFailed {
            chain: self.config.name.clone(),
            attempts,
        })
    }

    fn submitted(receipt: Receipt) -> TxResult {
        TxResult {
            tx_hash: Some(receipt.tx_hash),
            block: receipt.block_number,
            already_applied: false,
        }
    }

    /// Submit a funding call unless the escrow already holds its funds.
    pub(crate) async fn fund(
        &self,
        escrow: &EscrowRef,
        depositor: &Address,
        to: &Address,
        call: &EscrowCall,
        value: u128,
    ) -> Result<TxResult, SwapError> {
        match self.send(depositor, to, call, value).await {
            Ok(receipt) => Ok(Self::submitted(receipt)),
            Err(e) if e.rejection() == Some(&ContractRejectionKind::AlreadyFunded) => {
                let state = self.read_state(escrow).await?;
                if state.funded {
                    Ok(TxResult::no_op(state.funded_block.unwrap_or(escrow.created_block)))
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// State of an escrow about to be funded: `Some` when funding already landed.
    pub(crate) async fn already_funded(&self, escrow: &EscrowRef) -> Result<Option<TxResult>, SwapError> {
        let state = self.read_state(escrow).await?;
        if state.completed {
            return Err(self.rejection(ContractRejectionKind::AlreadyCompleted));
        }
        if state.cancelled {
            return Err(self.rejection(ContractRejectionKind::AlreadyCancelled));
        }
        Ok(state
            .funded
            .then(|| TxResult::no_op(state.funded_block.unwrap_or(escrow.created_block))))
    }

    pub(crate) async fn withdraw(
        &self,
        escrow: &EscrowRef,
        secret: &SecureSecret,
        caller: &Address,
    ) -> Result<TxResult, SwapError> {
        let state = self.read_state(escrow).await?;
        if state.completed {
            return Ok(TxResult::no_op(self.block_number().await?));
        }
        if state.cancelled {
            return Err(self.rejection(ContractRejectionKind::AlreadyCancelled));
        }
        let call = EscrowCall::Withdraw {
            secret: *secret.as_bytes(),
        };
        match self.send(caller, &escrow.address, &call, 0).await {
            Ok(receipt) => Ok(Self::submitted(receipt)),
            Err(e) if e.rejection() == Some(&ContractRejectionKind::AlreadyCompleted) => {
                if self.read_state(escrow).await?.completed {
                    Ok(TxResult::no_op(self.block_number().await?))
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) async fn cancel(&self, escrow: &EscrowRef, caller: &Address) -> Result<TxResult, SwapError> {
        let state = self.read_state(escrow).await?;
        if state.cancelled {
            return Ok(TxResult::no_op(self.block_number().await?));
        }
        if state.completed {
            return Err(self.rejection(ContractRejectionKind::AlreadyCompleted));
        }
        match self.send(caller, &escrow.address, &EscrowCall::Cancel, 0).await {
            Ok(receipt) => Ok(Self::submitted(receipt)),
            Err(e) if e.rejection() == Some(&ContractRejectionKind::AlreadyCancelled) => {
                Ok(TxResult::no_op(self.block_number().await?))
            }
            Err(e) => Err(e),
        }
    }

    fn indeterminate(&self, reason: impl Into<String>) -> SwapError {
        SwapError::FinalityIndeterminate {
            chain: self.config.name.clone(),
            reason: reason.into(),
        }
    }

    pub(crate) async fn wait_for_finality(
        &self,
        escrow: &EscrowRef,
        required: u64,
        deadline: u64,
    ) -> Result<u64, SwapError> {
        let interval = Duration::from_secs(self.config.block_time_secs.max(1));
        let mut read_errors = 0u32;
        let mut confirmations = 0u64;
        loop {
            let observed = async {
                let state = self.read_state(escrow).await?;
                let height = self.block_number().await?;
                Ok::<_, SwapError>((state, height))
            }
            .await;

            match observed {
                Ok((state, height)) => {
                    read_errors = 0;
                    let funded_block = match (state.funded, state.funded_block) {
                        (true, Some(b)) => b,
                        _ => return Err(self.indeterminate("escrow reports no funding block")),
                    };
                    confirmations = height.saturating_sub(funded_block);
                    if confirmations >= required {
                        debug!(chain = %self.config.name, escrow = %escrow.address, confirmations, "finality reached");
                        return Ok(confirmations);
                    }
                }
                Err(e) if e.is_transient() => {
                    read_errors += 1;
                    if read_errors >= MAX_FINALITY_READ_ERRORS {
                        return Err(self.indeterminate(e.to_string()));
                    }
                }
                Err(e) => return Err(self.indeterminate(e.to_string())),
            }

            if self.clock.now() >= deadline {
                return Err(SwapError::FinalityTimeout {
                    chain: self.config.name.clone(),
                    confirmations,
                    required,
                });
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub(crate) async fn find_revealed_secret(
        &self,
        escrow: &EscrowRef,
    ) -> Result<Option<SecureSecret>, SwapError> {
        let name = self.codec.event_name(EventKind::Withdrawn);
        let events = self
            .client
            .poll_events(&escrow.address, name, escrow.created_block)
            .await
            .map_err(|e| e.into_swap_error(&self.config.name))?;
        for event in events {
            match self.codec.decode_event(&event.name, &event.data) {
                Ok(EscrowEvent::Withdrawn { secret, .. }) => {
                    return Ok(Some(SecureSecret::new(secret)));
                }
                Ok(_) => {}
                Err(e) => return Err(self.codec_error(e)),
            }
        }
        Ok(None)
    }
}
