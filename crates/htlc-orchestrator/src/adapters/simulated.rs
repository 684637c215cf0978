//! # Simulated Chain
//!
//! In-memory chain hosting an escrow factory, escrows, native balances and
//! fungible tokens. Blocks advance with the injected `Clock`, so tokio's
//! paused time drives confirmations and timelocks in tests.
//!
//! Escrow rules are the same checks the contracts enforce
//! (`check_withdrawal`, `check_cancellation`), and every call goes through
//! the family's `EscrowCodec`, so adapters are exercised end to end.
//!
//! Fault hooks: halting block production, transient RPC failures, one-shot
//! reverts, event-indexing lag and receipts without logs.

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

use super::codec::{codec_for, EscrowCall, EscrowCodec, EscrowEvent, EscrowLocation, EscrowView};
use super::local_signer::hmac_verify;
use crate::config::ChainConfig;
use crate::domain::{
    check_cancellation, check_withdrawal, Address, ChainFamily, EscrowState, Hash, HashAlgorithm,
    Hashlock, TokenRef, TxHash,
};
use crate::ports::{
    ChainClient, ChainClientError, ChainEvent, Clock, Receipt, ReceiptStatus, SignedTransaction,
    TxRequest,
};

/// Simulated chain parameters.
#[derive(Clone, Debug)]
pub struct SimulatedChainConfig {
    /// Chain name.
    pub name: String,
    /// Address and codec family.
    pub family: ChainFamily,
    /// Hash applied by escrows.
    pub hash_algorithm: HashAlgorithm,
    /// Seconds per block.
    pub block_time_secs: u64,
    /// Escrow factory address.
    pub factory: Address,
    /// Blocks before an event becomes visible to `poll_events`.
    pub event_lag_blocks: u64,
    /// Whether receipts carry emitted events.
    pub receipt_logs: bool,
}

impl SimulatedChainConfig {
    /// Parameters matching a configured chain.
    pub fn from_chain_config(config: &ChainConfig) -> Self {
        let tvm = config.family == ChainFamily::NonEvm;
        Self {
            name: config.name.clone(),
            family: config.family,
            hash_algorithm: config.hash_algorithm,
            block_time_secs: config.block_time_secs.max(1),
            factory: Address::new(config.factory_address.clone()),
            // TVM messages settle asynchronously; results arrive as indexed events.
            event_lag_blocks: if tvm { 1 } else { 0 },
            receipt_logs: !tvm,
        }
    }

    /// Defaults for `family`.
    pub fn for_family(family: ChainFamily) -> Self {
        match family {
            ChainFamily::Evm => Self::from_chain_config(&ChainConfig::evm_default()),
            ChainFamily::NonEvm => Self::from_chain_config(&ChainConfig::non_evm_default()),
        }
    }
}

struct Account {
    key: [u8; 32],
    nonce: u64,
}

#[derive(Default)]
struct TokenLedger {
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
}

struct SimEscrow {
    maker: Address,
    taker: Address,
    token: TokenRef,
    is_source: bool,
    state: EscrowState,
}

impl SimEscrow {
    fn depositor(&self) -> &Address {
        if self.is_source {
            &self.maker
        } else {
            &self.taker
        }
    }

    fn recipient(&self) -> &Address {
        if self.is_source {
            &self.taker
        } else {
            &self.maker
        }
    }
}

#[derive(Default)]
struct ChainInner {
    accounts: HashMap<Address, Account>,
    native: HashMap<Address, u128>,
    tokens: HashMap<Address, TokenLedger>,
    escrows: HashMap<Address, SimEscrow>,
    by_salt: HashMap<Hash, EscrowLocation>,
    receipts: HashMap<TxHash, Receipt>,
    events: Vec<ChainEvent>,
    executed: Vec<(String, bool)>,
    halted_at: Option<u64>,
    send_failures: VecDeque<ChainClientError>,
    call_failures: VecDeque<ChainClientError>,
    rejections: HashMap<String, VecDeque<String>>,
    tx_counter: u64,
}

type Emitted = Vec<(Address, EscrowEvent)>;

/// In-memory chain implementing `ChainClient`.
pub struct SimulatedChain {
    config: SimulatedChainConfig,
    clock: Arc<dyn Clock>,
    genesis: u64,
    codec: Arc<dyn EscrowCodec>,
    inner: Mutex<ChainInner>,
}

impl SimulatedChain {
    /// Chain whose genesis is the clock's current time.
    pub fn new(config: SimulatedChainConfig, clock: Arc<dyn Clock>) -> Self {
        let genesis = clock.now();
        Self {
            codec: codec_for(config.family),
            config,
            clock,
            genesis,
            inner: Mutex::new(ChainInner::default()),
        }
    }

    /// Chain name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Factory address.
    pub fn factory(&self) -> &Address {
        &self.config.factory
    }

    fn height(&self, inner: &ChainInner) -> u64 {
        let live = self.clock.now().saturating_sub(self.genesis) / self.config.block_time_secs;
        match inner.halted_at {
            Some(h) => live.min(h),
            None => live,
        }
    }

    fn timestamp(&self, height: u64) -> u64 {
        self.genesis + height * self.config.block_time_secs
    }

    // -------------------------------------------------------------------------
    // Accounts and faults
    // -------------------------------------------------------------------------

    /// Register a signing account with a native balance.
    pub fn add_account(&self, address: Address, key: [u8; 32], native_balance: u128) {
        let mut inner = self.inner.lock();
        inner
            .accounts
            .insert(address.clone(), Account { key, nonce: 0 });
        *inner.native.entry(address).or_default() += native_balance;
    }

    /// Credit `amount` of `token` to `holder`.
    pub fn mint_token(&self, token: &Address, holder: &Address, amount: u128) {
        let mut inner = self.inner.lock();
        *inner
            .tokens
            .entry(token.clone())
            .or_default()
            .balances
            .entry(holder.clone())
            .or_default() += amount;
    }

    /// Native balance.
    pub fn native_balance(&self, address: &Address) -> u128 {
        self.inner.lock().native.get(address).copied().unwrap_or(0)
    }

    /// Token balance.
    pub fn token_balance(&self, token: &Address, holder: &Address) -> u128 {
        self.inner
            .lock()
            .tokens
            .get(token)
            .and_then(|l| l.balances.get(holder))
            .copied()
            .unwrap_or(0)
    }

    /// Escrow state by address.
    pub fn escrow_state(&self, escrow: &Address) -> Option<EscrowState> {
        self.inner
            .lock()
            .escrows
            .get(escrow)
            .map(|e| e.state.clone())
    }

    /// Stop producing blocks and accepting transactions.
    pub fn halt(&self) {
        let mut inner = self.inner.lock();
        let h = self.height(&inner);
        inner.halted_at = Some(h);
    }

    /// Resume block production. Heights jump to wall time.
    pub fn resume(&self) {
        self.inner.lock().halted_at = None;
    }

    /// Fail the next `n` submissions with `err` before they reach the mempool.
    pub fn fail_next_sends(&self, n: usize, err: ChainClientError) {
        let mut inner = self.inner.lock();
        inner
            .send_failures
            .extend(std::iter::repeat(err).take(n));
    }

    /// Fail the next `n` read calls with `err`.
    pub fn fail_next_calls(&self, n: usize, err: ChainClientError) {
        let mut inner = self.inner.lock();
        inner
            .call_failures
            .extend(std::iter::repeat(err).take(n));
    }

    /// Revert the next transaction calling `method` with `reason`.
    pub fn reject_next(&self, method: &str, reason: &str) {
        self.inner
            .lock()
            .rejections
            .entry(method.to_string())
            .or_default()
            .push_back(reason.to_string());
    }

    /// Successful transactions calling `method`.
    pub fn executed_count(&self, method: &str) -> usize {
        self.inner
            .lock()
            .executed
            .iter()
            .filter(|(m, ok)| *ok && m == method)
            .count()
    }

    // -------------------------------------------------------------------------
    // Execution
    // -------------------------------------------------------------------------

    fn execute(
        &self,
        inner: &mut ChainInner,
        req: &TxRequest,
        block: u64,
        now: u64,
    ) -> Result<Emitted, String> {
        let to = &req.to;
        let is_factory = *to == self.config.factory;
        if !is_factory && !inner.escrows.contains_key(to) && !inner.tokens.contains_key(to) {
            return Err("unknown_contract".into());
        }
        let call = self
            .codec
            .decode_call(&req.method, &req.payload)
            .map_err(|e| format!("invalid_call: {}", e))?;

        let ChainInner {
            native,
            tokens,
            escrows,
            by_salt,
            ..
        } = inner;

        match call {
            EscrowCall::CreateEscrow(args) => {
                if !is_factory {
                    return Err("unknown_method".into());
                }
                if by_salt.contains_key(&args.salt) {
                    return Err("already_exists".into());
                }
                if args.amount == 0 {
                    return Err("zero_amount".into());
                }
                if !args.timelocks.is_ordered() {
                    return Err("invalid_timelocks".into());
                }
                let address = self.codec.escrow_address(&self.config.factory, &args.salt);
                escrows.insert(
                    address.clone(),
                    SimEscrow {
                        maker: args.maker,
                        taker: args.taker,
                        token: args.token,
                        is_source: args.is_source,
                        state: EscrowState {
                            amount: args.amount,
                            safety_deposit: args.safety_deposit,
                            hashlock: args.hashlock,
                            timelocks: args.timelocks,
                            funded: false,
                            funded_block: None,
                            completed: false,
                            cancelled: false,
                        },
                    },
                );
                by_salt.insert(
                    args.salt,
                    EscrowLocation {
                        address: address.clone(),
                        created_block: block,
                    },
                );
                Ok(vec![(
                    self.config.factory.clone(),
                    EscrowEvent::Created {
                        escrow: address,
                        salt: args.salt,
                    },
                )])
            }

            EscrowCall::Fund => {
                let escrow = escrows.get_mut(to).ok_or("unknown_method")?;
                check_fundable(escrow, &req.from)?;
                let s = &escrow.state;
                let native_due = match escrow.token {
                    TokenRef::Native => s.amount + s.safety_deposit,
                    TokenRef::Contract(_) => s.safety_deposit,
                };
                if req.value != native_due {
                    return Err("invalid_value".into());
                }
                if native.get(&req.from).copied().unwrap_or(0) < native_due {
                    return Err("insufficient_balance".into());
                }
                if let TokenRef::Contract(token) = &escrow.token {
                    let ledger = tokens.get_mut(token).ok_or("insufficient_balance")?;
                    let key = (req.from.clone(), to.clone());
                    let allowance = ledger.allowances.get(&key).copied().unwrap_or(0);
                    let balance = ledger.balances.get(&req.from).copied().unwrap_or(0);
                    if allowance < s.amount || balance < s.amount {
                        return Err("insufficient_balance".into());
                    }
                    ledger.allowances.insert(key, allowance - s.amount);
                    ledger.balances.insert(req.from.clone(), balance - s.amount);
                }
                debit(native, &req.from, native_due);
                escrow.state.funded = true;
                escrow.state.funded_block = Some(block);
                Ok(vec![(to.clone(), EscrowEvent::Funded { escrow: to.clone() })])
            }

            EscrowCall::TransferNotify { escrow: target, amount } => {
                let ledger = tokens.get_mut(to).ok_or("unknown_method")?;
                let escrow = escrows.get_mut(&target).ok_or("unknown_escrow")?;
                if escrow.token != TokenRef::Contract(to.clone()) {
                    return Err("wrong_token".into());
                }
                check_fundable(escrow, &req.from)?;
                let s = &escrow.state;
                if amount != s.amount || req.value != s.safety_deposit {
                    return Err("invalid_value".into());
                }
                let balance = ledger.balances.get(&req.from).copied().unwrap_or(0);
                if balance < amount || native.get(&req.from).copied().unwrap_or(0) < req.value {
                    return Err("insufficient_balance".into());
                }
                ledger.balances.insert(req.from.clone(), balance - amount);
                debit(native, &req.from, req.value);
                escrow.state.funded = true;
                escrow.state.funded_block = Some(block);
                Ok(vec![(target.clone(), EscrowEvent::Funded { escrow: target })])
            }

            EscrowCall::Approve { spender, amount } => {
                let ledger = tokens.get_mut(to).ok_or("unknown_method")?;
                ledger.allowances.insert((req.from.clone(), spender), amount);
                Ok(Vec::new())
            }

            EscrowCall::Withdraw { secret } => {
                let escrow = escrows.get_mut(to).ok_or("unknown_method")?;
                let hashlock = Hashlock {
                    algorithm: self.config.hash_algorithm,
                    digest: escrow.state.hashlock,
                };
                check_withdrawal(&escrow.state, &secret, &hashlock, now, req.from == escrow.taker)
                    .map_err(|k| k.label().to_string())?;
                escrow.state.completed = true;
                let recipient = escrow.recipient().clone();
                pay_principal(native, tokens, &escrow.token, &recipient, escrow.state.amount);
                credit(native, &req.from, escrow.state.safety_deposit);
                Ok(vec![(
                    to.clone(),
                    EscrowEvent::Withdrawn {
                        escrow: to.clone(),
                        secret,
                    },
                )])
            }

            EscrowCall::Cancel => {
                let escrow = escrows.get_mut(to).ok_or("unknown_method")?;
                check_cancellation(&escrow.state, now, req.from == escrow.taker)
                    .map_err(|k| k.label().to_string())?;
                escrow.state.cancelled = true;
                let depositor = escrow.depositor().clone();
                pay_principal(native, tokens, &escrow.token, &depositor, escrow.state.amount);
                credit(native, &req.from, escrow.state.safety_deposit);
                Ok(vec![(to.clone(), EscrowEvent::Cancelled { escrow: to.clone() })])
            }
        }
    }
}

fn check_fundable(escrow: &SimEscrow, from: &Address) -> Result<(), String> {
    let s = &escrow.state;
    if s.completed {
        return Err("already_completed".into());
    }
    if s.cancelled {
        return Err("already_cancelled".into());
    }
    if s.funded {
        return Err("already_funded".into());
    }
    if from != escrow.depositor() {
        return Err("unauthorized".into());
    }
    Ok(())
}

fn debit(native: &mut HashMap<Address, u128>, who: &Address, amount: u128) {
    let balance = native.entry(who.clone()).or_default();
    *balance = balance.saturating_sub(amount);
}

fn credit(native: &mut HashMap<Address, u128>, who: &Address, amount: u128) {
    *native.entry(who.clone()).or_default() += amount;
}

fn pay_principal(
    native: &mut HashMap<Address, u128>,
    tokens: &mut HashMap<Address, TokenLedger>,
    token: &TokenRef,
    to: &Address,
    amount: u128,
) {
    match token {
        TokenRef::Native => credit(native, to, amount),
        TokenRef::Contract(t) => {
            *tokens
                .entry(t.clone())
                .or_default()
                .balances
                .entry(to.clone())
                .or_default() += amount;
        }
    }
}

#[async_trait]
impl ChainClient for SimulatedChain {
    async fn get_block_number(&self) -> Result<u64, ChainClientError> {
        let inner = self.inner.lock();
        Ok(self.height(&inner))
    }

    async fn get_block_timestamp(&self) -> Result<u64, ChainClientError> {
        let inner = self.inner.lock();
        Ok(self.timestamp(self.height(&inner)))
    }

    async fn get_transaction_count(&self, address: &Address) -> Result<u64, ChainClientError> {
        Ok(self
            .inner
            .lock()
            .accounts
            .get(address)
            .map(|a| a.nonce)
            .unwrap_or(0))
    }

    async fn send_transaction(&self, tx: SignedTransaction) -> Result<TxHash, ChainClientError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if let Some(err) = inner.send_failures.pop_front() {
            return Err(err);
        }
        if inner.halted_at.is_some() {
            return Err(ChainClientError::Timeout(format!(
                "{}: no block production",
                self.config.name
            )));
        }

        let req = &tx.request;
        let signing_bytes = req.signing_bytes();
        let account = inner
            .accounts
            .get_mut(&req.from)
            .ok_or_else(|| ChainClientError::Reverted("unauthorized".into()))?;
        if !hmac_verify(&account.key, &signing_bytes, &tx.signature) {
            return Err(ChainClientError::Reverted("invalid_signature".into()));
        }
        if req.nonce != account.nonce {
            return Err(ChainClientError::NonceConflict {
                expected: account.nonce,
                got: req.nonce,
            });
        }
        account.nonce += 1;
        inner.tx_counter += 1;

        let mut hasher = Sha256::new();
        hasher.update(&signing_bytes);
        hasher.update(inner.tx_counter.to_be_bytes());
        let tx_hash = TxHash(format!("0x{}", hex::encode(hasher.finalize())));

        let block = self.height(inner);
        let now = self.timestamp(block);
        let injected = inner
            .rejections
            .get_mut(&req.method)
            .and_then(|q| q.pop_front());
        let outcome = match injected {
            Some(reason) => Err(reason),
            None => self.execute(inner, req, block, now),
        };

        let (status, logs) = match outcome {
            Ok(emitted) => {
                let logs: Vec<ChainEvent> = emitted
                    .into_iter()
                    .map(|(contract, event)| ChainEvent {
                        contract,
                        name: self.codec.event_name(event.kind()).to_string(),
                        data: self.codec.encode_event(&event),
                        block_number: block,
                        tx_hash: tx_hash.clone(),
                    })
                    .collect();
                (ReceiptStatus::Success, logs)
            }
            Err(reason) => (ReceiptStatus::Reverted(reason), Vec::new()),
        };
        debug!(
            chain = %self.config.name,
            method = %req.method,
            block,
            status = ?status,
            "simulated transaction executed"
        );

        inner
            .executed
            .push((req.method.clone(), status == ReceiptStatus::Success));
        inner.events.extend(logs.iter().cloned());
        let receipt = Receipt {
            tx_hash: tx_hash.clone(),
            block_number: block,
            status,
            logs: if self.config.receipt_logs { logs } else { Vec::new() },
        };
        inner.receipts.insert(tx_hash.clone(), receipt);
        Ok(tx_hash)
    }

    async fn wait_receipt(&self, tx_hash: &TxHash) -> Result<Receipt, ChainClientError> {
        self.inner
            .lock()
            .receipts
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| ChainClientError::NotFound(tx_hash.to_string()))
    }

    async fn call(
        &self,
        contract: &Address,
        method: &str,
        args: &[u8],
    ) -> Result<Vec<u8>, ChainClientError> {
        let mut inner = self.inner.lock();
        if let Some(err) = inner.call_failures.pop_front() {
            return Err(err);
        }
        let view = self
            .codec
            .decode_view(method, args)
            .map_err(|e| ChainClientError::Reverted(format!("invalid_call: {}", e)))?;
        let out = match view {
            EscrowView::EscrowOf { salt } if *contract == self.config.factory => {
                self.codec.encode_location(inner.by_salt.get(&salt))
            }
            EscrowView::State => self
                .codec
                .encode_state(inner.escrows.get(contract).map(|e| &e.state)),
            EscrowView::Allowance { owner, spender } => {
                let amount = inner
                    .tokens
                    .get(contract)
                    .and_then(|l| l.allowances.get(&(owner, spender)))
                    .copied()
                    .unwrap_or(0);
                self.codec.encode_amount(amount)
            }
            EscrowView::EscrowOf { .. } => {
                return Err(ChainClientError::Reverted("unknown_contract".into()))
            }
        };
        Ok(out)
    }

    async fn poll_events(
        &self,
        contract: &Address,
        event: &str,
        from_block: u64,
    ) -> Result<Vec<ChainEvent>, ChainClientError> {
        let inner = self.inner.lock();
        let height = self.height(&inner);
        Ok(inner
            .events
            .iter()
            .filter(|e| {
                e.contract == *contract
                    && e.name == event
                    && e.block_number >= from_block
                    && e.block_number + self.config.event_lag_blocks <= height
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::codec::CreateEscrowArgs;
    use crate::adapters::local_signer::{derive_dev_key, hmac_sign};
    use crate::adapters::TokioClock;
    use crate::domain::LegTimelocks;
    use std::time::Duration;

    const T0: u64 = 1_700_000_000;

    struct Fixture {
        chain: SimulatedChain,
        maker: Address,
        taker: Address,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(TokioClock::starting_at(T0));
        let chain = SimulatedChain::new(SimulatedChainConfig::for_family(ChainFamily::Evm), clock);
        let maker = Address::new(format!("0x{}", "11".repeat(20)));
        let taker = Address::new(format!("0x{}", "22".repeat(20)));
        chain.add_account(maker.clone(), derive_dev_key("evm", &maker), 10_000);
        chain.add_account(taker.clone(), derive_dev_key("evm", &taker), 10_000);
        Fixture { chain, maker, taker }
    }

    async fn send(
        chain: &SimulatedChain,
        from: &Address,
        to: &Address,
        call: EscrowCall,
        value: u128,
    ) -> Receipt {
        let (method, payload) = chain.codec.encode_call(&call);
        let request = TxRequest {
            from: from.clone(),
            to: to.clone(),
            nonce: chain.get_transaction_count(from).await.unwrap(),
            method,
            payload,
            value,
        };
        let signature = hmac_sign(&derive_dev_key("evm", from), &request.signing_bytes());
        let hash = chain
            .send_transaction(SignedTransaction { request, signature })
            .await
            .unwrap();
        chain.wait_receipt(&hash).await.unwrap()
    }

    fn create_call(f: &Fixture, secret: &[u8]) -> EscrowCall {
        EscrowCall::CreateEscrow(CreateEscrowArgs {
            salt: [9; 32],
            maker: f.maker.clone(),
            taker: f.taker.clone(),
            token: TokenRef::Native,
            amount: 1_000,
            safety_deposit: 100,
            hashlock: HashAlgorithm::Keccak256.digest(secret),
            timelocks: LegTimelocks {
                withdrawal: T0 + 60,
                public_withdrawal: T0 + 120,
                cancellation: T0 + 600,
                public_cancellation: Some(T0 + 900),
            },
            is_source: true,
        })
    }

    async fn created_escrow(f: &Fixture) -> Address {
        let factory = f.chain.factory().clone();
        let receipt = send(&f.chain, &f.taker, &factory, create_call(f, b"secret"), 0).await;
        assert_eq!(receipt.status, ReceiptStatus::Success);
        match f.chain.codec.decode_event(&receipt.logs[0].name, &receipt.logs[0].data) {
            Ok(EscrowEvent::Created { escrow, .. }) => escrow,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_follow_clock_and_halt() {
        let f = fixture();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(f.chain.get_block_number().await.unwrap(), 10);
        f.chain.halt();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(f.chain.get_block_number().await.unwrap(), 10);
        f.chain.resume();
        assert_eq!(f.chain.get_block_number().await.unwrap(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_salt_rejected() {
        let f = fixture();
        created_escrow(&f).await;
        let factory = f.chain.factory().clone();
        let receipt = send(&f.chain, &f.taker, &factory, create_call(&f, b"secret"), 0).await;
        assert_eq!(receipt.status, ReceiptStatus::Reverted("already_exists".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fund_withdraw_moves_balances() {
        let f = fixture();
        let escrow = created_escrow(&f).await;
        let funded = send(&f.chain, &f.maker, &escrow, EscrowCall::Fund, 1_100).await;
        assert_eq!(funded.status, ReceiptStatus::Success);
        assert_eq!(f.chain.native_balance(&f.maker), 8_900);

        // Too early.
        let mut secret = [0u8; 32];
        secret[..6].copy_from_slice(b"secret");
        let early = send(&f.chain, &f.taker, &escrow, EscrowCall::Withdraw { secret }, 0).await;
        assert_eq!(
            early.status,
            ReceiptStatus::Reverted("withdrawal_window_not_open".into())
        );

        tokio::time::sleep(Duration::from_secs(72)).await;
        let wrong = send(
            &f.chain,
            &f.taker,
            &escrow,
            EscrowCall::Withdraw { secret: [1; 32] },
            0,
        )
        .await;
        assert_eq!(wrong.status, ReceiptStatus::Reverted("invalid_secret".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_private_window_is_taker_only() {
        let f = fixture();
        let secret = [5u8; 32];
        let factory = f.chain.factory().clone();
        let receipt = send(&f.chain, &f.taker, &factory, create_call(&f, &secret), 0).await;
        let escrow = match f
            .chain
            .codec
            .decode_event(&receipt.logs[0].name, &receipt.logs[0].data)
        {
            Ok(EscrowEvent::Created { escrow, .. }) => escrow,
            other => panic!("unexpected {:?}", other),
        };
        send(&f.chain, &f.maker, &escrow, EscrowCall::Fund, 1_100).await;
        tokio::time::sleep(Duration::from_secs(72)).await;

        let by_maker = send(&f.chain, &f.maker, &escrow, EscrowCall::Withdraw { secret }, 0).await;
        assert_eq!(by_maker.status, ReceiptStatus::Reverted("unauthorized".into()));

        let by_taker = send(&f.chain, &f.taker, &escrow, EscrowCall::Withdraw { secret }, 0).await;
        assert_eq!(by_taker.status, ReceiptStatus::Success);
        // Principal and deposit both go to the taker on the source leg.
        assert_eq!(f.chain.native_balance(&f.taker), 11_100);
        assert!(f.chain.escrow_state(&escrow).unwrap().completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bad_signature_and_nonce() {
        let f = fixture();
        let (method, payload) = f.chain.codec.encode_call(&EscrowCall::Cancel);
        let request = TxRequest {
            from: f.maker.clone(),
            to: f.maker.clone(),
            nonce: 5,
            method,
            payload,
            value: 0,
        };
        let forged = hmac_sign(&[0; 32], &request.signing_bytes());
        let err = f
            .chain
            .send_transaction(SignedTransaction {
                request: request.clone(),
                signature: forged,
            })
            .await
            .unwrap_err();
        assert_eq!(err, ChainClientError::Reverted("invalid_signature".into()));

        let signature = hmac_sign(&derive_dev_key("evm", &f.maker), &request.signing_bytes());
        let err = f
            .chain
            .send_transaction(SignedTransaction { request, signature })
            .await
            .unwrap_err();
        assert!(matches!(err, ChainClientError::NonceConflict { expected: 0, got: 5 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_lag_hides_recent_events() {
        let clock = Arc::new(TokioClock::starting_at(T0));
        let mut config = SimulatedChainConfig::for_family(ChainFamily::Evm);
        config.event_lag_blocks = 2;
        let chain = SimulatedChain::new(config, clock);
        let taker = Address::new(format!("0x{}", "22".repeat(20)));
        chain.add_account(taker.clone(), derive_dev_key("evm", &taker), 0);
        let f = Fixture {
            chain,
            maker: Address::new(format!("0x{}", "11".repeat(20))),
            taker,
        };
        created_escrow(&f).await;
        let factory = f.chain.factory().clone();
        let name = f.chain.codec.event_name(crate::adapters::codec::EventKind::Created);
        assert!(f.chain.poll_events(&factory, name, 0).await.unwrap().is_empty());
        tokio::time::sleep(Duration::from_secs(24)).await;
        assert_eq!(f.chain.poll_events(&factory, name, 0).await.unwrap().len(), 1);
    }
}
