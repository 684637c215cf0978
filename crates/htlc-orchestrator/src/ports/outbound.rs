//! # Outbound Ports
//!
//! Traits for external dependencies: chain RPC clients, key custody, the
//! per-chain escrow adapters built on top of them, time, order intake and
//! swap persistence.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{
    Address, ChainFamily, ContractRejectionKind, EscrowRef, EscrowState, Hash, HashAlgorithm,
    Hashlock, Leg, LegTimelocks, SecureSecret, Swap, SwapError, SwapId, SwapRequest, TokenRef,
    TxHash, TxResult,
};

// =============================================================================
// Chain client
// =============================================================================

/// Errors from a chain RPC client.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChainClientError {
    /// Connection or HTTP failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Request timed out.
    #[error("request timed out: {0}")]
    Timeout(String),
    /// Nonce already used or out of sequence.
    #[error("nonce conflict: expected {expected}, got {got}")]
    NonceConflict {
        /// Nonce the chain expects.
        expected: u64,
        /// Nonce submitted.
        got: u64,
    },
    /// Fee too low to be accepted.
    #[error("transaction underpriced: {0}")]
    Underpriced(String),
    /// Execution reverted.
    #[error("execution reverted: {0}")]
    Reverted(String),
    /// Receipt or object not (yet) available.
    #[error("not found: {0}")]
    NotFound(String),
    /// Response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ChainClientError {
    /// Safe to retry at the same step.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_)
                | Self::Timeout(_)
                | Self::NonceConflict { .. }
                | Self::Underpriced(_)
                | Self::NotFound(_)
        )
    }

    /// Map into the orchestrator taxonomy.
    pub fn into_swap_error(self, chain: &str) -> SwapError {
        match self {
            Self::Reverted(reason) => SwapError::ContractRejection {
                chain: chain.to_string(),
                kind: rejection_from_revert(&reason),
            },
            Self::Decode(message) => SwapError::Codec {
                chain: chain.to_string(),
                message,
            },
            other => SwapError::TransientChain {
                chain: chain.to_string(),
                message: other.to_string(),
            },
        }
    }
}

/// Map a contract revert reason to a rejection kind.
pub fn rejection_from_revert(reason: &str) -> ContractRejectionKind {
    match reason {
        "invalid_secret" => ContractRejectionKind::InvalidSecret,
        "withdrawal_window_not_open" => ContractRejectionKind::WithdrawalWindowNotOpen,
        "withdrawal_window_closed" => ContractRejectionKind::WithdrawalWindowClosed,
        "cancellation_window_not_open" => ContractRejectionKind::CancellationWindowNotOpen,
        "already_completed" => ContractRejectionKind::AlreadyCompleted,
        "already_cancelled" => ContractRejectionKind::AlreadyCancelled,
        "already_funded" => ContractRejectionKind::AlreadyFunded,
        "already_exists" => ContractRejectionKind::AlreadyExists,
        "not_funded" => ContractRejectionKind::NotFunded,
        "unauthorized" => ContractRejectionKind::Unauthorized,
        "insufficient_balance" => ContractRejectionKind::InsufficientBalance,
        other => ContractRejectionKind::InvalidParameters(other.to_string()),
    }
}

/// Unsigned transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    /// Sender account.
    pub from: Address,
    /// Target contract.
    pub to: Address,
    /// Sender nonce.
    pub nonce: u64,
    /// Contract method.
    pub method: String,
    /// Encoded arguments.
    pub payload: Vec<u8>,
    /// Attached native value.
    pub value: u128,
}

impl TxRequest {
    /// Canonical bytes the signer signs.
    pub fn signing_bytes(&self) -> Vec<u8> {
        // Serializing plain fields into a Vec cannot fail.
        bincode::serialize(self).unwrap_or_default()
    }
}

/// Signature bytes from a `SignerProvider`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

/// Transaction ready for submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    /// The request.
    pub request: TxRequest,
    /// Signature over `request.signing_bytes()`.
    pub signature: Signature,
}

/// Contract event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    /// Emitting contract.
    pub contract: Address,
    /// Event name.
    pub name: String,
    /// Encoded event data.
    pub data: Vec<u8>,
    /// Block the event landed in.
    pub block_number: u64,
    /// Emitting transaction.
    pub tx_hash: TxHash,
}

/// Receipt outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    /// Executed.
    Success,
    /// Reverted with a reason.
    Reverted(String),
}

/// Transaction receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash.
    pub tx_hash: TxHash,
    /// Inclusion block.
    pub block_number: u64,
    /// Outcome.
    pub status: ReceiptStatus,
    /// Events emitted. May be empty when the node has not indexed them yet.
    pub logs: Vec<ChainEvent>,
}

/// Chain RPC client - outbound port.
///
/// Implementations must tolerate concurrent requests.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest block height.
    async fn get_block_number(&self) -> Result<u64, ChainClientError>;

    /// Timestamp of the latest block.
    async fn get_block_timestamp(&self) -> Result<u64, ChainClientError>;

    /// Next nonce for `address`.
    async fn get_transaction_count(&self, address: &Address) -> Result<u64, ChainClientError>;

    /// Submit a signed transaction.
    async fn send_transaction(&self, tx: SignedTransaction) -> Result<TxHash, ChainClientError>;

    /// Receipt of an included transaction.
    async fn wait_receipt(&self, tx_hash: &TxHash) -> Result<Receipt, ChainClientError>;

    /// Read-only contract call.
    async fn call(
        &self,
        contract: &Address,
        method: &str,
        args: &[u8],
    ) -> Result<Vec<u8>, ChainClientError>;

    /// Indexed events of `contract` named `event` from `from_block` on.
    async fn poll_events(
        &self,
        contract: &Address,
        event: &str,
        from_block: u64,
    ) -> Result<Vec<ChainEvent>, ChainClientError>;
}

// =============================================================================
// Signer
// =============================================================================

/// Key custody boundary - outbound port.
///
/// The core never sees private keys; it only asks for signatures.
#[async_trait]
pub trait SignerProvider: Send + Sync {
    /// Sign `payload` as `signer` on `chain`.
    async fn sign(
        &self,
        chain: &str,
        signer: &Address,
        payload: &[u8],
    ) -> Result<Signature, SwapError>;
}

// =============================================================================
// Chain adapter
// =============================================================================

/// Parameters for a new escrow.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscrowParams {
    /// Owning swap.
    pub swap_id: SwapId,
    /// Leg served.
    pub leg: Leg,
    /// Deterministic salt.
    pub salt: Hash,
    /// Maker.
    pub maker: Address,
    /// Taker.
    pub taker: Address,
    /// Locked asset.
    pub token: TokenRef,
    /// Principal.
    pub amount: u128,
    /// Safety deposit.
    pub safety_deposit: u128,
    /// Hashlock checked by the escrow.
    pub hashlock: Hashlock,
    /// Absolute schedule.
    pub timelocks: LegTimelocks,
}

/// Funding instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Funding {
    /// Account paying principal and deposit.
    pub depositor: Address,
    /// Locked asset.
    pub token: TokenRef,
    /// Principal.
    pub amount: u128,
    /// Safety deposit (always native).
    pub safety_deposit: u128,
}

/// Uniform escrow interface over one chain - outbound port.
///
/// One instance per chain, shared by every swap; implementations keep no
/// per-swap mutable state.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Chain family.
    fn family(&self) -> ChainFamily;

    /// Chain name for logs and metrics.
    fn chain_name(&self) -> &str;

    /// Hash function of this chain's escrows.
    fn hash_algorithm(&self) -> HashAlgorithm;

    /// Confirmations required before revealing.
    fn required_confirmations(&self) -> u64;

    /// Address encoding check.
    fn validate_address(&self, address: &Address) -> bool {
        self.family().is_valid_address(address.as_str())
    }

    /// Create an escrow and extract its reference from the creation event.
    ///
    /// Fails with `ReferenceExtractionFailed` when the event does not show up
    /// within the configured attempts.
    async fn create_escrow(&self, params: &EscrowParams) -> Result<EscrowRef, SwapError>;

    /// Escrow previously created with `salt`, if any.
    async fn find_escrow(&self, leg: Leg, salt: &Hash) -> Result<Option<EscrowRef>, SwapError>;

    /// Move principal and deposit in. No-op when already funded.
    async fn fund_escrow(&self, escrow: &EscrowRef, funding: &Funding)
        -> Result<TxResult, SwapError>;

    /// Reveal `secret` to release funds. No-op when already withdrawn.
    async fn withdraw(
        &self,
        escrow: &EscrowRef,
        secret: &SecureSecret,
        caller: &Address,
    ) -> Result<TxResult, SwapError>;

    /// Refund the depositor. No-op when already cancelled.
    async fn cancel(&self, escrow: &EscrowRef, caller: &Address) -> Result<TxResult, SwapError>;

    /// Poll until the funding block is `required` blocks deep or `deadline`
    /// (unix seconds, local clock) passes. Returns confirmations observed.
    ///
    /// A halted chain runs into the deadline; an unreadable funding block is
    /// `FinalityIndeterminate`, never success.
    async fn wait_for_finality(
        &self,
        escrow: &EscrowRef,
        required: u64,
        deadline: u64,
    ) -> Result<u64, SwapError>;

    /// Current escrow state.
    async fn read_escrow_state(&self, escrow: &EscrowRef) -> Result<EscrowState, SwapError>;

    /// Secret published by a withdrawal of `escrow`, by anyone.
    async fn find_revealed_secret(
        &self,
        escrow: &EscrowRef,
    ) -> Result<Option<SecureSecret>, SwapError>;

    /// Latest block timestamp; timelocks are judged against chain time.
    async fn chain_time(&self) -> Result<u64, SwapError>;

    /// Latest block height.
    async fn block_number(&self) -> Result<u64, SwapError>;
}

// =============================================================================
// Time, orders, persistence
// =============================================================================

/// Wall-clock source - outbound port.
pub trait Clock: Send + Sync {
    /// Unix seconds.
    fn now(&self) -> u64;
}

/// External order intake - outbound port.
///
/// Requests are untrusted and validated before use.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Next pending request, if any.
    async fn next_order(&self) -> Option<SwapRequest>;
}

/// Swap persistence - outbound port.
pub trait SwapStore: Send + Sync {
    /// Insert or replace.
    fn save(&self, swap: &Swap) -> Result<(), SwapError>;

    /// Every stored swap.
    fn load_all(&self) -> Result<Vec<Swap>, SwapError>;

    /// Stored swaps not yet terminal.
    fn load_active(&self) -> Result<Vec<Swap>, SwapError> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|s| !s.is_terminal())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_mapping() {
        let err = ChainClientError::NonceConflict {
            expected: 3,
            got: 2,
        };
        assert!(err.is_transient());
        assert!(err.into_swap_error("evm").is_transient());
    }

    #[test]
    fn test_revert_mapping() {
        let err = ChainClientError::Reverted("withdrawal_window_not_open".into());
        assert!(!err.is_transient());
        let mapped = err.into_swap_error("tvm");
        assert_eq!(
            mapped.rejection(),
            Some(&ContractRejectionKind::WithdrawalWindowNotOpen)
        );
    }

    #[test]
    fn test_unknown_revert_is_invalid_parameters() {
        assert_eq!(
            rejection_from_revert("bad_token"),
            ContractRejectionKind::InvalidParameters("bad_token".into())
        );
    }

    #[test]
    fn test_signing_bytes_bind_nonce() {
        let mut tx = TxRequest {
            from: Address::new("0x01"),
            to: Address::new("0x02"),
            nonce: 0,
            method: "withdraw".into(),
            payload: vec![1, 2, 3],
            value: 0,
        };
        let a = tx.signing_bytes();
        tx.nonce = 1;
        assert_ne!(a, tx.signing_bytes());
    }
}
