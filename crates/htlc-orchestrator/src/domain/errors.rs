//! # Domain Errors
//!
//! Error taxonomy for swap orchestration.
//!
//! | Class | Retried | Effect |
//! |-------|---------|--------|
//! | Validation | never | returned synchronously from `create_swap` |
//! | Transient | bounded backoff | absorbed unless retries exhaust |
//! | Rejection | no, re-read state | cancel path or success on stale view |
//! | Finality | no | swap escalates to `Failed` |
//! | Irrecoverable | no | swap escalates to `Failed`, no fund movement |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::state_machine::SwapStatus;

/// Hash type (32-byte digest).
pub type Hash = [u8; 32];

/// Secret preimage type (32-byte).
pub type Secret = [u8; 32];

/// Synchronous swap request rejection.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A leg amount is zero.
    #[error("{leg} amount must be non-zero")]
    ZeroAmount {
        /// Offending leg.
        leg: &'static str,
    },

    /// Address does not match the chain family encoding.
    #[error("invalid {chain} address for {field}: {address}")]
    InvalidAddress {
        /// Chain family name.
        chain: String,
        /// Request field.
        field: &'static str,
        /// Raw value.
        address: String,
    },

    /// Safety deposit below the configured chain minimum.
    #[error("{leg} safety deposit {got} below minimum {min}")]
    SafetyDepositTooLow {
        /// Offending leg.
        leg: &'static str,
        /// Requested deposit.
        got: u128,
        /// Configured minimum.
        min: u128,
    },

    /// A delay is shorter than the configured floor.
    #[error("{field} delay {got}s below minimum {min}s")]
    TimelockTooShort {
        /// Delay name.
        field: &'static str,
        /// Requested delay.
        got: u64,
        /// Configured floor.
        min: u64,
    },

    /// A delay exceeds the configured ceiling.
    #[error("{field} delay {got}s above maximum {max}s")]
    TimelockTooLong {
        /// Delay name.
        field: &'static str,
        /// Requested delay.
        got: u64,
        /// Configured ceiling.
        max: u64,
    },

    /// Stages of one leg are out of order.
    #[error("{leg} timelock stages out of order: {detail}")]
    TimelockOrdering {
        /// Offending leg.
        leg: &'static str,
        /// Which pair of stages.
        detail: &'static str,
    },

    /// Destination withdrawal window does not close before source cancellation.
    #[error(
        "cross-chain ordering violated: destination cancellation {destination_cancellation} + margin {margin}s must precede source cancellation {source_cancellation}"
    )]
    CrossChainOrdering {
        /// Absolute destination cancellation-open time.
        destination_cancellation: u64,
        /// Absolute source cancellation-open time.
        source_cancellation: u64,
        /// Required margin in seconds.
        margin: u64,
    },

    /// Same order is already being driven.
    #[error("order {0} already has an active swap")]
    DuplicateOrder(String),

    /// Source and destination resolve to the same chain.
    #[error("unsupported swap direction: {0}")]
    UnsupportedDirection(String),
}

/// Chain-enforced rule violations reported by escrow contracts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum ContractRejectionKind {
    /// Preimage does not hash to the escrow hashlock.
    InvalidSecret,
    /// Withdrawal attempted before the withdrawal timelock.
    WithdrawalWindowNotOpen,
    /// Withdrawal attempted after cancellation opened.
    WithdrawalWindowClosed,
    /// Cancel attempted before the cancellation timelock.
    CancellationWindowNotOpen,
    /// Escrow already withdrawn.
    AlreadyCompleted,
    /// Escrow already refunded.
    AlreadyCancelled,
    /// Escrow already holds its principal.
    AlreadyFunded,
    /// Escrow with this salt already exists.
    AlreadyExists,
    /// Escrow has not been funded.
    NotFunded,
    /// Caller not permitted in the current window.
    Unauthorized,
    /// Depositor cannot cover principal and deposit.
    InsufficientBalance,
    /// Contract refused the parameters.
    InvalidParameters(String),
}

impl ContractRejectionKind {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InvalidSecret => "invalid_secret",
            Self::WithdrawalWindowNotOpen => "withdrawal_window_not_open",
            Self::WithdrawalWindowClosed => "withdrawal_window_closed",
            Self::CancellationWindowNotOpen => "cancellation_window_not_open",
            Self::AlreadyCompleted => "already_completed",
            Self::AlreadyCancelled => "already_cancelled",
            Self::AlreadyFunded => "already_funded",
            Self::AlreadyExists => "already_exists",
            Self::NotFunded => "not_funded",
            Self::Unauthorized => "unauthorized",
            Self::InsufficientBalance => "insufficient_balance",
            Self::InvalidParameters(_) => "invalid_parameters",
        }
    }
}

impl std::fmt::Display for ContractRejectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidParameters(detail) => write!(f, "invalid_parameters({})", detail),
            other => f.write_str(other.label()),
        }
    }
}

/// Coarse error classes driving retry and escalation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rejected before any chain action.
    Validation,
    /// Safe to retry at the same step.
    Transient,
    /// Contract refused; re-read before deciding.
    Rejection,
    /// Confirmations not reached or not determinable.
    Finality,
    /// Operator must intervene.
    Irrecoverable,
    /// Lifecycle signals (abort, shutdown, lookup misses).
    Operational,
}

/// Orchestrator error.
#[derive(Debug, Error)]
pub enum SwapError {
    /// Swap request failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// RPC timeout, nonce collision, underpriced transaction.
    #[error("transient error on {chain}: {message}")]
    TransientChain {
        /// Chain name.
        chain: String,
        /// Transport detail.
        message: String,
    },

    /// Escrow contract rejected the call.
    #[error("contract on {chain} rejected call: {kind}")]
    ContractRejection {
        /// Chain name.
        chain: String,
        /// Rejection reason.
        kind: ContractRejectionKind,
    },

    /// Required confirmations not reached within the bound.
    #[error("finality timeout on {chain}: {confirmations}/{required} confirmations")]
    FinalityTimeout {
        /// Chain name.
        chain: String,
        /// Confirmations observed.
        confirmations: u64,
        /// Confirmations required.
        required: u64,
    },

    /// Confirmation depth could not be established.
    #[error("finality indeterminate on {chain}: {reason}")]
    FinalityIndeterminate {
        /// Chain name.
        chain: String,
        /// What could not be read.
        reason: String,
    },

    /// State the orchestrator must not act on automatically.
    #[error("irrecoverable state: {0}")]
    IrrecoverableState(String),

    /// Escrow reference never showed up in logs.
    #[error("escrow reference extraction failed on {chain} after {attempts} attempts")]
    ReferenceExtractionFailed {
        /// Chain name.
        chain: String,
        /// Attempts made.
        attempts: u32,
    },

    /// Transient errors persisted past the retry budget.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Operation name.
        operation: String,
        /// Attempts made.
        attempts: u32,
        /// Last transient error.
        last: String,
    },

    /// A suspension point exceeded its bound.
    #[error("timed out waiting for {what}")]
    SuspensionTimeout {
        /// Awaited condition.
        what: String,
    },

    /// Swap id unknown to the registry.
    #[error("swap not found: {0}")]
    SwapNotFound(String),

    /// Operator cancellation observed at a suspension point.
    #[error("swap aborted by operator")]
    Aborted,

    /// Orchestrator is draining.
    #[error("orchestrator shutting down")]
    ShuttingDown,

    /// Cancellation not possible from this status.
    #[error("swap cannot be cancelled in status {status}")]
    CannotCancel {
        /// Current status.
        status: SwapStatus,
    },

    /// Signer refused or failed.
    #[error("signer error: {0}")]
    Signer(String),

    /// Persistence failure.
    #[error("store error: {0}")]
    Store(String),

    /// OS entropy source unavailable.
    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    /// Response bytes could not be decoded.
    #[error("codec error on {chain}: {message}")]
    Codec {
        /// Chain name.
        chain: String,
        /// Decoder detail.
        message: String,
    },
}

impl SwapError {
    /// Classify for retry and escalation decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::TransientChain { .. } => ErrorClass::Transient,
            Self::ContractRejection { .. } => ErrorClass::Rejection,
            Self::FinalityTimeout { .. } | Self::FinalityIndeterminate { .. } => {
                ErrorClass::Finality
            }
            Self::IrrecoverableState(_) | Self::Codec { .. } | Self::EntropyUnavailable(_) => {
                ErrorClass::Irrecoverable
            }
            Self::ReferenceExtractionFailed { .. }
            | Self::RetriesExhausted { .. }
            | Self::SuspensionTimeout { .. }
            | Self::SwapNotFound(_)
            | Self::Aborted
            | Self::ShuttingDown
            | Self::CannotCancel { .. }
            | Self::Signer(_)
            | Self::Store(_) => ErrorClass::Operational,
        }
    }

    /// Whether the same step may be retried.
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Rejection kind, if this is a contract rejection.
    pub fn rejection(&self) -> Option<&ContractRejectionKind> {
        match self {
            Self::ContractRejection { kind, .. } => Some(kind),
            _ => None,
        }
    }
}
