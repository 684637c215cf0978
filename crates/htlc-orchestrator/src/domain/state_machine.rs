//! # Swap State Machine
//!
//! ```text
//! Created -> EscrowsCreated -> SourceFunded -> BothFunded -> DestinationWithdrawn -> Completed
//!    |             |                |              |
//!    +-------------+----------------+--------------+--> Cancelled
//!
//! any non-terminal state --> Failed
//! ```
//!
//! Transitions only move forward. Retrying inside a step never changes status.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::{ContractRejectionKind, SwapError};

/// Lifecycle status of one swap.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapStatus {
    /// Secret and schedule generated; nothing on chain.
    #[default]
    Created,
    /// Both escrows exist, neither funded.
    EscrowsCreated,
    /// Source escrow holds the maker's funds.
    SourceFunded,
    /// Both escrows hold funds.
    BothFunded,
    /// Destination withdrawn; the secret is public.
    DestinationWithdrawn,
    /// Both escrows withdrawn.
    Completed,
    /// Every funded escrow refunded.
    Cancelled,
    /// Needs operator action.
    Failed,
}

impl SwapStatus {
    /// Check if transition is valid.
    pub fn can_transition_to(&self, next: SwapStatus) -> bool {
        use SwapStatus::*;
        match (self, next) {
            (Created, EscrowsCreated) => true,
            (EscrowsCreated, SourceFunded) => true,
            (SourceFunded, BothFunded) => true,
            (BothFunded, DestinationWithdrawn) => true,
            (DestinationWithdrawn, Completed) => true,
            (Created | EscrowsCreated | SourceFunded | BothFunded, Cancelled) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Check if terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Whether the secret has been published on chain.
    pub fn secret_revealed(&self) -> bool {
        matches!(self, Self::DestinationWithdrawn | Self::Completed)
    }

    /// Whether an operator abort can still lead to refunds.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            Self::Created | Self::EscrowsCreated | Self::SourceFunded | Self::BothFunded
        )
    }

    /// Stable name for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::EscrowsCreated => "escrows_created",
            Self::SourceFunded => "source_funded",
            Self::BothFunded => "both_funded",
            Self::DestinationWithdrawn => "destination_withdrawn",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a swap ended in `Failed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum FailureReason {
    /// Confirmations not reached in time.
    FinalityTimeout,
    /// Confirmation depth could not be established.
    FinalityIndeterminate,
    /// Contract rejected a step in a way that cannot be routed to cancellation.
    ContractRejection(ContractRejectionKind),
    /// Transient errors outlasted the retry budget.
    RetriesExhausted,
    /// A suspension point exceeded its bound.
    SuspensionTimeout,
    /// Escrow reference never appeared in chain logs.
    ReferenceExtractionFailed,
    /// Unsafe state; no automatic fund movement.
    IrrecoverableState,
}

impl FailureReason {
    /// Reason for an escalated error.
    pub fn from_error(err: &SwapError) -> Self {
        match err {
            SwapError::FinalityTimeout { .. } => Self::FinalityTimeout,
            SwapError::FinalityIndeterminate { .. } => Self::FinalityIndeterminate,
            SwapError::ContractRejection { kind, .. } => Self::ContractRejection(kind.clone()),
            SwapError::RetriesExhausted { .. } | SwapError::TransientChain { .. } => {
                Self::RetriesExhausted
            }
            SwapError::SuspensionTimeout { .. } => Self::SuspensionTimeout,
            SwapError::ReferenceExtractionFailed { .. } => Self::ReferenceExtractionFailed,
            _ => Self::IrrecoverableState,
        }
    }

    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FinalityTimeout => "finality_timeout",
            Self::FinalityIndeterminate => "finality_indeterminate",
            Self::ContractRejection(_) => "contract_rejection",
            Self::RetriesExhausted => "retries_exhausted",
            Self::SuspensionTimeout => "suspension_timeout",
            Self::ReferenceExtractionFailed => "reference_extraction_failed",
            Self::IrrecoverableState => "irrecoverable_state",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContractRejection(kind) => write!(f, "contract_rejection({})", kind),
            other => f.write_str(other.label()),
        }
    }
}
