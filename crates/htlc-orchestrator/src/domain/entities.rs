//! # Domain Entities
//!
//! The `Swap` aggregate, the request it is built from, and the read models
//! handed to operators (`SwapSnapshot`, `RecoveryBundle`).

use serde::{Deserialize, Serialize};

use super::errors::SwapError;
use super::secure_secret::SecureSecret;
use super::state_machine::{FailureReason, SwapStatus};
use super::timelocks::{TimelockDelays, Timelocks};
use super::value_objects::{
    Address, ChainFamily, EscrowRef, HashlockPair, Leg, OrderHash, SwapDirection, SwapId,
    TokenRef, TxHash,
};

/// Terms for one leg of a swap request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegTerms {
    /// Maker address on this leg's chain.
    pub maker: Address,
    /// Taker (resolver) address on this leg's chain.
    pub taker: Address,
    /// Locked asset.
    #[serde(default)]
    pub token: TokenRef,
    /// Principal.
    pub amount: u128,
    /// Safety deposit paid by the depositor on top of the principal.
    pub safety_deposit: u128,
}

/// Untrusted swap request from an order source or operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    /// Chain family funding first.
    pub source_chain: ChainFamily,
    /// Chain family funding second.
    pub destination_chain: ChainFamily,
    /// Source leg terms.
    pub source: LegTerms,
    /// Destination leg terms.
    pub destination: LegTerms,
    /// Delays override; configured defaults when absent.
    #[serde(default)]
    pub timelocks: Option<TimelockDelays>,
    /// Maker-chosen nonce distinguishing otherwise identical orders.
    #[serde(default)]
    pub nonce: u64,
}

impl SwapRequest {
    /// Terms for `leg`.
    pub fn leg(&self, leg: Leg) -> &LegTerms {
        match leg {
            Leg::Source => &self.source,
            Leg::Destination => &self.destination,
        }
    }
}

/// Maker and taker on one chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegParties {
    /// Maker address.
    pub maker: Address,
    /// Taker address.
    pub taker: Address,
}

impl LegParties {
    /// Who funds this leg's escrow.
    pub fn depositor(&self, leg: Leg) -> &Address {
        match leg {
            Leg::Source => &self.maker,
            Leg::Destination => &self.taker,
        }
    }

    /// Who receives the principal on withdrawal.
    pub fn recipient(&self, leg: Leg) -> &Address {
        match leg {
            Leg::Source => &self.taker,
            Leg::Destination => &self.maker,
        }
    }
}

/// Parties for both legs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParties {
    /// Source chain parties.
    pub source: LegParties,
    /// Destination chain parties.
    pub destination: LegParties,
}

impl SwapParties {
    /// Parties for `leg`.
    pub fn for_leg(&self, leg: Leg) -> &LegParties {
        match leg {
            Leg::Source => &self.source,
            Leg::Destination => &self.destination,
        }
    }
}

/// Asset and amounts for one leg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegAmounts {
    /// Locked asset.
    pub token: TokenRef,
    /// Principal.
    pub amount: u128,
    /// Safety deposit.
    pub safety_deposit: u128,
}

/// Amounts for both legs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapAmounts {
    /// Source leg.
    pub source: LegAmounts,
    /// Destination leg.
    pub destination: LegAmounts,
}

impl SwapAmounts {
    /// Amounts for `leg`.
    pub fn for_leg(&self, leg: Leg) -> &LegAmounts {
        match leg {
            Leg::Source => &self.source,
            Leg::Destination => &self.destination,
        }
    }
}

/// Escrow references, filled in as escrows are created.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapEscrows {
    /// Source escrow.
    pub source: Option<EscrowRef>,
    /// Destination escrow.
    pub destination: Option<EscrowRef>,
}

impl SwapEscrows {
    /// Escrow for `leg`, if created.
    pub fn for_leg(&self, leg: Leg) -> Option<&EscrowRef> {
        match leg {
            Leg::Source => self.source.as_ref(),
            Leg::Destination => self.destination.as_ref(),
        }
    }
}

/// What a transaction-log entry records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    /// Escrow created.
    CreateEscrow,
    /// Token allowance granted.
    Approve,
    /// Escrow funded.
    FundEscrow,
    /// Required confirmations reached.
    FinalityReached,
    /// Secret published by withdrawal.
    Withdraw,
    /// Escrow refunded.
    Cancel,
    /// Counterparty reveal observed on chain.
    RevealObserved,
    /// Contract rejected a call.
    Rejection,
    /// Finality could not be established in time.
    FinalityTimeout,
    /// Operator abort received.
    AbortRequested,
}

/// One append-only audit entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Entry type.
    pub kind: TxKind,
    /// Chain the entry concerns.
    pub chain: ChainFamily,
    /// Leg the entry concerns.
    pub leg: Leg,
    /// Transaction hash, when a transaction was sent.
    pub tx_hash: Option<TxHash>,
    /// Unix seconds.
    pub timestamp: u64,
    /// Free-form detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Append-only transaction log.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionLog(Vec<TransactionRecord>);

impl TransactionLog {
    /// Append an entry.
    pub fn append(&mut self, record: TransactionRecord) {
        self.0.push(record);
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[TransactionRecord] {
        &self.0
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries of `kind` on `leg`.
    pub fn count(&self, kind: TxKind, leg: Leg) -> usize {
        self.0
            .iter()
            .filter(|r| r.kind == kind && r.leg == leg)
            .count()
    }

    /// Whether any entry of `kind` exists, on either leg.
    pub fn contains(&self, kind: TxKind) -> bool {
        self.0.iter().any(|r| r.kind == kind)
    }
}

/// Failure details kept for operators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Classified reason.
    pub reason: FailureReason,
    /// Error text.
    pub detail: String,
    /// Status the swap was in when it failed.
    pub failed_in: SwapStatus,
    /// Unix seconds.
    pub at: u64,
}

/// Parameters for a new swap, after validation.
#[derive(Clone, Debug)]
pub struct NewSwap {
    /// Identifier.
    pub id: SwapId,
    /// Order digest.
    pub order_hash: OrderHash,
    /// Direction.
    pub direction: SwapDirection,
    /// Parties.
    pub parties: SwapParties,
    /// Amounts.
    pub amounts: SwapAmounts,
    /// Secret preimage.
    pub secret: SecureSecret,
    /// Per-leg hashlocks of `secret`.
    pub hashlocks: HashlockPair,
    /// Absolute schedule.
    pub timelocks: Timelocks,
    /// Creation time.
    pub created_at: u64,
}

/// One cross-chain swap.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Swap {
    /// Identifier.
    pub id: SwapId,
    /// Order digest.
    pub order_hash: OrderHash,
    /// Which chain is source.
    pub direction: SwapDirection,
    /// Makers and takers.
    pub parties: SwapParties,
    /// Assets and amounts.
    pub amounts: SwapAmounts,
    /// Per-leg hashlocks.
    pub hashlocks: HashlockPair,
    /// Absolute schedule.
    pub timelocks: Timelocks,
    /// Escrow references.
    pub escrows: SwapEscrows,
    secret: Option<SecureSecret>,
    secret_public: bool,
    status: SwapStatus,
    failure: Option<FailureRecord>,
    log: TransactionLog,
    /// Creation time.
    pub created_at: u64,
    /// Last mutation time.
    pub updated_at: u64,
    /// Both escrows funded at.
    pub both_funded_at: Option<u64>,
    /// Terminal state reached at.
    pub finished_at: Option<u64>,
}

impl Swap {
    /// Create a swap in `Created`.
    pub fn new(params: NewSwap) -> Self {
        Self {
            id: params.id,
            order_hash: params.order_hash,
            direction: params.direction,
            parties: params.parties,
            amounts: params.amounts,
            hashlocks: params.hashlocks,
            timelocks: params.timelocks,
            escrows: SwapEscrows::default(),
            secret: Some(params.secret),
            secret_public: false,
            status: SwapStatus::Created,
            failure: None,
            log: TransactionLog::default(),
            created_at: params.created_at,
            updated_at: params.created_at,
            both_funded_at: None,
            finished_at: None,
        }
    }

    /// Current status.
    pub fn status(&self) -> SwapStatus {
        self.status
    }

    /// Terminal state reached.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Secret, while the swap still holds it.
    pub fn secret(&self) -> Option<&SecureSecret> {
        self.secret.as_ref()
    }

    /// Whether the secret is public on chain.
    pub fn secret_public(&self) -> bool {
        self.secret_public
    }

    /// Record that the secret is visible on chain.
    pub fn mark_secret_public(&mut self) {
        self.secret_public = true;
    }

    /// Failure details.
    pub fn failure(&self) -> Option<&FailureRecord> {
        self.failure.as_ref()
    }

    /// Audit trail.
    pub fn transaction_log(&self) -> &TransactionLog {
        &self.log
    }

    /// Chain family hosting `leg`.
    pub fn chain(&self, leg: Leg) -> ChainFamily {
        self.direction.family(leg)
    }

    /// Escrow for `leg`.
    pub fn escrow(&self, leg: Leg) -> Option<&EscrowRef> {
        self.escrows.for_leg(leg)
    }

    /// Store the escrow reference for `leg`.
    pub fn set_escrow(&mut self, leg: Leg, escrow: EscrowRef) {
        match leg {
            Leg::Source => self.escrows.source = Some(escrow),
            Leg::Destination => self.escrows.destination = Some(escrow),
        }
    }

    /// Append an audit entry.
    pub fn record(
        &mut self,
        kind: TxKind,
        leg: Leg,
        tx_hash: Option<TxHash>,
        now: u64,
        note: Option<String>,
    ) {
        self.log.append(TransactionRecord {
            kind,
            chain: self.chain(leg),
            leg,
            tx_hash,
            timestamp: now,
            note,
        });
        self.updated_at = now;
    }

    /// Move to `next` if the state machine allows it.
    ///
    /// Entering `Cancelled` before the secret was published discards it.
    pub fn transition_to(&mut self, next: SwapStatus, now: u64) -> Result<(), SwapError> {
        if self.status == next {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(SwapError::IrrecoverableState(format!(
                "invalid transition {} -> {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        match next {
            SwapStatus::BothFunded => self.both_funded_at = Some(now),
            SwapStatus::DestinationWithdrawn => self.secret_public = true,
            SwapStatus::Cancelled if !self.secret_public => self.secret = None,
            _ => {}
        }
        if next.is_terminal() {
            self.finished_at = Some(now);
        }
        Ok(())
    }

    /// Escalate to `Failed`, keeping every recovery field.
    pub fn fail(&mut self, reason: FailureReason, detail: impl Into<String>, now: u64) {
        if self.status.is_terminal() {
            return;
        }
        self.failure = Some(FailureRecord {
            reason,
            detail: detail.into(),
            failed_in: self.status,
            at: now,
        });
        self.status = SwapStatus::Failed;
        self.updated_at = now;
        self.finished_at = Some(now);
    }

    /// Operator-facing view with the secret redacted until public.
    pub fn snapshot(&self) -> SwapSnapshot {
        let secret = match (&self.secret, self.secret_public) {
            (Some(secret), true) => SecretView::Public(secret.to_hex()),
            (Some(_), false) => SecretView::Redacted,
            (None, _) => SecretView::Discarded,
        };
        SwapSnapshot {
            id: self.id,
            order_hash: self.order_hash,
            direction: self.direction,
            status: self.status,
            parties: self.parties.clone(),
            amounts: self.amounts.clone(),
            hashlocks: self.hashlocks,
            timelocks: self.timelocks,
            escrows: self.escrows.clone(),
            secret,
            failure: self.failure.clone(),
            transaction_log: self.log.entries().to_vec(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            finished_at: self.finished_at,
        }
    }

    /// Everything an operator needs to finish or refund by hand.
    pub fn recovery_bundle(&self) -> RecoveryBundle {
        RecoveryBundle {
            swap_id: self.id,
            order_hash: self.order_hash,
            direction: self.direction,
            status: self.status,
            secret_hex: self.secret.as_ref().map(SecureSecret::to_hex),
            secret_public: self.secret_public,
            hashlocks: self.hashlocks,
            escrows: self.escrows.clone(),
            parties: self.parties.clone(),
            amounts: self.amounts.clone(),
            timelocks: self.timelocks,
            failure: self.failure.clone(),
        }
    }
}

/// Secret as shown in snapshots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum SecretView {
    /// Held, not yet public.
    Redacted,
    /// Public on chain.
    Public(String),
    /// Dropped after a pre-reveal cancellation.
    Discarded,
}

/// Read model for status queries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapSnapshot {
    /// Identifier.
    pub id: SwapId,
    /// Order digest.
    pub order_hash: OrderHash,
    /// Direction.
    pub direction: SwapDirection,
    /// Current status.
    pub status: SwapStatus,
    /// Parties.
    pub parties: SwapParties,
    /// Amounts.
    pub amounts: SwapAmounts,
    /// Hashlocks.
    pub hashlocks: HashlockPair,
    /// Schedule.
    pub timelocks: Timelocks,
    /// Escrow references.
    pub escrows: SwapEscrows,
    /// Secret, redacted until public.
    pub secret: SecretView,
    /// Failure details.
    pub failure: Option<FailureRecord>,
    /// Audit trail.
    pub transaction_log: Vec<TransactionRecord>,
    /// Created at.
    pub created_at: u64,
    /// Updated at.
    pub updated_at: u64,
    /// Finished at.
    pub finished_at: Option<u64>,
}

/// Manual recovery data, including the secret in the clear.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryBundle {
    /// Identifier.
    pub swap_id: SwapId,
    /// Order digest.
    pub order_hash: OrderHash,
    /// Direction.
    pub direction: SwapDirection,
    /// Current status.
    pub status: SwapStatus,
    /// Secret hex, absent once discarded.
    pub secret_hex: Option<String>,
    /// Whether the secret is public on chain.
    pub secret_public: bool,
    /// Hashlocks.
    pub hashlocks: HashlockPair,
    /// Escrow references.
    pub escrows: SwapEscrows,
    /// Parties.
    pub parties: SwapParties,
    /// Amounts.
    pub amounts: SwapAmounts,
    /// Schedule.
    pub timelocks: Timelocks,
    /// Failure details.
    pub failure: Option<FailureRecord>,
}
