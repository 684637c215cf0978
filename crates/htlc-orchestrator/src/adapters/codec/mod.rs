//! # Escrow Wire Codecs
//!
//! Chain-family encodings of escrow calls, views, state and events.
//!
//! | Family | Calls | Addresses |
//! |--------|-------|-----------|
//! | EVM | 4-byte keccak selector + 32-byte ABI words | `0x` + 40 hex |
//! | TVM | 32-bit op code + bincode message body | `wc:` + 64 hex |
//!
//! Both adapters and the simulated chain host go through the same codec, so
//! what an adapter sends is exactly what the escrow decodes.

pub mod abi;
pub mod tvm;

use std::sync::Arc;
use thiserror::Error;

use crate::domain::{Address, ChainFamily, EscrowState, Hash, LegTimelocks, TokenRef};

pub use abi::AbiCodec;
pub use tvm::TvmCodec;

/// Malformed payload.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct CodecError(pub String);

impl CodecError {
    pub(crate) fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Arguments of an escrow creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateEscrowArgs {
    /// Deterministic salt; the escrow address derives from it.
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
    /// Hashlock digest.
    pub hashlock: Hash,
    /// Schedule.
    pub timelocks: LegTimelocks,
    /// Source-leg escrow (maker deposits) or destination-leg (taker deposits).
    pub is_source: bool,
}

/// State-changing escrow and token calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscrowCall {
    /// Factory: create an escrow.
    CreateEscrow(CreateEscrowArgs),
    /// Escrow: lock principal and deposit (native value attached).
    Fund,
    /// Escrow: release funds with the preimage.
    Withdraw {
        /// Preimage.
        secret: Hash,
    },
    /// Escrow: refund the depositor.
    Cancel,
    /// Token: allow `spender` to pull `amount`.
    Approve {
        /// Escrow pulling the tokens.
        spender: Address,
        /// Allowance.
        amount: u128,
    },
    /// Token: transfer to `escrow` and notify it (funds the escrow).
    TransferNotify {
        /// Receiving escrow.
        escrow: Address,
        /// Token amount.
        amount: u128,
    },
}

/// Read-only calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscrowView {
    /// Escrow: current state.
    State,
    /// Factory: escrow created with `salt`.
    EscrowOf {
        /// Salt.
        salt: Hash,
    },
    /// Token: allowance of `owner` to `spender`.
    Allowance {
        /// Token holder.
        owner: Address,
        /// Spender.
        spender: Address,
    },
}

/// Where an escrow lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EscrowLocation {
    /// Escrow address.
    pub address: Address,
    /// Creation block.
    pub created_block: u64,
}

/// Escrow lifecycle events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscrowEvent {
    /// Factory created an escrow.
    Created {
        /// Escrow address.
        escrow: Address,
        /// Creation salt.
        salt: Hash,
    },
    /// Escrow funded.
    Funded {
        /// Escrow address.
        escrow: Address,
    },
    /// Escrow withdrawn; the preimage is now public.
    Withdrawn {
        /// Escrow address.
        escrow: Address,
        /// Revealed preimage.
        secret: Hash,
    },
    /// Escrow refunded.
    Cancelled {
        /// Escrow address.
        escrow: Address,
    },
}

/// Event discriminant used for polling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `Created`.
    Created,
    /// `Funded`.
    Funded,
    /// `Withdrawn`.
    Withdrawn,
    /// `Cancelled`.
    Cancelled,
}

impl EscrowEvent {
    /// Discriminant.
    pub fn kind(&self) -> EventKind {
        match self {
            EscrowEvent::Created { .. } => EventKind::Created,
            EscrowEvent::Funded { .. } => EventKind::Funded,
            EscrowEvent::Withdrawn { .. } => EventKind::Withdrawn,
            EscrowEvent::Cancelled { .. } => EventKind::Cancelled,
        }
    }
}

/// One chain family's escrow encoding.
pub trait EscrowCodec: Send + Sync {
    /// Family this codec serves.
    fn family(&self) -> ChainFamily;

    /// Method name and payload for a call.
    fn encode_call(&self, call: &EscrowCall) -> (String, Vec<u8>);

    /// Parse a call payload.
    fn decode_call(&self, method: &str, payload: &[u8]) -> Result<EscrowCall, CodecError>;

    /// Method name and args for a view.
    fn encode_view(&self, view: &EscrowView) -> (String, Vec<u8>);

    /// Parse view args.
    fn decode_view(&self, method: &str, args: &[u8]) -> Result<EscrowView, CodecError>;

    /// Encode a state view result.
    fn encode_state(&self, state: Option<&EscrowState>) -> Vec<u8>;

    /// Decode a state view result.
    fn decode_state(&self, bytes: &[u8]) -> Result<Option<EscrowState>, CodecError>;

    /// Encode an escrow lookup result.
    fn encode_location(&self, location: Option<&EscrowLocation>) -> Vec<u8>;

    /// Decode an escrow lookup result.
    fn decode_location(&self, bytes: &[u8]) -> Result<Option<EscrowLocation>, CodecError>;

    /// Encode an amount view result.
    fn encode_amount(&self, amount: u128) -> Vec<u8>;

    /// Decode an amount view result.
    fn decode_amount(&self, bytes: &[u8]) -> Result<u128, CodecError>;

    /// Event name as indexed by the chain.
    fn event_name(&self, kind: EventKind) -> &'static str;

    /// Encode event data.
    fn encode_event(&self, event: &EscrowEvent) -> Vec<u8>;

    /// Decode event data.
    fn decode_event(&self, name: &str, data: &[u8]) -> Result<EscrowEvent, CodecError>;

    /// Address a factory assigns to the escrow created with `salt`.
    fn escrow_address(&self, factory: &Address, salt: &Hash) -> Address;
}

/// Codec for `family`.
pub fn codec_for(family: ChainFamily) -> Arc<dyn EscrowCodec> {
    match family {
        ChainFamily::Evm => Arc::new(AbiCodec),
        ChainFamily::NonEvm => Arc::new(TvmCodec),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn create_args(family: ChainFamily) -> CreateEscrowArgs {
        let (maker, taker, token) = match family {
            ChainFamily::Evm => (
                Address::new(format!("0x{}", "11".repeat(20))),
                Address::new(format!("0x{}", "22".repeat(20))),
                TokenRef::Contract(Address::new(format!("0x{}", "77".repeat(20)))),
            ),
            ChainFamily::NonEvm => (
                Address::new(format!("0:{}", "11".repeat(32))),
                Address::new(format!("0:{}", "22".repeat(32))),
                TokenRef::Native,
            ),
        };
        CreateEscrowArgs {
            salt: [0x5a; 32],
            maker,
            taker,
            token,
            amount: 1_000,
            safety_deposit: 25,
            hashlock: [0xab; 32],
            timelocks: LegTimelocks {
                withdrawal: 100,
                public_withdrawal: 200,
                cancellation: 300,
                public_cancellation: Some(400),
            },
            is_source: true,
        }
    }

    pub fn state() -> EscrowState {
        EscrowState {
            amount: 1_000,
            safety_deposit: 25,
            hashlock: [0xab; 32],
            timelocks: LegTimelocks {
                withdrawal: 100,
                public_withdrawal: 200,
                cancellation: 300,
                public_cancellation: None,
            },
            funded: true,
            funded_block: Some(0),
            completed: false,
            cancelled: false,
        }
    }
}
