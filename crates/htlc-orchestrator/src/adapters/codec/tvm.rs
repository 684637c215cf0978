//! TVM message encoding: a big-endian 32-bit op code followed by a bincode
//! body. Addresses travel as `workchain:hex` strings.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{
    CodecError, CreateEscrowArgs, EscrowCall, EscrowCodec, EscrowEvent, EscrowLocation,
    EscrowView, EventKind,
};
use crate::domain::{Address, ChainFamily, EscrowState, Hash, LegTimelocks, TokenRef};

/// Op codes of escrow and jetton messages.
pub mod op {
    /// Factory `create_escrow`.
    pub const CREATE_ESCROW: u32 = 0x1a2b_0001;
    /// Escrow `fund`.
    pub const FUND: u32 = 0x1a2b_0002;
    /// Escrow `withdraw`.
    pub const WITHDRAW: u32 = 0x1a2b_0003;
    /// Escrow `cancel`.
    pub const CANCEL: u32 = 0x1a2b_0004;
    /// Jetton `approve`.
    pub const APPROVE: u32 = 0x0f8a_7ea1;
    /// Jetton `transfer` with forward notification.
    pub const TRANSFER_NOTIFY: u32 = 0x0f8a_7ea5;
}

/// TVM escrow codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct TvmCodec;

#[derive(Serialize, Deserialize)]
struct CreateBody {
    salt: Hash,
    maker: String,
    taker: String,
    token: Option<String>,
    amount: u128,
    safety_deposit: u128,
    hashlock: Hash,
    timelocks: [u64; 3],
    public_cancellation: Option<u64>,
    is_source: bool,
}

#[derive(Serialize, Deserialize)]
struct StateBody {
    amount: u128,
    safety_deposit: u128,
    hashlock: Hash,
    timelocks: [u64; 3],
    public_cancellation: Option<u64>,
    funded: bool,
    funded_block: Option<u64>,
    completed: bool,
    cancelled: bool,
}

#[derive(Serialize, Deserialize)]
struct LocationBody {
    address: String,
    created_block: u64,
}

#[derive(Serialize, Deserialize)]
struct EventBody {
    escrow: String,
    salt: Option<Hash>,
    secret: Option<Hash>,
}

fn token_to_wire(token: &TokenRef) -> Option<String> {
    match token {
        TokenRef::Native => None,
        TokenRef::Contract(a) => Some(a.to_string()),
    }
}

fn token_from_wire(token: Option<String>) -> TokenRef {
    token
        .map(|a| TokenRef::Contract(Address::new(a)))
        .unwrap_or_default()
}

fn body<T: Serialize>(value: &T) -> Vec<u8> {
    // Plain structs of primitives and strings always serialize.
    bincode::serialize(value).unwrap_or_default()
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::new(format!("bincode: {}", e)))
}

fn message(op: u32, payload: Vec<u8>) -> Vec<u8> {
    let mut out = op.to_be_bytes().to_vec();
    out.extend(payload);
    out
}

fn split_op(payload: &[u8], expected: u32) -> Result<&[u8], CodecError> {
    if payload.len() < 4 {
        return Err(CodecError::new("message shorter than op code"));
    }
    let op = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    if op != expected {
        return Err(CodecError::new(format!(
            "op code mismatch: expected {:#010x}, got {:#010x}",
            expected, op
        )));
    }
    Ok(&payload[4..])
}

impl EscrowCodec for TvmCodec {
    fn family(&self) -> ChainFamily {
        ChainFamily::NonEvm
    }

    fn encode_call(&self, call: &EscrowCall) -> (String, Vec<u8>) {
        match call {
            EscrowCall::CreateEscrow(a) => {
                let wire = CreateBody {
                    salt: a.salt,
                    maker: a.maker.to_string(),
                    taker: a.taker.to_string(),
                    token: token_to_wire(&a.token),
                    amount: a.amount,
                    safety_deposit: a.safety_deposit,
                    hashlock: a.hashlock,
                    timelocks: [
                        a.timelocks.withdrawal,
                        a.timelocks.public_withdrawal,
                        a.timelocks.cancellation,
                    ],
                    public_cancellation: a.timelocks.public_cancellation,
                    is_source: a.is_source,
                };
                (
                    "create_escrow".into(),
                    message(op::CREATE_ESCROW, body(&wire)),
                )
            }
            EscrowCall::Fund => ("fund".into(), message(op::FUND, Vec::new())),
            EscrowCall::Withdraw { secret } => {
                ("withdraw".into(), message(op::WITHDRAW, body(secret)))
            }
            EscrowCall::Cancel => ("cancel".into(), message(op::CANCEL, Vec::new())),
            EscrowCall::Approve { spender, amount } => (
                "approve".into(),
                message(op::APPROVE, body(&(spender.to_string(), *amount))),
            ),
            EscrowCall::TransferNotify { escrow, amount } => (
                "transfer_notify".into(),
                message(op::TRANSFER_NOTIFY, body(&(escrow.to_string(), *amount))),
            ),
        }
    }

    fn decode_call(&self, method: &str, payload: &[u8]) -> Result<EscrowCall, CodecError> {
        match method {
            "create_escrow" => {
                let w: CreateBody = parse(split_op(payload, op::CREATE_ESCROW)?)?;
                Ok(EscrowCall::CreateEscrow(CreateEscrowArgs {
                    salt: w.salt,
                    maker: Address::new(w.maker),
                    taker: Address::new(w.taker),
                    token: token_from_wire(w.token),
                    amount: w.amount,
                    safety_deposit: w.safety_deposit,
                    hashlock: w.hashlock,
                    timelocks: LegTimelocks {
                        withdrawal: w.timelocks[0],
                        public_withdrawal: w.timelocks[1],
                        cancellation: w.timelocks[2],
                        public_cancellation: w.public_cancellation,
                    },
                    is_source: w.is_source,
                }))
            }
            "fund" => {
                split_op(payload, op::FUND)?;
                Ok(EscrowCall::Fund)
            }
            "withdraw" => Ok(EscrowCall::Withdraw {
                secret: parse(split_op(payload, op::WITHDRAW)?)?,
            }),
            "cancel" => {
                split_op(payload, op::CANCEL)?;
                Ok(EscrowCall::Cancel)
            }
            "approve" => {
                let (spender, amount): (String, u128) = parse(split_op(payload, op::APPROVE)?)?;
                Ok(EscrowCall::Approve {
                    spender: Address::new(spender),
                    amount,
                })
            }
            "transfer_notify" => {
                let (escrow, amount): (String, u128) =
                    parse(split_op(payload, op::TRANSFER_NOTIFY)?)?;
                Ok(EscrowCall::TransferNotify {
                    escrow: Address::new(escrow),
                    amount,
                })
            }
            other => Err(CodecError::new(format!("unknown method {}", other))),
        }
    }

    fn encode_view(&self, view: &EscrowView) -> (String, Vec<u8>) {
        match view {
            EscrowView::State => ("get_escrow_data".into(), Vec::new()),
            EscrowView::EscrowOf { salt } => ("get_escrow_address".into(), body(salt)),
            EscrowView::Allowance { owner, spender } => (
                "get_allowance".into(),
                body(&(owner.to_string(), spender.to_string())),
            ),
        }
    }

    fn decode_view(&self, method: &str, args: &[u8]) -> Result<EscrowView, CodecError> {
        match method {
            "get_escrow_data" => Ok(EscrowView::State),
            "get_escrow_address" => Ok(EscrowView::EscrowOf { salt: parse(args)? }),
            "get_allowance" => {
                let (owner, spender): (String, String) = parse(args)?;
                Ok(EscrowView::Allowance {
                    owner: Address::new(owner),
                    spender: Address::new(spender),
                })
            }
            other => Err(CodecError::new(format!("unknown get-method {}", other))),
        }
    }

    fn encode_state(&self, state: Option<&EscrowState>) -> Vec<u8> {
        let wire = state.map(|s| StateBody {
            amount: s.amount,
            safety_deposit: s.safety_deposit,
            hashlock: s.hashlock,
            timelocks: [
                s.timelocks.withdrawal,
                s.timelocks.public_withdrawal,
                s.timelocks.cancellation,
            ],
            public_cancellation: s.timelocks.public_cancellation,
            funded: s.funded,
            funded_block: s.funded_block,
            completed: s.completed,
            cancelled: s.cancelled,
        });
        body(&wire)
    }

    fn decode_state(&self, bytes: &[u8]) -> Result<Option<EscrowState>, CodecError> {
        let wire: Option<StateBody> = parse(bytes)?;
        Ok(wire.map(|w| EscrowState {
            amount: w.amount,
            safety_deposit: w.safety_deposit,
            hashlock: w.hashlock,
            timelocks: LegTimelocks {
                withdrawal: w.timelocks[0],
                public_withdrawal: w.timelocks[1],
                cancellation: w.timelocks[2],
                public_cancellation: w.public_cancellation,
            },
            funded: w.funded,
            funded_block: w.funded_block,
            completed: w.completed,
            cancelled: w.cancelled,
        }))
    }

    fn encode_location(&self, location: Option<&EscrowLocation>) -> Vec<u8> {
        body(&location.map(|l| LocationBody {
            address: l.address.to_string(),
            created_block: l.created_block,
        }))
    }

    fn decode_location(&self, bytes: &[u8]) -> Result<Option<EscrowLocation>, CodecError> {
        let wire: Option<LocationBody> = parse(bytes)?;
        Ok(wire.map(|w| EscrowLocation {
            address: Address::new(w.address),
            created_block: w.created_block,
        }))
    }

    fn encode_amount(&self, amount: u128) -> Vec<u8> {
        body(&amount)
    }

    fn decode_amount(&self, bytes: &[u8]) -> Result<u128, CodecError> {
        parse(bytes)
    }

    fn event_name(&self, kind: EventKind) -> &'static str {
        match kind {
            EventKind::Created => "escrow_created",
            EventKind::Funded => "escrow_funded",
            EventKind::Withdrawn => "escrow_withdrawn",
            EventKind::Cancelled => "escrow_cancelled",
        }
    }

    fn encode_event(&self, event: &EscrowEvent) -> Vec<u8> {
        let wire = match event {
            EscrowEvent::Created { escrow, salt } => EventBody {
                escrow: escrow.to_string(),
                salt: Some(*salt),
                secret: None,
            },
            EscrowEvent::Funded { escrow } | EscrowEvent::Cancelled { escrow } => EventBody {
                escrow: escrow.to_string(),
                salt: None,
                secret: None,
            },
            EscrowEvent::Withdrawn { escrow, secret } => EventBody {
                escrow: escrow.to_string(),
                salt: None,
                secret: Some(*secret),
            },
        };
        body(&wire)
    }

    fn decode_event(&self, name: &str, data: &[u8]) -> Result<EscrowEvent, CodecError> {
        let w: EventBody = parse(data)?;
        let escrow = Address::new(w.escrow);
        match name {
            "escrow_created" => w
                .salt
                .map(|salt| EscrowEvent::Created { escrow, salt })
                .ok_or_else(|| CodecError::new("escrow_created without salt")),
            "escrow_funded" => Ok(EscrowEvent::Funded { escrow }),
            "escrow_withdrawn" => w
                .secret
                .map(|secret| EscrowEvent::Withdrawn { escrow, secret })
                .ok_or_else(|| CodecError::new("escrow_withdrawn without secret")),
            "escrow_cancelled" => Ok(EscrowEvent::Cancelled { escrow }),
            other => Err(CodecError::new(format!("unknown event {}", other))),
        }
    }

    fn escrow_address(&self, factory: &Address, salt: &Hash) -> Address {
        let mut hasher = Sha256::new();
        hasher.update(factory.as_str().as_bytes());
        hasher.update(salt);
        let digest: Hash = hasher.finalize().into();
        let workchain = factory.as_str().split_once(':').map(|(wc, _)| wc).unwrap_or("0");
        Address::new(format!("{}:{}", workchain, hex::encode(digest)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;

    #[test]
    fn test_create_message_carries_op_code() {
        let args = fixtures::create_args(ChainFamily::NonEvm);
        let (method, payload) = TvmCodec.encode_call(&EscrowCall::CreateEscrow(args.clone()));
        assert_eq!(method, "create_escrow");
        assert_eq!(&payload[..4], &op::CREATE_ESCROW.to_be_bytes());
        assert_eq!(
            TvmCodec.decode_call(&method, &payload).unwrap(),
            EscrowCall::CreateEscrow(args)
        );
    }

    #[test]
    fn test_jetton_token_survives_wire() {
        let mut args = fixtures::create_args(ChainFamily::NonEvm);
        args.token = TokenRef::Contract(Address::new(format!("0:{}", "77".repeat(32))));
        let (method, payload) = TvmCodec.encode_call(&EscrowCall::CreateEscrow(args.clone()));
        match TvmCodec.decode_call(&method, &payload).unwrap() {
            EscrowCall::CreateEscrow(decoded) => assert_eq!(decoded.token, args.token),
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_wrong_op_code_rejected() {
        let (_, payload) = TvmCodec.encode_call(&EscrowCall::Fund);
        assert!(TvmCodec.decode_call("cancel", &payload).is_err());
        assert!(TvmCodec.decode_call("fund", &[0, 1]).is_err());
    }

    #[test]
    fn test_state_and_location() {
        let state = fixtures::state();
        assert_eq!(
            TvmCodec
                .decode_state(&TvmCodec.encode_state(Some(&state)))
                .unwrap(),
            Some(state)
        );
        assert_eq!(TvmCodec.decode_location(&TvmCodec.encode_location(None)).unwrap(), None);
    }

    #[test]
    fn test_withdrawn_event_requires_secret() {
        let created = TvmCodec.encode_event(&EscrowEvent::Created {
            escrow: Address::new(format!("0:{}", "01".repeat(32))),
            salt: [1; 32],
        });
        assert!(TvmCodec.decode_event("escrow_withdrawn", &created).is_err());
    }

    #[test]
    fn test_escrow_address_keeps_workchain() {
        let factory = Address::new(format!("-1:{}", "fa".repeat(32)));
        let addr = TvmCodec.escrow_address(&factory, &[3; 32]);
        assert!(addr.as_str().starts_with("-1:"));
        assert!(ChainFamily::NonEvm.is_valid_address(addr.as_str()));
    }
}
