//! EVM ABI encoding: keccak selectors and 32-byte big-endian words.
//! The zero address stands for the native coin.

use sha3::{Digest, Keccak256};

use super::{
    CodecError, CreateEscrowArgs, EscrowCall, EscrowCodec, EscrowEvent, EscrowLocation,
    EscrowView, EventKind,
};
use crate::domain::{Address, ChainFamily, EscrowState, Hash, LegTimelocks, TokenRef};

const SIG_CREATE: &str =
    "createEscrow(bytes32,address,address,address,uint256,uint256,bytes32,uint64,uint64,uint64,uint64,bool)";
const SIG_FUND: &str = "fund()";
const SIG_WITHDRAW: &str = "withdraw(bytes32)";
const SIG_CANCEL: &str = "cancel()";
const SIG_APPROVE: &str = "approve(address,uint256)";
const SIG_TRANSFER_AND_CALL: &str = "transferAndCall(address,uint256)";
const SIG_STATE: &str = "escrowState()";
const SIG_ESCROW_OF: &str = "escrowOf(bytes32)";
const SIG_ALLOWANCE: &str = "allowance(address,address)";

/// EVM escrow codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct AbiCodec;

/// First four bytes of keccak256 of the signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

fn method_name(signature: &str) -> &str {
    signature.split('(').next().unwrap_or(signature)
}

struct WordWriter(Vec<u8>);

impl WordWriter {
    fn call(signature: &str) -> Self {
        Self(selector(signature).to_vec())
    }

    fn data() -> Self {
        Self(Vec::new())
    }

    fn uint(mut self, v: u128) -> Self {
        self.0.extend_from_slice(&[0u8; 16]);
        self.0.extend_from_slice(&v.to_be_bytes());
        self
    }

    fn bool(self, v: bool) -> Self {
        self.uint(v as u128)
    }

    fn bytes32(mut self, v: &Hash) -> Self {
        self.0.extend_from_slice(v);
        self
    }

    fn address(mut self, a: &Address) -> Self {
        let mut word = [0u8; 32];
        if let Some(raw) = a.as_str().strip_prefix("0x") {
            if let Ok(bytes) = hex::decode(raw) {
                if bytes.len() == 20 {
                    word[12..].copy_from_slice(&bytes);
                }
            }
        }
        self.0.extend_from_slice(&word);
        self
    }

    fn token(self, t: &TokenRef) -> Self {
        match t {
            TokenRef::Native => self.address(&Address::zero_evm()),
            TokenRef::Contract(a) => self.address(a),
        }
    }

    fn finish(self) -> Vec<u8> {
        self.0
    }
}

struct WordReader<'a> {
    data: &'a [u8],
}

impl<'a> WordReader<'a> {
    fn call(signature: &str, payload: &'a [u8]) -> Result<Self, CodecError> {
        if payload.len() < 4 || payload[..4] != selector(signature) {
            return Err(CodecError::new(format!("selector mismatch for {}", signature)));
        }
        Ok(Self { data: &payload[4..] })
    }

    fn data(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn word(&mut self) -> Result<[u8; 32], CodecError> {
        if self.data.len() < 32 {
            return Err(CodecError::new("truncated ABI word"));
        }
        let mut w = [0u8; 32];
        w.copy_from_slice(&self.data[..32]);
        self.data = &self.data[32..];
        Ok(w)
    }

    fn uint(&mut self) -> Result<u128, CodecError> {
        let w = self.word()?;
        if w[..16].iter().any(|b| *b != 0) {
            return Err(CodecError::new("uint256 overflows u128"));
        }
        let mut b = [0u8; 16];
        b.copy_from_slice(&w[16..]);
        Ok(u128::from_be_bytes(b))
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        u64::try_from(self.uint()?).map_err(|_| CodecError::new("value overflows u64"))
    }

    fn bool(&mut self) -> Result<bool, CodecError> {
        match self.uint()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::new(format!("invalid bool word {}", other))),
        }
    }

    fn bytes32(&mut self) -> Result<Hash, CodecError> {
        self.word()
    }

    fn address(&mut self) -> Result<Address, CodecError> {
        let w = self.word()?;
        if w[..12].iter().any(|b| *b != 0) {
            return Err(CodecError::new("dirty address word"));
        }
        Ok(Address::new(format!("0x{}", hex::encode(&w[12..]))))
    }

    fn token(&mut self) -> Result<TokenRef, CodecError> {
        let a = self.address()?;
        if a == Address::zero_evm() {
            Ok(TokenRef::Native)
        } else {
            Ok(TokenRef::Contract(a))
        }
    }

    fn end(&self) -> Result<(), CodecError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(CodecError::new("trailing bytes after ABI words"))
        }
    }
}

impl EscrowCodec for AbiCodec {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    fn encode_call(&self, call: &EscrowCall) -> (String, Vec<u8>) {
        let (sig, payload) = match call {
            EscrowCall::CreateEscrow(a) => (
                SIG_CREATE,
                WordWriter::call(SIG_CREATE)
                    .bytes32(&a.salt)
                    .address(&a.maker)
                    .address(&a.taker)
                    .token(&a.token)
                    .uint(a.amount)
                    .uint(a.safety_deposit)
                    .bytes32(&a.hashlock)
                    .uint(a.timelocks.withdrawal as u128)
                    .uint(a.timelocks.public_withdrawal as u128)
                    .uint(a.timelocks.cancellation as u128)
                    .uint(a.timelocks.public_cancellation.unwrap_or(0) as u128)
                    .bool(a.is_source)
                    .finish(),
            ),
            EscrowCall::Fund => (SIG_FUND, WordWriter::call(SIG_FUND).finish()),
            EscrowCall::Withdraw { secret } => (
                SIG_WITHDRAW,
                WordWriter::call(SIG_WITHDRAW).bytes32(secret).finish(),
            ),
            EscrowCall::Cancel => (SIG_CANCEL, WordWriter::call(SIG_CANCEL).finish()),
            EscrowCall::Approve { spender, amount } => (
                SIG_APPROVE,
                WordWriter::call(SIG_APPROVE)
                    .address(spender)
                    .uint(*amount)
                    .finish(),
            ),
            EscrowCall::TransferNotify { escrow, amount } => (
                SIG_TRANSFER_AND_CALL,
                WordWriter::call(SIG_TRANSFER_AND_CALL)
                    .address(escrow)
                    .uint(*amount)
                    .finish(),
            ),
        };
        (method_name(sig).to_string(), payload)
    }

    fn decode_call(&self, method: &str, payload: &[u8]) -> Result<EscrowCall, CodecError> {
        let call = match method {
            "createEscrow" => {
                let mut r = WordReader::call(SIG_CREATE, payload)?;
                let salt = r.bytes32()?;
                let maker = r.address()?;
                let taker = r.address()?;
                let token = r.token()?;
                let amount = r.uint()?;
                let safety_deposit = r.uint()?;
                let hashlock = r.bytes32()?;
                let withdrawal = r.u64()?;
                let public_withdrawal = r.u64()?;
                let cancellation = r.u64()?;
                let public_cancellation = match r.u64()? {
                    0 => None,
                    t => Some(t),
                };
                let is_source = r.bool()?;
                r.end()?;
                EscrowCall::CreateEscrow(CreateEscrowArgs {
                    salt,
                    maker,
                    taker,
                    token,
                    amount,
                    safety_deposit,
                    hashlock,
                    timelocks: LegTimelocks {
                        withdrawal,
                        public_withdrawal,
                        cancellation,
                        public_cancellation,
                    },
                    is_source,
                })
            }
            "fund" => {
                WordReader::call(SIG_FUND, payload)?.end()?;
                EscrowCall::Fund
            }
            "withdraw" => {
                let mut r = WordReader::call(SIG_WITHDRAW, payload)?;
                let secret = r.bytes32()?;
                r.end()?;
                EscrowCall::Withdraw { secret }
            }
            "cancel" => {
                WordReader::call(SIG_CANCEL, payload)?.end()?;
                EscrowCall::Cancel
            }
            "approve" => {
                let mut r = WordReader::call(SIG_APPROVE, payload)?;
                let spender = r.address()?;
                let amount = r.uint()?;
                r.end()?;
                EscrowCall::Approve { spender, amount }
            }
            "transferAndCall" => {
                let mut r = WordReader::call(SIG_TRANSFER_AND_CALL, payload)?;
                let escrow = r.address()?;
                let amount = r.uint()?;
                r.end()?;
                EscrowCall::TransferNotify { escrow, amount }
            }
            other => return Err(CodecError::new(format!("unknown method {}", other))),
        };
        Ok(call)
    }

    fn encode_view(&self, view: &EscrowView) -> (String, Vec<u8>) {
        let (sig, args) = match view {
            EscrowView::State => (SIG_STATE, WordWriter::call(SIG_STATE).finish()),
            EscrowView::EscrowOf { salt } => (
                SIG_ESCROW_OF,
                WordWriter::call(SIG_ESCROW_OF).bytes32(salt).finish(),
            ),
            EscrowView::Allowance { owner, spender } => (
                SIG_ALLOWANCE,
                WordWriter::call(SIG_ALLOWANCE)
                    .address(owner)
                    .address(spender)
                    .finish(),
            ),
        };
        (method_name(sig).to_string(), args)
    }

    fn decode_view(&self, method: &str, args: &[u8]) -> Result<EscrowView, CodecError> {
        match method {
            "escrowState" => {
                WordReader::call(SIG_STATE, args)?.end()?;
                Ok(EscrowView::State)
            }
            "escrowOf" => {
                let mut r = WordReader::call(SIG_ESCROW_OF, args)?;
                let salt = r.bytes32()?;
                r.end()?;
                Ok(EscrowView::EscrowOf { salt })
            }
            "allowance" => {
                let mut r = WordReader::call(SIG_ALLOWANCE, args)?;
                let owner = r.address()?;
                let spender = r.address()?;
                r.end()?;
                Ok(EscrowView::Allowance { owner, spender })
            }
            other => Err(CodecError::new(format!("unknown view {}", other))),
        }
    }

    fn encode_state(&self, state: Option<&EscrowState>) -> Vec<u8> {
        let Some(s) = state else {
            return WordWriter::data().bool(false).finish();
        };
        WordWriter::data()
            .bool(true)
            .uint(s.amount)
            .uint(s.safety_deposit)
            .bytes32(&s.hashlock)
            .uint(s.timelocks.withdrawal as u128)
            .uint(s.timelocks.public_withdrawal as u128)
            .uint(s.timelocks.cancellation as u128)
            .uint(s.timelocks.public_cancellation.unwrap_or(0) as u128)
            .bool(s.funded)
            .bool(s.funded_block.is_some())
            .uint(s.funded_block.unwrap_or(0) as u128)
            .bool(s.completed)
            .bool(s.cancelled)
            .finish()
    }

    fn decode_state(&self, bytes: &[u8]) -> Result<Option<EscrowState>, CodecError> {
        let mut r = WordReader::data(bytes);
        if !r.bool()? {
            r.end()?;
            return Ok(None);
        }
        let amount = r.uint()?;
        let safety_deposit = r.uint()?;
        let hashlock = r.bytes32()?;
        let withdrawal = r.u64()?;
        let public_withdrawal = r.u64()?;
        let cancellation = r.u64()?;
        let public_cancellation = match r.u64()? {
            0 => None,
            t => Some(t),
        };
        let funded = r.bool()?;
        let has_funded_block = r.bool()?;
        let funded_block = r.u64()?;
        let completed = r.bool()?;
        let cancelled = r.bool()?;
        r.end()?;
        Ok(Some(EscrowState {
            amount,
            safety_deposit,
            hashlock,
            timelocks: LegTimelocks {
                withdrawal,
                public_withdrawal,
                cancellation,
                public_cancellation,
            },
            funded,
            funded_block: has_funded_block.then_some(funded_block),
            completed,
            cancelled,
        }))
    }

    fn encode_location(&self, location: Option<&EscrowLocation>) -> Vec<u8> {
        match location {
            Some(l) => WordWriter::data()
                .bool(true)
                .address(&l.address)
                .uint(l.created_block as u128)
                .finish(),
            None => WordWriter::data()
                .bool(false)
                .address(&Address::zero_evm())
                .uint(0)
                .finish(),
        }
    }

    fn decode_location(&self, bytes: &[u8]) -> Result<Option<EscrowLocation>, CodecError> {
        let mut r = WordReader::data(bytes);
        let exists = r.bool()?;
        let address = r.address()?;
        let created_block = r.u64()?;
        r.end()?;
        Ok(exists.then_some(EscrowLocation {
            address,
            created_block,
        }))
    }

    fn encode_amount(&self, amount: u128) -> Vec<u8> {
        WordWriter::data().uint(amount).finish()
    }

    fn decode_amount(&self, bytes: &[u8]) -> Result<u128, CodecError> {
        let mut r = WordReader::data(bytes);
        let v = r.uint()?;
        r.end()?;
        Ok(v)
    }

    fn event_name(&self, kind: EventKind) -> &'static str {
        match kind {
            EventKind::Created => "EscrowCreated",
            EventKind::Funded => "EscrowFunded",
            EventKind::Withdrawn => "EscrowWithdrawal",
            EventKind::Cancelled => "EscrowCancelled",
        }
    }

    fn encode_event(&self, event: &EscrowEvent) -> Vec<u8> {
        match event {
            EscrowEvent::Created { escrow, salt } => {
                WordWriter::data().address(escrow).bytes32(salt).finish()
            }
            EscrowEvent::Funded { escrow } | EscrowEvent::Cancelled { escrow } => {
                WordWriter::data().address(escrow).finish()
            }
            EscrowEvent::Withdrawn { escrow, secret } => {
                WordWriter::data().address(escrow).bytes32(secret).finish()
            }
        }
    }

    fn decode_event(&self, name: &str, data: &[u8]) -> Result<EscrowEvent, CodecError> {
        let mut r = WordReader::data(data);
        let escrow = r.address()?;
        let event = match name {
            "EscrowCreated" => EscrowEvent::Created {
                escrow,
                salt: r.bytes32()?,
            },
            "EscrowFunded" => EscrowEvent::Funded { escrow },
            "EscrowWithdrawal" => EscrowEvent::Withdrawn {
                escrow,
                secret: r.bytes32()?,
            },
            "EscrowCancelled" => EscrowEvent::Cancelled { escrow },
            other => return Err(CodecError::new(format!("unknown event {}", other))),
        };
        r.end()?;
        Ok(event)
    }

    fn escrow_address(&self, factory: &Address, salt: &Hash) -> Address {
        let factory_bytes = factory
            .as_str()
            .strip_prefix("0x")
            .and_then(|h| hex::decode(h).ok())
            .unwrap_or_default();
        let mut hasher = Keccak256::new();
        hasher.update([0xffu8]);
        hasher.update(&factory_bytes);
        hasher.update(salt);
        hasher.update(Keccak256::digest(b"HtlcEscrow"));
        let digest: Hash = hasher.finalize().into();
        ChainFamily::Evm.address_from_bytes(&digest)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures;
    use super::*;

    #[test]
    fn test_known_selector() {
        // ERC-20 approve(address,uint256)
        assert_eq!(selector(SIG_APPROVE), [0x09, 0x5e, 0xa7, 0xb3]);
    }

    #[test]
    fn test_create_payload_layout() {
        let args = fixtures::create_args(ChainFamily::Evm);
        let (method, payload) = AbiCodec.encode_call(&EscrowCall::CreateEscrow(args.clone()));
        assert_eq!(method, "createEscrow");
        assert_eq!(payload.len(), 4 + 12 * 32);
        assert_eq!(
            AbiCodec.decode_call(&method, &payload).unwrap(),
            EscrowCall::CreateEscrow(args)
        );
    }

    #[test]
    fn test_selector_mismatch_rejected() {
        let (_, payload) = AbiCodec.encode_call(&EscrowCall::Cancel);
        assert!(AbiCodec.decode_call("fund", &payload).is_err());
    }

    #[test]
    fn test_native_token_is_zero_address() {
        let mut args = fixtures::create_args(ChainFamily::Evm);
        args.token = TokenRef::Native;
        let (_, payload) = AbiCodec.encode_call(&EscrowCall::CreateEscrow(args));
        let token_word = &payload[4 + 3 * 32..4 + 4 * 32];
        assert!(token_word.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_state_absent_and_present() {
        assert_eq!(AbiCodec.decode_state(&AbiCodec.encode_state(None)).unwrap(), None);
        let state = fixtures::state();
        assert_eq!(
            AbiCodec
                .decode_state(&AbiCodec.encode_state(Some(&state)))
                .unwrap(),
            Some(state)
        );
    }

    #[test]
    fn test_truncated_state_rejected() {
        let bytes = AbiCodec.encode_state(Some(&fixtures::state()));
        assert!(AbiCodec.decode_state(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn test_escrow_address_deterministic() {
        let factory = Address::new(format!("0x{}", "fa".repeat(20)));
        let a = AbiCodec.escrow_address(&factory, &[1u8; 32]);
        assert_eq!(a, AbiCodec.escrow_address(&factory, &[1u8; 32]));
        assert_ne!(a, AbiCodec.escrow_address(&factory, &[2u8; 32]));
        assert!(ChainFamily::Evm.is_valid_address(a.as_str()));
    }
}
