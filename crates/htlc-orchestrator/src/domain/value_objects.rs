//! # Domain Value Objects
//!
//! Immutable value types for swap orchestration: chain families, legs,
//! identifiers, addresses and escrow references.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use std::fmt;
use uuid::Uuid;

use super::errors::Hash;

/// Serde helper encoding 32-byte hashes as hex strings.
pub mod hex32 {
    use super::Hash;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as lowercase hex.
    pub fn serialize<S: Serializer>(bytes: &Hash, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    /// Deserialize from hex, with or without `0x`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
        let s = String::deserialize(deserializer)?;
        super::parse_hash(&s).ok_or_else(|| serde::de::Error::custom("expected 32-byte hex"))
    }
}

/// Parse a 32-byte hex string, with or without `0x`.
pub fn parse_hash(s: &str) -> Option<Hash> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw).ok()?;
    bytes.try_into().ok()
}

/// Chain family an escrow lives on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainFamily {
    /// Account-model EVM chain (ABI encoding, 20-byte addresses).
    Evm,
    /// Message-based TVM chain (`workchain:hex` addresses).
    NonEvm,
}

impl ChainFamily {
    /// Stable name for logs and config.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainFamily::Evm => "evm",
            ChainFamily::NonEvm => "non_evm",
        }
    }

    /// Check the family's address encoding.
    pub fn is_valid_address(&self, address: &str) -> bool {
        match self {
            ChainFamily::Evm => address
                .strip_prefix("0x")
                .map(|h| h.len() == 40 && h.chars().all(|c| c.is_ascii_hexdigit()))
                .unwrap_or(false),
            ChainFamily::NonEvm => match address.split_once(':') {
                Some((wc, h)) => {
                    wc.parse::<i32>().is_ok()
                        && h.len() == 64
                        && h.chars().all(|c| c.is_ascii_hexdigit())
                }
                None => false,
            },
        }
    }

    /// Address derived from 32 bytes of key material, in this family's encoding.
    pub fn address_from_bytes(&self, bytes: &Hash) -> Address {
        match self {
            ChainFamily::Evm => Address::new(format!("0x{}", hex::encode(&bytes[12..]))),
            ChainFamily::NonEvm => Address::new(format!("0:{}", hex::encode(bytes))),
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hash primitive an escrow contract uses to check a preimage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256.
    Sha256,
    /// Keccak-256 (pre-standard SHA-3 padding).
    Keccak256,
}

impl HashAlgorithm {
    /// Digest arbitrary bytes.
    pub fn digest(&self, data: &[u8]) -> Hash {
        match self {
            HashAlgorithm::Sha256 => Sha256::digest(data).into(),
            HashAlgorithm::Keccak256 => Keccak256::digest(data).into(),
        }
    }
}

/// Which leg of a swap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    /// Locked first; maker deposits, taker withdraws.
    Source,
    /// Locked second; taker deposits, maker withdraws.
    Destination,
}

impl Leg {
    /// Stable name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Leg::Source => "source",
            Leg::Destination => "destination",
        }
    }

    /// The opposite leg.
    pub fn other(&self) -> Leg {
        match self {
            Leg::Source => Leg::Destination,
            Leg::Destination => Leg::Source,
        }
    }

    /// Byte tag used in salts and encodings.
    pub fn tag(&self) -> u8 {
        match self {
            Leg::Source => 0,
            Leg::Destination => 1,
        }
    }
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which chain family funds first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwapDirection {
    /// Source on the EVM chain, destination on the TVM chain.
    EvmToNonEvm,
    /// Source on the TVM chain, destination on the EVM chain.
    NonEvmToEvm,
}

impl SwapDirection {
    /// Chain family hosting `leg`.
    pub fn family(&self, leg: Leg) -> ChainFamily {
        match (self, leg) {
            (SwapDirection::EvmToNonEvm, Leg::Source) => ChainFamily::Evm,
            (SwapDirection::EvmToNonEvm, Leg::Destination) => ChainFamily::NonEvm,
            (SwapDirection::NonEvmToEvm, Leg::Source) => ChainFamily::NonEvm,
            (SwapDirection::NonEvmToEvm, Leg::Destination) => ChainFamily::Evm,
        }
    }

    /// Direction from a (source, destination) family pair.
    pub fn from_families(source: ChainFamily, destination: ChainFamily) -> Option<Self> {
        match (source, destination) {
            (ChainFamily::Evm, ChainFamily::NonEvm) => Some(SwapDirection::EvmToNonEvm),
            (ChainFamily::NonEvm, ChainFamily::Evm) => Some(SwapDirection::NonEvmToEvm),
            _ => None,
        }
    }
}

impl fmt::Display for SwapDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}",
            self.family(Leg::Source),
            self.family(Leg::Destination)
        )
    }
}

/// Opaque swap identifier, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwapId(Uuid);

impl SwapId {
    /// Fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Raw bytes for hashing.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// Parse the hyphenated form.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for SwapId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Digest binding the swap parameters, for correlation and dedup.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderHash(#[serde(with = "hex32")] pub Hash);

impl fmt::Display for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for OrderHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderHash({})", self)
    }
}

/// Chain-specific address string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Wrap an address string (case-normalised).
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().to_ascii_lowercase())
    }

    /// The EVM zero address, used for the native token.
    pub fn zero_evm() -> Self {
        Self(format!("0x{}", "0".repeat(40)))
    }

    /// Raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.0
    }
}

/// Transaction hash as reported by the chain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Asset locked in an escrow.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "address")]
pub enum TokenRef {
    /// Chain's native coin.
    #[default]
    Native,
    /// Token contract (ERC-20 / jetton master).
    Contract(Address),
}

impl TokenRef {
    /// Whether the asset is the native coin.
    pub fn is_native(&self) -> bool {
        matches!(self, TokenRef::Native)
    }
}

/// One-way commitment to the swap secret under a given hash algorithm.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hashlock {
    /// Hash function the escrow contract applies.
    pub algorithm: HashAlgorithm,
    /// Digest of the secret.
    #[serde(with = "hex32")]
    pub digest: Hash,
}

impl Hashlock {
    /// Compute the hashlock for a preimage.
    pub fn of(algorithm: HashAlgorithm, preimage: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(preimage),
        }
    }

    /// Check a preimage against this hashlock.
    pub fn matches(&self, preimage: &[u8]) -> bool {
        self.algorithm.digest(preimage) == self.digest
    }
}

impl fmt::Debug for Hashlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Hashlock({:?}, 0x{})",
            self.algorithm,
            hex::encode(self.digest)
        )
    }
}

/// Per-leg hashlocks of a single secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashlockPair {
    /// Hashlock checked by the source escrow.
    pub source: Hashlock,
    /// Hashlock checked by the destination escrow.
    pub destination: Hashlock,
}

impl HashlockPair {
    /// Hashlock for `leg`.
    pub fn for_leg(&self, leg: Leg) -> &Hashlock {
        match leg {
            Leg::Source => &self.source,
            Leg::Destination => &self.destination,
        }
    }
}

/// Reference to one on-chain escrow instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRef {
    /// Chain family.
    pub chain: ChainFamily,
    /// Leg the escrow serves.
    pub leg: Leg,
    /// Escrow contract address.
    pub address: Address,
    /// Deterministic creation salt.
    #[serde(with = "hex32")]
    pub salt: Hash,
    /// Block the creation event landed in.
    pub created_block: u64,
    /// Creation transaction, when known.
    pub creation_tx: Option<TxHash>,
}

/// Escrow contract state as read from chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowState {
    /// Principal locked on funding.
    pub amount: u128,
    /// Safety deposit locked on funding.
    pub safety_deposit: u128,
    /// Hashlock digest the contract checks.
    #[serde(with = "hex32")]
    pub hashlock: Hash,
    /// Absolute timelocks enforced by the contract.
    pub timelocks: super::timelocks::LegTimelocks,
    /// Principal and deposit are held.
    pub funded: bool,
    /// Block funding landed in.
    pub funded_block: Option<u64>,
    /// Withdrawn with a valid secret.
    pub completed: bool,
    /// Refunded to the depositor.
    pub cancelled: bool,
}

impl EscrowState {
    /// Whether the escrow reached a final state.
    pub fn is_settled(&self) -> bool {
        self.completed || self.cancelled
    }

    /// Whether funds are still locked.
    pub fn holds_funds(&self) -> bool {
        self.funded && !self.is_settled()
    }
}

/// Outcome of a state-changing adapter call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    /// Transaction hash, absent when the call was a detected no-op.
    pub tx_hash: Option<TxHash>,
    /// Block the transaction landed in.
    pub block: u64,
    /// On-chain state already reflected this action.
    pub already_applied: bool,
}

impl TxResult {
    /// Result for an action detected as already applied.
    pub fn no_op(block: u64) -> Self {
        Self {
            tx_hash: None,
            block,
            already_applied: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evm_address_validation() {
        let family = ChainFamily::Evm;
        assert!(family.is_valid_address("0x00112233445566778899aabbccddeeff00112233"));
        assert!(!family.is_valid_address("00112233445566778899aabbccddeeff00112233"));
        assert!(!family.is_valid_address("0x1234"));
        assert!(!family.is_valid_address(&format!("0:{}", "ab".repeat(32))));
    }

    #[test]
    fn test_tvm_address_validation() {
        let family = ChainFamily::NonEvm;
        assert!(family.is_valid_address(&format!("0:{}", "ab".repeat(32))));
        assert!(family.is_valid_address(&format!("-1:{}", "cd".repeat(32))));
        assert!(!family.is_valid_address(&format!("x:{}", "ab".repeat(32))));
        assert!(!family.is_valid_address("0x00112233445566778899aabbccddeeff00112233"));
    }

    #[test]
    fn test_direction_families() {
        let dir = SwapDirection::NonEvmToEvm;
        assert_eq!(dir.family(Leg::Source), ChainFamily::NonEvm);
        assert_eq!(dir.family(Leg::Destination), ChainFamily::Evm);
        assert_eq!(
            SwapDirection::from_families(ChainFamily::Evm, ChainFamily::NonEvm),
            Some(SwapDirection::EvmToNonEvm)
        );
        assert_eq!(
            SwapDirection::from_families(ChainFamily::Evm, ChainFamily::Evm),
            None
        );
    }

    #[test]
    fn test_hash_algorithms_differ() {
        let data = [7u8; 32];
        let sha = HashAlgorithm::Sha256.digest(&data);
        let keccak = HashAlgorithm::Keccak256.digest(&data);
        assert_ne!(sha, keccak);
    }

    #[test]
    fn test_hashlock_matches() {
        let lock = Hashlock::of(HashAlgorithm::Keccak256, b"preimage");
        assert!(lock.matches(b"preimage"));
        assert!(!lock.matches(b"other"));
    }

    #[test]
    fn test_address_is_lowercased() {
        let addr = Address::new("0xABCDEF0000000000000000000000000000000001");
        assert_eq!(addr.as_str(), "0xabcdef0000000000000000000000000000000001");
    }

    #[test]
    fn test_parse_hash_accepts_prefix() {
        let hex = format!("0x{}", "11".repeat(32));
        assert_eq!(parse_hash(&hex), Some([0x11; 32]));
        assert_eq!(parse_hash("0x1234"), None);
    }
}
