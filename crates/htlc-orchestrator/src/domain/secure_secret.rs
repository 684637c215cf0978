//! # Secure Secret Type
//!
//! Swap preimage wrapper that zeroizes memory on drop and never prints its
//! value through `Debug`.

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::value_objects::{HashAlgorithm, Hashlock};

/// A 32-byte swap secret that zeroizes on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecureSecret {
    inner: [u8; 32],
}

impl SecureSecret {
    /// Create from bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { inner: bytes }
    }

    /// Create from a slice (copies into fixed array).
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let inner: [u8; 32] = slice.try_into().ok()?;
        Some(Self { inner })
    }

    /// Parse from hex, as published by an operator or recovered from logs.
    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(raw).ok()?;
        Self::from_slice(&bytes)
    }

    /// Borrow the secret bytes. Do not keep the reference around.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.inner
    }

    /// Hex form for operator recovery output.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.inner))
    }

    /// Hashlock of this secret under `algorithm`.
    pub fn hashlock(&self, algorithm: HashAlgorithm) -> Hashlock {
        Hashlock::of(algorithm, &self.inner)
    }
}

impl std::fmt::Debug for SecureSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecureSecret(***)")
    }
}

impl Serialize for SecureSecret {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&hex::encode(self.inner))
    }
}

impl<'de> Deserialize<'de> for SecureSecret {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| serde::de::Error::custom("invalid secret"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_value() {
        let secret = SecureSecret::new([0xABu8; 32]);
        let debug_str = format!("{:?}", secret);
        assert!(!debug_str.to_lowercase().contains("ab"));
        assert!(debug_str.contains("***"));
    }

    #[test]
    fn test_from_slice_wrong_length() {
        assert!(SecureSecret::from_slice(&[0xCDu8; 16]).is_none());
        assert!(SecureSecret::from_slice(&[0xCDu8; 32]).is_some());
    }

    #[test]
    fn test_hex_parse() {
        let secret = SecureSecret::new([0x11; 32]);
        let parsed = SecureSecret::from_hex(&secret.to_hex()).unwrap();
        assert_eq!(parsed, secret);
    }

    #[test]
    fn test_hashlock_per_algorithm() {
        let secret = SecureSecret::new([5u8; 32]);
        let sha = secret.hashlock(HashAlgorithm::Sha256);
        let keccak = secret.hashlock(HashAlgorithm::Keccak256);
        assert!(sha.matches(secret.as_bytes()));
        assert!(keccak.matches(secret.as_bytes()));
        assert_ne!(sha.digest, keccak.digest);
    }
}
