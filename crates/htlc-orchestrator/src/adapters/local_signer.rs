//! In-process key store signing with HMAC-SHA256.
//!
//! Stands in for an HSM or remote signer on devnets. Keys are zeroized on
//! drop and never leave this module.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use zeroize::Zeroizing;

use crate::domain::{Address, SwapError};
use crate::ports::{Signature, SignerProvider};

type HmacSha256 = Hmac<Sha256>;

/// Deterministic devnet key for `address` on `chain`.
pub fn derive_dev_key(chain: &str, address: &Address) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(b"htlc-devnet-key");
    hasher.update(chain.as_bytes());
    hasher.update(address.as_str().as_bytes());
    hasher.finalize().into()
}

/// HMAC-SHA256 of `payload` under `key`.
pub fn hmac_sign(key: &[u8; 32], payload: &[u8]) -> Signature {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Signature(Vec::new()),
    };
    mac.update(payload);
    Signature(mac.finalize().into_bytes().to_vec())
}

/// Constant-time check of an HMAC signature.
pub fn hmac_verify(key: &[u8; 32], payload: &[u8], signature: &Signature) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&signature.0).is_ok()
}

/// Signer over registered keys.
#[derive(Default)]
pub struct LocalSigner {
    keys: RwLock<HashMap<(String, Address), Zeroizing<[u8; 32]>>>,
}

impl LocalSigner {
    /// Empty key store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `key` for `address` on `chain`.
    pub fn insert_key(&self, chain: &str, address: Address, key: [u8; 32]) {
        self.keys
            .write()
            .insert((chain.to_string(), address), Zeroizing::new(key));
    }

    /// Whether a key is held for `address` on `chain`.
    pub fn has_key(&self, chain: &str, address: &Address) -> bool {
        self.keys
            .read()
            .contains_key(&(chain.to_string(), address.clone()))
    }
}

#[async_trait]
impl SignerProvider for LocalSigner {
    async fn sign(
        &self,
        chain: &str,
        signer: &Address,
        payload: &[u8],
    ) -> Result<Signature, SwapError> {
        let keys = self.keys.read();
        let key = keys
            .get(&(chain.to_string(), signer.clone()))
            .ok_or_else(|| SwapError::Signer(format!("no key for {} on {}", signer, chain)))?;
        Ok(hmac_sign(key, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_and_verify() {
        let signer = LocalSigner::new();
        let addr = Address::new(format!("0x{}", "11".repeat(20)));
        let key = derive_dev_key("evm", &addr);
        signer.insert_key("evm", addr.clone(), key);

        let sig = signer.sign("evm", &addr, b"payload").await.unwrap();
        assert!(hmac_verify(&key, b"payload", &sig));
        assert!(!hmac_verify(&key, b"tampered", &sig));
    }

    #[tokio::test]
    async fn test_unknown_signer_rejected() {
        let signer = LocalSigner::new();
        let addr = Address::new(format!("0x{}", "11".repeat(20)));
        let err = signer.sign("evm", &addr, b"x").await.unwrap_err();
        assert!(matches!(err, SwapError::Signer(_)));
    }

    #[test]
    fn test_dev_keys_are_chain_scoped() {
        let addr = Address::new(format!("0x{}", "11".repeat(20)));
        assert_ne!(derive_dev_key("evm", &addr), derive_dev_key("tvm", &addr));
    }
}
